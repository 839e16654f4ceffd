//! Local timestamp sources
//!
//! Staleness compares a local file's last-known-good time against the server's
//! last update for that language. Where that local time comes from is a
//! pluggable capability, modelled by the [`TimestampSource`] trait:
//!
//! - [`FsTimestampSource`]: the file's modification time
//! - [`GitTimestampSource`]: the committer time of the last commit touching the file
//!
//! ## Usage
//!
//! ```no_run
//! use l10n_sync::timestamp::{FsTimestampSource, TimestampSource};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = FsTimestampSource;
//!     let modified = source.last_modified(Path::new("locales/fr/app.po")).await?;
//!     println!("last modified at {modified}");
//!     Ok(())
//! }
//! ```

mod fs;
mod git;
mod traits;

pub use fs::FsTimestampSource;
pub use git::GitTimestampSource;
pub use traits::TimestampSource;
