//! Trait for local timestamp sources

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Produces the time a local translation file was last known to be good
///
/// # Errors
///
/// Implementations return [`Error::TimestampUnavailable`](crate::Error::TimestampUnavailable)
/// when no time can be determined. They never fall back to a default time;
/// the caller decides what an unknown timestamp means for the run.
#[async_trait]
pub trait TimestampSource: Send + Sync {
    /// Time of the last change to `path`
    async fn last_modified(&self, path: &Path) -> crate::Result<DateTime<Utc>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
