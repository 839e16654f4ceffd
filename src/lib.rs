//! # l10n-sync
//!
//! Pull engine that keeps a project's translation files in sync with a remote
//! localization service.
//!
//! ## Design Philosophy
//!
//! l10n-sync is designed to be:
//! - **Incremental** - Only languages whose remote translation is newer than the
//!   local file are downloaded, unless told otherwise
//! - **Concurrent** - Downloads run as independent, bounded tasks; one failing
//!   language never takes its siblings down
//! - **Library-first** - No CLI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events instead of parsing logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use l10n_sync::{Config, PullOptions, PullOrchestrator};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json_str(r#"{
//!         "api": { "token": "my-token" },
//!         "resources": [{
//!             "resource_id": "o:acme:p:web:r:app",
//!             "file_filter": "locales/<lang>/app.po",
//!             "source_lang": "en"
//!         }]
//!     }"#)?;
//!
//!     let mappings = config.load_mappings(Path::new("."))?;
//!     let orchestrator = PullOrchestrator::from_config(&config)?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = orchestrator.run(&mappings, &PullOptions::default()).await?;
//!     println!("{} files written", report.written());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API transport
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Async export/import jobs
pub mod job;
/// Language codes and file paths
pub mod language;
/// Resource-to-file mappings
pub mod mapping;
/// Pull orchestration
pub mod pull;
/// Per-language pull decisions
pub mod staleness;
/// Local timestamp sources
pub mod timestamp;
/// Core types and events
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use api::{HttpApi, JobResponse, RemoteApi};
pub use config::{ApiConfig, Config, FailurePolicy, PullConfig, PullOptions, ResourceConfig};
pub use error::{ApiErrorItem, Error, Result};
pub use job::{JobOutcome, JobStatus, PollSettings};
pub use mapping::FileMapping;
pub use pull::{FileOutcome, FileReport, PullOrchestrator, PullReport};
pub use staleness::{DownloadReason, PullDecision, SkipReason};
pub use timestamp::{FsTimestampSource, GitTimestampSource, TimestampSource};
pub use types::{DownloadMode, PullEvent, ResourceId, ResourceLanguageStat};

/// Run a pull, cancelling its in-flight downloads on a termination signal
///
/// Once a signal arrives the orchestrator is cancelled and the run is awaited
/// to completion, so the returned report still accounts for every language.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use l10n_sync::{Config, PullOptions, PullOrchestrator, pull_until_signal};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_json_file(Path::new(".l10n-sync.json")).await?;
///     let mappings = config.load_mappings(Path::new("."))?;
///     let orchestrator = PullOrchestrator::from_config(&config)?;
///
///     let report = pull_until_signal(&orchestrator, &mappings, &PullOptions::default()).await?;
///     if !report.is_success() {
///         std::process::exit(1);
///     }
///     Ok(())
/// }
/// ```
pub async fn pull_until_signal(
    orchestrator: &PullOrchestrator,
    mappings: &[FileMapping],
    options: &PullOptions,
) -> Result<PullReport> {
    let run = orchestrator.run(mappings, options);
    tokio::pin!(run);

    tokio::select! {
        report = &mut run => report,
        _ = wait_for_signal() => {
            orchestrator.cancel();
            run.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, cancelling pull"),
                _ = sigint.recv() => tracing::info!("Received SIGINT, cancelling pull"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, cancelling pull");
            } else {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, cancelling pull"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
