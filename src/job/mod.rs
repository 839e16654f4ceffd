//! Server-side async jobs (export/import) and their polling
//!
//! Downloads and uploads follow the same create-then-poll protocol:
//!
//! 1. A submit call creates the job. The server may answer with a job that is
//!    already terminal (small or cached payloads), with one that must be polled,
//!    or with a redirect straight to the exported file.
//! 2. The job is re-fetched on a fixed cadence until it is terminal, the
//!    deadline elapses, or the caller cancels.
//!
//! Job failure is not an error: it is a terminal [`JobOutcome::Failed`] carrying
//! the server's item errors. Only transport problems surface as `Err`.

mod download;
mod upload;


pub use download::{download, poll_download, submit_download};
pub use upload::{poll_upload, submit_upload, upload};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::PullConfig;
use crate::error::{ApiErrorItem, Result};

/// Status of an async job as reported by the server
///
/// Any status other than `succeeded` or `failed` (e.g. `processing`) counts as
/// pending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Finished successfully
    Succeeded,
    /// Finished with errors
    Failed,
    /// Created or still processing
    #[default]
    #[serde(other)]
    Pending,
}

impl JobStatus {
    /// Whether polling can stop on this status alone
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// Translation export job
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadJob {
    /// Server-assigned job identifier
    pub id: String,
    /// Reported status (advisory once `content` is present)
    pub status: JobStatus,
    /// Item errors of a failed job
    pub errors: Vec<ApiErrorItem>,
    /// Exported file, once available
    pub content: Option<Vec<u8>>,
}

/// Translation import job
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadJob {
    /// Server-assigned job identifier
    pub id: String,
    /// Reported status
    pub status: JobStatus,
    /// Item errors of a failed job
    pub errors: Vec<ApiErrorItem>,
    /// Import counters, filled in once the job succeeded
    pub details: UploadDetails,
}

/// Counters of a finished import
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDetails {
    /// Translations created
    #[serde(default, alias = "translations_created")]
    pub created: u64,
    /// Translations updated
    #[serde(default, alias = "translations_updated")]
    pub updated: u64,
    /// Translations deleted
    #[serde(default, alias = "translations_deleted")]
    pub deleted: u64,
    /// Translations skipped
    #[serde(default, alias = "translations_skipped")]
    pub skipped: u64,
}

/// Terminal result of driving a job
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome<T> {
    /// The job finished and produced its payload
    Succeeded(T),
    /// The server reported the job as failed
    Failed(Vec<ApiErrorItem>),
    /// The deadline elapsed before the job became terminal
    TimedOut,
    /// The caller cancelled polling
    Cancelled,
}

impl<T> JobOutcome<T> {
    /// Whether the job produced its payload
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }
}

/// Result of a submit call
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission<T> {
    /// The creation response was already terminal
    Ready(JobOutcome<T>),
    /// The job must be polled under this identifier
    Pending(String),
}

/// Polling cadence and deadline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed delay between status checks (no backoff)
    pub interval: Duration,
    /// Give up after this long
    pub deadline: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(120),
        }
    }
}

impl From<&PullConfig> for PollSettings {
    fn from(config: &PullConfig) -> Self {
        Self {
            interval: config.poll_interval,
            deadline: config.job_timeout,
        }
    }
}

/// Re-run `check` every `settings.interval` until it reports a terminal outcome
///
/// The deadline and cancellation also interrupt a status request that is
/// still in flight.
pub(crate) async fn poll_until_terminal<T, F, Fut>(
    settings: PollSettings,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<JobOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<JobOutcome<T>>>>,
{
    let deadline = tokio::time::Instant::now() + settings.deadline;
    let mut attempts: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(JobOutcome::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Ok(JobOutcome::TimedOut),
            _ = tokio::time::sleep(settings.interval) => {}
        }

        attempts += 1;
        let checked = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(JobOutcome::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Ok(JobOutcome::TimedOut),
            checked = check() => checked?,
        };

        if let Some(outcome) = checked {
            tracing::debug!(attempts, "async job reached a terminal state");
            return Ok(outcome);
        }
        tracing::trace!(attempts, "async job still pending");
    }
}
