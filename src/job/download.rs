//! Translation export jobs

use tokio_util::sync::CancellationToken;

use super::{DownloadJob, JobOutcome, JobStatus, PollSettings, Submission, poll_until_terminal};
use crate::api::{JobResponse, RemoteApi};
use crate::error::Result;
use crate::types::{DownloadMode, ResourceId};

/// Create an export job for one language of a resource
///
/// The creation response may already be terminal: a job with content, a
/// failed job, or a redirect to storage (fetched here, without credentials).
pub async fn submit_download(
    api: &dyn RemoteApi,
    resource: &ResourceId,
    language: &str,
    mode: DownloadMode,
) -> Result<Submission<Vec<u8>>> {
    let response = api.create_download(resource, language, mode).await?;
    let job = match response {
        JobResponse::Redirect(url) => {
            tracing::debug!(resource = %resource, language, "export served from storage on creation");
            let content = api.fetch_external(&url).await?;
            return Ok(Submission::Ready(JobOutcome::Succeeded(content)));
        }
        JobResponse::Job(job) => job,
    };

    let id = job.id.clone();
    Ok(match classify(job) {
        Some(outcome) => Submission::Ready(outcome),
        None => Submission::Pending(id),
    })
}

/// Poll an export job until it is terminal, times out or is cancelled
///
/// Content is the authoritative success signal: a job that already carries
/// content succeeds even while its status still reads `pending`. A redirect
/// to storage ends polling with the bytes found there.
pub async fn poll_download(
    api: &dyn RemoteApi,
    job_id: &str,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<JobOutcome<Vec<u8>>> {
    poll_until_terminal(settings, cancel, move || async move {
        match api.download_status(job_id).await? {
            JobResponse::Redirect(url) => {
                tracing::debug!(job_id, url = %url, "export redirected to storage");
                let content = api.fetch_external(&url).await?;
                Ok(Some(JobOutcome::Succeeded(content)))
            }
            JobResponse::Job(job) => Ok(classify(job)),
        }
    })
    .await
}

/// Submit and, if needed, poll an export job
pub async fn download(
    api: &dyn RemoteApi,
    resource: &ResourceId,
    language: &str,
    mode: DownloadMode,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<JobOutcome<Vec<u8>>> {
    match submit_download(api, resource, language, mode).await? {
        Submission::Ready(outcome) => Ok(outcome),
        Submission::Pending(job_id) => poll_download(api, &job_id, settings, cancel).await,
    }
}

fn classify(job: DownloadJob) -> Option<JobOutcome<Vec<u8>>> {
    if let Some(content) = job.content {
        return Some(JobOutcome::Succeeded(content));
    }
    match job.status {
        JobStatus::Failed => Some(JobOutcome::Failed(job.errors)),
        // Success without content means the file is not ready to be served yet
        JobStatus::Succeeded | JobStatus::Pending => None,
    }
}
