//! Translation import jobs

use tokio_util::sync::CancellationToken;

use super::{JobOutcome, JobStatus, PollSettings, Submission, UploadDetails, UploadJob, poll_until_terminal};
use crate::api::{JobResponse, RemoteApi};
use crate::error::{Error, Result};
use crate::types::ResourceId;

/// Create an import job for one language of a resource
pub async fn submit_upload(
    api: &dyn RemoteApi,
    resource: &ResourceId,
    language: &str,
    content: &str,
) -> Result<Submission<UploadDetails>> {
    let job = expect_job(api.create_upload(resource, language, content).await?)?;
    let id = job.id.clone();
    Ok(match classify(job) {
        Some(outcome) => Submission::Ready(outcome),
        None => Submission::Pending(id),
    })
}

/// Poll an import job until it is terminal, times out or is cancelled
pub async fn poll_upload(
    api: &dyn RemoteApi,
    job_id: &str,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<JobOutcome<UploadDetails>> {
    poll_until_terminal(settings, cancel, move || async move {
        let job = expect_job(api.upload_status(job_id).await?)?;
        Ok(classify(job))
    })
    .await
}

/// Submit and, if needed, poll an import job
pub async fn upload(
    api: &dyn RemoteApi,
    resource: &ResourceId,
    language: &str,
    content: &str,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<JobOutcome<UploadDetails>> {
    match submit_upload(api, resource, language, content).await? {
        Submission::Ready(outcome) => Ok(outcome),
        Submission::Pending(job_id) => poll_upload(api, &job_id, settings, cancel).await,
    }
}

fn expect_job(response: JobResponse<UploadJob>) -> Result<UploadJob> {
    match response {
        JobResponse::Job(job) => Ok(job),
        JobResponse::Redirect(url) => Err(Error::Other(format!(
            "unexpected redirect to {url} while tracking an upload"
        ))),
    }
}

fn classify(job: UploadJob) -> Option<JobOutcome<UploadDetails>> {
    match job.status {
        JobStatus::Succeeded => Some(JobOutcome::Succeeded(job.details)),
        JobStatus::Failed => Some(JobOutcome::Failed(job.errors)),
        JobStatus::Pending => None,
    }
}
