//! REST API transport
//!
//! The pull engine talks to the translation service through the [`RemoteApi`]
//! trait. [`HttpApi`] is the production implementation on top of `reqwest`;
//! tests substitute scripted implementations.
//!
//! Job calls return a [`JobResponse`]: either the decoded job or a redirect to
//! a location on another host. The transport never follows such redirects
//! itself, because doing so would forward the bearer token to third-party
//! storage; the job layer fetches the target with [`RemoteApi::fetch_external`]
//! instead.

mod document;
mod http;

pub use http::HttpApi;

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::job::{DownloadJob, UploadJob};
use crate::types::{DownloadMode, ResourceId, ResourceLanguageStat};

/// Response to a job creation or status request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobResponse<T> {
    /// The server answered with the job document (or, for downloads, its content)
    Job(T),
    /// The server redirected to a location outside the API host
    Redirect(Url),
}

/// Operations the pull engine needs from the translation service
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Per-language statistics of a resource, all pages
    async fn language_stats(&self, resource: &ResourceId) -> Result<Vec<ResourceLanguageStat>>;

    /// Start exporting the translation of `resource` into `language`
    async fn create_download(
        &self,
        resource: &ResourceId,
        language: &str,
        mode: DownloadMode,
    ) -> Result<JobResponse<DownloadJob>>;

    /// Current state of an export job
    async fn download_status(&self, job_id: &str) -> Result<JobResponse<DownloadJob>>;

    /// Start importing `content` as the `language` translation of `resource`
    async fn create_upload(
        &self,
        resource: &ResourceId,
        language: &str,
        content: &str,
    ) -> Result<JobResponse<UploadJob>>;

    /// Current state of an import job
    async fn upload_status(&self, job_id: &str) -> Result<JobResponse<UploadJob>>;

    /// Fetch a redirect target without credentials
    async fn fetch_external(&self, url: &Url) -> Result<Vec<u8>>;
}
