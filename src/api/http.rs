//! `reqwest`-based implementation of [`RemoteApi`]

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{RequestBuilder, Response, redirect};
use serde::de::DeserializeOwned;
use url::Url;

use super::document::{
    DOWNLOADS_TYPE, Document, ErrorDocument, JSONAPI_CONTENT_TYPE, JobAttributes, ResourceObject,
    StatAttributes, UPLOADS_TYPE, download_request, upload_request,
};
use super::{JobResponse, RemoteApi};
use crate::config::ApiConfig;
use crate::error::{ApiErrorItem, Error, Result};
use crate::job::{DownloadJob, JobStatus, UploadJob};
use crate::types::{DownloadMode, ResourceId, ResourceLanguageStat};

/// Maximum number of same-host redirects followed for a single request
const MAX_REDIRECTS: usize = 10;

/// What a job request produced before it is turned into a domain job
enum RawJob {
    Document(ResourceObject<JobAttributes>),
    /// A same-host redirect led to the exported file itself
    Content(Vec<u8>),
    Redirect(Url),
}

/// HTTP client for the translation service's JSON:API
///
/// Credentials are attached per request, and only to requests aimed at the
/// configured host. Redirects are followed while they stay on that host's
/// origin; a redirect anywhere else is returned to the caller as
/// [`JobResponse::Redirect`].
///
/// # Examples
///
/// ```no_run
/// use l10n_sync::api::{HttpApi, RemoteApi};
/// use l10n_sync::config::ApiConfig;
/// use l10n_sync::types::ResourceId;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpApi::new(&ApiConfig {
///     token: "my-token".to_string(),
///     ..Default::default()
/// })?;
/// let resource: ResourceId = "o:acme:p:web:r:app".parse()?;
/// for stat in api.language_stats(&resource).await? {
///     println!("{} last updated {}", stat.language, stat.last_update);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: reqwest::Client,
    storage: reqwest::Client,
    host: Url,
    token: String,
}

impl HttpApi {
    /// Build the API and storage clients
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let origin = config.host.origin();
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if attempt.url().origin() == origin {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(policy)
            .build()?;
        let storage = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            storage,
            host: config.host.clone(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.host.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| Error::config(format!("invalid API URL: {e}"), Some("host")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, JSONAPI_CONTENT_TYPE)
    }

    async fn get_document<T: DeserializeOwned>(&self, url: Url) -> Result<Document<T>> {
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = ensure_success(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_job(&self, request: RequestBuilder, requested: &Url) -> Result<RawJob> {
        let response = self.authorized(request).send().await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| Error::Other(format!("redirect {status} without Location")))?;
            let target = response
                .url()
                .join(location)
                .map_err(|e| Error::Other(format!("invalid redirect location '{location}': {e}")))?;
            tracing::debug!(target = %target, "job request redirected off the API host");
            return Ok(RawJob::Redirect(target));
        }

        let response = ensure_success(response).await?;
        if response.url() != requested && !is_job_document(&response) {
            tracing::debug!(final_url = %response.url(), "job request redirected to content");
            return Ok(RawJob::Content(response.bytes().await?.to_vec()));
        }

        let body = response.bytes().await?;
        let document: Document<ResourceObject<JobAttributes>> = serde_json::from_slice(&body)?;
        Ok(RawJob::Document(document.data))
    }

    fn json_body(&self, request: RequestBuilder, body: &serde_json::Value) -> Result<RequestBuilder> {
        Ok(request
            .header(CONTENT_TYPE, JSONAPI_CONTENT_TYPE)
            .body(serde_json::to_vec(body)?))
    }

    fn into_download(raw: RawJob, known_id: &str) -> JobResponse<DownloadJob> {
        match raw {
            RawJob::Document(object) => JobResponse::Job(object.into_download_job()),
            RawJob::Content(content) => JobResponse::Job(DownloadJob {
                id: known_id.to_string(),
                status: JobStatus::Succeeded,
                errors: Vec::new(),
                content: Some(content),
            }),
            RawJob::Redirect(url) => JobResponse::Redirect(url),
        }
    }

    fn into_upload(raw: RawJob) -> Result<JobResponse<UploadJob>> {
        match raw {
            RawJob::Document(object) => Ok(JobResponse::Job(object.into_upload_job())),
            RawJob::Content(_) => Err(Error::Other(
                "upload job answered with file content instead of a job document".to_string(),
            )),
            RawJob::Redirect(url) => Ok(JobResponse::Redirect(url)),
        }
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn language_stats(&self, resource: &ResourceId) -> Result<Vec<ResourceLanguageStat>> {
        let mut url = self.endpoint("resource_language_stats")?;
        url.query_pairs_mut()
            .append_pair("filter[project]", &resource.project_id())
            .append_pair("filter[resource]", &resource.to_string());

        let mut stats = Vec::new();
        let mut next = Some(url);
        while let Some(page) = next.take() {
            let document: Document<Vec<ResourceObject<StatAttributes>>> =
                self.get_document(page.clone()).await?;
            stats.extend(document.data.into_iter().map(ResourceObject::into_stat));
            if let Some(link) = document.links.next {
                next = Some(page.join(&link).map_err(|e| {
                    Error::Other(format!("invalid pagination link '{link}': {e}"))
                })?);
            }
        }

        tracing::debug!(resource = %resource, languages = stats.len(), "fetched language stats");
        Ok(stats)
    }

    async fn create_download(
        &self,
        resource: &ResourceId,
        language: &str,
        mode: DownloadMode,
    ) -> Result<JobResponse<DownloadJob>> {
        let url = self.endpoint(DOWNLOADS_TYPE)?;
        let request = self.json_body(
            self.client.post(url.clone()),
            &download_request(resource, language, mode),
        )?;
        let raw = self.send_job(request, &url).await?;
        Ok(Self::into_download(raw, ""))
    }

    async fn download_status(&self, job_id: &str) -> Result<JobResponse<DownloadJob>> {
        let url = self.endpoint(&format!("{DOWNLOADS_TYPE}/{job_id}"))?;
        let raw = self.send_job(self.client.get(url.clone()), &url).await?;
        Ok(Self::into_download(raw, job_id))
    }

    async fn create_upload(
        &self,
        resource: &ResourceId,
        language: &str,
        content: &str,
    ) -> Result<JobResponse<UploadJob>> {
        let url = self.endpoint(UPLOADS_TYPE)?;
        let request = self.json_body(
            self.client.post(url.clone()),
            &upload_request(resource, language, content),
        )?;
        Self::into_upload(self.send_job(request, &url).await?)
    }

    async fn upload_status(&self, job_id: &str) -> Result<JobResponse<UploadJob>> {
        let url = self.endpoint(&format!("{UPLOADS_TYPE}/{job_id}"))?;
        Self::into_upload(self.send_job(self.client.get(url.clone()), &url).await?)
    }

    async fn fetch_external(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.storage.get(url.clone()).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Turn an error status into [`Error::Api`], decoding the JSON:API error
/// envelope when there is one
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let errors = match serde_json::from_str::<ErrorDocument>(&text) {
        Ok(document) => document.errors,
        Err(_) => vec![ApiErrorItem {
            code: status
                .canonical_reason()
                .unwrap_or("http_error")
                .to_string(),
            detail: text,
            status: Some(status.as_u16().to_string()),
            ..Default::default()
        }],
    };
    tracing::warn!(status = status.as_u16(), errors = errors.len(), "API request failed");
    Err(Error::Api {
        status: status.as_u16(),
        errors,
    })
}

/// Whether a redirected response is a job document rather than exported content
///
/// Creating a job may answer with a 303 to the job's own status URL.
fn is_job_document(response: &Response) -> bool {
    let jsonapi = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(JSONAPI_CONTENT_TYPE));
    let job_endpoint = response.url().path_segments().is_some_and(|mut segments| {
        segments.any(|segment| segment == DOWNLOADS_TYPE || segment == UPLOADS_TYPE)
    });
    jsonapi || job_endpoint
}
