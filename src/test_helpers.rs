//! Shared test doubles for the job and pull tests

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use crate::api::{JobResponse, RemoteApi};
use crate::error::{ApiErrorItem, Error, Result};
use crate::job::{DownloadJob, JobStatus, UploadDetails, UploadJob};
use crate::timestamp::TimestampSource;
use crate::types::{DownloadMode, ResourceId, ResourceLanguageStat};

/// How the scripted server treats export jobs for one language
#[derive(Clone, Debug)]
pub(crate) enum DownloadScript {
    /// Creation answers with content straight away
    Immediate(Vec<u8>),
    /// Status reads pending until the given number of polls, then carries content
    AfterPolls(usize, Vec<u8>),
    /// Status reads failed with these errors
    Fail(Vec<ApiErrorItem>),
    /// Status never leaves pending
    PendingForever,
    /// Status reads pending but content is already attached
    ContentWhilePending(Vec<u8>),
    /// Status redirects to an external URL
    RedirectOnStatus(Url),
    /// Creation redirects to an external URL
    RedirectOnCreate(Url),
    /// Creation fails at the transport level
    CreateError,
}

/// How the scripted server treats import jobs for one language
#[derive(Clone, Debug)]
pub(crate) enum UploadScript {
    /// Succeeds after the given number of polls
    AfterPolls(usize, UploadDetails),
    /// Status reads failed with these errors
    Fail(Vec<ApiErrorItem>),
    /// Creation redirects, which uploads never do
    Redirect(Url),
}

/// In-memory [`RemoteApi`] driven by per-language scripts
#[derive(Default)]
pub(crate) struct ScriptedApi {
    stats: HashMap<String, Vec<ResourceLanguageStat>>,
    failing_stats: HashSet<String>,
    downloads: HashMap<String, DownloadScript>,
    uploads: HashMap<String, UploadScript>,
    external: HashMap<String, Vec<u8>>,
    polls: Mutex<HashMap<String, usize>>,
    pub(crate) created: Mutex<Vec<(String, String, DownloadMode)>>,
    pub(crate) external_fetches: Mutex<Vec<Url>>,
    pub(crate) stats_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_stats(mut self, resource: &str, stats: Vec<ResourceLanguageStat>) -> Self {
        self.stats.insert(resource.to_string(), stats);
        self
    }

    pub(crate) fn with_failing_stats(mut self, resource: &str) -> Self {
        self.failing_stats.insert(resource.to_string());
        self
    }

    pub(crate) fn with_download(mut self, language: &str, script: DownloadScript) -> Self {
        self.downloads.insert(language.to_string(), script);
        self
    }

    pub(crate) fn with_upload(mut self, language: &str, script: UploadScript) -> Self {
        self.uploads.insert(language.to_string(), script);
        self
    }

    pub(crate) fn with_external(mut self, url: &Url, content: &[u8]) -> Self {
        self.external.insert(url.to_string(), content.to_vec());
        self
    }

    pub(crate) fn created_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|(_, language, _)| language.clone())
            .collect();
        languages.sort();
        languages
    }

    pub(crate) fn poll_count(&self, job_id: &str) -> usize {
        self.polls.lock().unwrap().get(job_id).copied().unwrap_or(0)
    }

    fn next_poll(&self, job_id: &str) -> usize {
        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(job_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn finish(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn pending(id: &str) -> JobResponse<DownloadJob> {
        JobResponse::Job(DownloadJob {
            id: id.to_string(),
            status: JobStatus::Pending,
            ..Default::default()
        })
    }
}

fn server_error() -> Error {
    Error::Api {
        status: 500,
        errors: vec![ApiErrorItem {
            code: "internal_error".into(),
            detail: "scripted failure".into(),
            ..Default::default()
        }],
    }
}

fn language_of(job_id: &str) -> &str {
    job_id.rsplit_once('-').map(|(_, l)| l).unwrap_or(job_id)
}

#[async_trait]
impl RemoteApi for ScriptedApi {
    async fn language_stats(&self, resource: &ResourceId) -> Result<Vec<ResourceLanguageStat>> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let key = resource.to_string();
        if self.failing_stats.contains(&key) {
            return Err(server_error());
        }
        Ok(self.stats.get(&key).cloned().unwrap_or_default())
    }

    async fn create_download(
        &self,
        resource: &ResourceId,
        language: &str,
        mode: DownloadMode,
    ) -> Result<JobResponse<DownloadJob>> {
        self.created
            .lock()
            .unwrap()
            .push((resource.to_string(), language.to_string(), mode));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let id = format!("dl-{language}");
        match self.downloads.get(language) {
            Some(DownloadScript::Immediate(content)) => {
                self.finish();
                Ok(JobResponse::Job(DownloadJob {
                    id,
                    status: JobStatus::Succeeded,
                    errors: Vec::new(),
                    content: Some(content.clone()),
                }))
            }
            Some(DownloadScript::RedirectOnCreate(url)) => {
                self.finish();
                Ok(JobResponse::Redirect(url.clone()))
            }
            Some(DownloadScript::CreateError) | None => {
                self.finish();
                Err(server_error())
            }
            Some(_) => Ok(Self::pending(&id)),
        }
    }

    async fn download_status(&self, job_id: &str) -> Result<JobResponse<DownloadJob>> {
        let poll = self.next_poll(job_id);
        let script = self.downloads.get(language_of(job_id)).cloned();
        match script {
            Some(DownloadScript::AfterPolls(polls, content)) if poll >= polls => {
                self.finish();
                Ok(JobResponse::Job(DownloadJob {
                    id: job_id.to_string(),
                    status: JobStatus::Succeeded,
                    errors: Vec::new(),
                    content: Some(content),
                }))
            }
            Some(DownloadScript::Fail(errors)) => {
                self.finish();
                Ok(JobResponse::Job(DownloadJob {
                    id: job_id.to_string(),
                    status: JobStatus::Failed,
                    errors,
                    content: None,
                }))
            }
            Some(DownloadScript::ContentWhilePending(content)) => {
                self.finish();
                Ok(JobResponse::Job(DownloadJob {
                    id: job_id.to_string(),
                    status: JobStatus::Pending,
                    errors: Vec::new(),
                    content: Some(content),
                }))
            }
            Some(DownloadScript::RedirectOnStatus(url)) => {
                self.finish();
                Ok(JobResponse::Redirect(url))
            }
            Some(_) => Ok(Self::pending(job_id)),
            None => Err(server_error()),
        }
    }

    async fn create_upload(
        &self,
        _resource: &ResourceId,
        language: &str,
        _content: &str,
    ) -> Result<JobResponse<UploadJob>> {
        match self.uploads.get(language) {
            Some(UploadScript::Redirect(url)) => Ok(JobResponse::Redirect(url.clone())),
            Some(_) => Ok(JobResponse::Job(UploadJob {
                id: format!("up-{language}"),
                status: JobStatus::Pending,
                ..Default::default()
            })),
            None => Err(server_error()),
        }
    }

    async fn upload_status(&self, job_id: &str) -> Result<JobResponse<UploadJob>> {
        let poll = self.next_poll(job_id);
        let job = match self.uploads.get(language_of(job_id)) {
            Some(UploadScript::AfterPolls(polls, details)) if poll >= *polls => UploadJob {
                id: job_id.to_string(),
                status: JobStatus::Succeeded,
                errors: Vec::new(),
                details: *details,
            },
            Some(UploadScript::Fail(errors)) => UploadJob {
                id: job_id.to_string(),
                status: JobStatus::Failed,
                errors: errors.clone(),
                details: UploadDetails::default(),
            },
            Some(_) => UploadJob {
                id: job_id.to_string(),
                status: JobStatus::Pending,
                ..Default::default()
            },
            None => return Err(server_error()),
        };
        Ok(JobResponse::Job(job))
    }

    async fn fetch_external(&self, url: &Url) -> Result<Vec<u8>> {
        self.external_fetches.lock().unwrap().push(url.clone());
        self.external
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::Other(format!("nothing stored at {url}")))
    }
}

/// Timestamp source answering from a fixed table
#[derive(Default)]
pub(crate) struct FixedTimestamps {
    times: HashMap<PathBuf, DateTime<Utc>>,
}

impl FixedTimestamps {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, path: &Path, time: DateTime<Utc>) -> Self {
        self.times.insert(path.to_path_buf(), time);
        self
    }
}

#[async_trait]
impl TimestampSource for FixedTimestamps {
    async fn last_modified(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.times
            .get(path)
            .copied()
            .ok_or_else(|| Error::TimestampUnavailable {
                path: path.to_path_buf(),
                reason: "no commit history for path".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// UTC midnight of the given day
pub(crate) fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}
