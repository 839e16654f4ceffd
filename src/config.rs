//! Configuration types for l10n-sync
//!
//! Parsing of the on-disk project configuration format is left to the embedding
//! application; it hands the crate a [`Config`] (usually deserialized from JSON)
//! plus per-run [`PullOptions`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::mapping::FileMapping;
use crate::types::DownloadMode;

/// REST API connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API (default: "https://rest.api.transifex.com")
    #[serde(default = "default_host")]
    pub host: Url,

    /// Bearer token sent to `host` (never to redirect targets on other hosts)
    #[serde(default)]
    pub token: String,

    /// Timeout for a single HTTP request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            token: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// What the orchestrator does when a whole mapping (or one file's local
/// timestamp) cannot be processed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure in the report and carry on with the other mappings (default)
    #[default]
    Isolate,
    /// Return the error immediately, abandoning downloads already in flight
    FailFast,
}

/// Pull engine tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PullConfig {
    /// Maximum concurrent download jobs across all mappings (default: 8)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Delay between two status checks of an async job (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Give up on an async job after this long (default: 120 seconds)
    #[serde(default = "default_job_timeout", with = "duration_serde")]
    pub job_timeout: Duration,

    /// Handling of mapping-level failures (default: isolate)
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            poll_interval: default_poll_interval(),
            job_timeout: default_job_timeout(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// One configured resource, as written in the project configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Composite identifier (`o:<org>:p:<project>:r:<resource>`)
    pub resource_id: String,

    /// Path template relative to the project root, with exactly one `<lang>`
    pub file_filter: String,

    /// Source file, relative to the project root
    #[serde(default)]
    pub source_file: Option<String>,

    /// Language code of the source file
    pub source_lang: String,

    /// Remote language code -> local language code
    #[serde(default)]
    pub language_overrides: BTreeMap<String, String>,

    /// Local language code -> file path relative to the project root
    #[serde(default)]
    pub path_overrides: BTreeMap<String, String>,
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// REST API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pull engine tuning
    #[serde(default)]
    pub pull: PullConfig,

    /// Configured resources
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl Config {
    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file(path, e))?;
        Self::from_json_str(&content)
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.pull.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads must be at least 1",
                Some("max_concurrent_downloads"),
            ));
        }
        if self.pull.poll_interval.is_zero() {
            return Err(Error::config(
                "poll_interval must be greater than zero",
                Some("poll_interval"),
            ));
        }
        Ok(())
    }

    /// Build a [`FileMapping`] for every configured resource, scanning
    /// `project_root` for existing translations
    pub fn load_mappings(&self, project_root: &Path) -> Result<Vec<FileMapping>> {
        self.resources
            .iter()
            .map(|resource| FileMapping::load(resource, project_root))
            .collect()
    }
}

/// Run-mode flags of a single pull
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullOptions {
    /// Also download languages that have no local file yet
    #[serde(default)]
    pub all: bool,

    /// Download existing files even when they are up to date
    #[serde(default)]
    pub force: bool,

    /// Never overwrite a file that already exists (`disable-overwrite`)
    #[serde(default, alias = "disable_overwrite")]
    pub skip_existing: bool,

    /// Compare against the last commit touching the file instead of its mtime
    #[serde(default)]
    pub use_git_timestamps: bool,

    /// Export mode for download jobs
    #[serde(default)]
    pub mode: DownloadMode,
}

#[allow(clippy::expect_used)]
fn default_host() -> Url {
    Url::parse("https://rest.api.transifex.com").expect("static URL is valid")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_concurrent() -> usize {
    8
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_job_timeout() -> Duration {
    Duration::from_secs(120)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
