//! Core types for l10n-sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Composite identifier of a remote resource: `o:<org>:p:<project>:r:<resource>`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    organization: String,
    project: String,
    resource: String,
}

impl ResourceId {
    /// Build an identifier from its three slugs
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            resource: resource.into(),
        }
    }

    /// Organization slug
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Project slug
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Resource slug
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Identifier of the owning project (`o:<org>:p:<project>`)
    pub fn project_id(&self) -> String {
        format!("o:{}:p:{}", self.organization, self.project)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "o:{}:p:{}:r:{}",
            self.organization, self.project, self.resource
        )
    }
}

impl std::str::FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidResourceId {
            id: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() == 1 && s.contains('.') {
            return Err(invalid(
                "legacy '<project>.<resource>' identifier; migrate the configuration first",
            ));
        }
        match parts.as_slice() {
            ["o", org, "p", project, "r", resource]
                if !org.is_empty() && !project.is_empty() && !resource.is_empty() =>
            {
                Ok(Self::new(*org, *project, *resource))
            }
            _ => Err(invalid("expected 'o:<org>:p:<project>:r:<resource>'")),
        }
    }
}

impl TryFrom<String> for ResourceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

/// Wire identifier of a language (`l:<code>`)
pub(crate) fn language_wire_id(code: &str) -> String {
    format!("l:{code}")
}

/// Strip the `l:` prefix from a wire language identifier
pub(crate) fn language_code_from_wire(id: &str) -> &str {
    id.strip_prefix("l:").unwrap_or(id)
}

/// Per-language statistics of a remote resource
///
/// Only `language` and `last_update` take part in staleness decisions; the
/// counters are carried for reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLanguageStat {
    /// Remote language code (without the `l:` prefix)
    pub language: String,
    /// Last time any translation in this language changed
    pub last_update: DateTime<Utc>,
    /// Number of translated strings
    #[serde(default)]
    pub translated_strings: u64,
    /// Number of untranslated strings
    #[serde(default)]
    pub untranslated_strings: u64,
    /// Number of reviewed strings
    #[serde(default)]
    pub reviewed_strings: u64,
    /// Total number of strings
    #[serde(default)]
    pub total_strings: u64,
    /// Number of translated words
    #[serde(default)]
    pub translated_words: u64,
    /// Number of untranslated words
    #[serde(default)]
    pub untranslated_words: u64,
    /// Total number of words
    #[serde(default)]
    pub total_words: u64,
}

impl ResourceLanguageStat {
    /// Stat with only the fields the decision logic reads
    pub fn new(language: impl Into<String>, last_update: DateTime<Utc>) -> Self {
        Self {
            language: language.into(),
            last_update,
            translated_strings: 0,
            untranslated_strings: 0,
            reviewed_strings: 0,
            total_strings: 0,
            translated_words: 0,
            untranslated_words: 0,
            total_words: 0,
        }
    }
}

/// Export mode requested when creating a download job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    /// Translations as they are, falling back to source for untranslated strings
    #[default]
    Default,
    /// Reviewed translations only, source otherwise
    Reviewed,
    /// Proofread translations only, source otherwise
    Proofread,
    /// Translator-friendly file (untranslated strings left empty)
    Translator,
    /// Untranslated strings only
    Untranslated,
    /// Translated strings only
    Onlytranslated,
    /// Reviewed strings only
    Onlyreviewed,
    /// Proofread strings only
    Onlyproofread,
    /// Source strings served as the translation
    Sourceastranslation,
}

impl DownloadMode {
    /// Wire form used in request bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadMode::Default => "default",
            DownloadMode::Reviewed => "reviewed",
            DownloadMode::Proofread => "proofread",
            DownloadMode::Translator => "translator",
            DownloadMode::Untranslated => "untranslated",
            DownloadMode::Onlytranslated => "onlytranslated",
            DownloadMode::Onlyreviewed => "onlyreviewed",
            DownloadMode::Onlyproofread => "onlyproofread",
            DownloadMode::Sourceastranslation => "sourceastranslation",
        }
    }
}

impl std::fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DownloadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
            .map_err(|_| Error::config(format!("unknown download mode '{s}'"), Some("mode")))
    }
}

/// Event emitted during a pull run
///
/// Subscribe with [`PullOrchestrator::subscribe`](crate::pull::PullOrchestrator::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PullEvent {
    /// A language was not downloaded
    Skipped {
        /// Resource identifier
        resource: String,
        /// Remote language code
        language: String,
        /// Reason text (e.g. "up to date")
        reason: String,
    },

    /// A download job is about to be submitted
    DownloadStarted {
        /// Resource identifier
        resource: String,
        /// Remote language code
        language: String,
        /// Destination file
        path: PathBuf,
    },

    /// Translation written to disk
    DownloadComplete {
        /// Resource identifier
        resource: String,
        /// Remote language code
        language: String,
        /// Destination file
        path: PathBuf,
        /// Number of bytes written
        bytes: u64,
    },

    /// Download failed (job failure, timeout, cancellation or error)
    DownloadFailed {
        /// Resource identifier
        resource: String,
        /// Remote language code
        language: String,
        /// Error message
        error: String,
    },

    /// A whole mapping could not be processed
    MappingFailed {
        /// Resource identifier
        resource: String,
        /// Error message
        error: String,
    },
}
