//! Outcome of a pull run

use std::path::PathBuf;

use crate::error::ApiErrorItem;
use crate::staleness::{DownloadReason, SkipReason};
use crate::types::ResourceId;

/// Final state of one attempted file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// Translation written to disk
    Written {
        /// Bytes written
        bytes: u64,
    },
    /// The server failed the export job
    JobFailed(Vec<ApiErrorItem>),
    /// The job did not finish before the deadline
    TimedOut,
    /// The run was cancelled while the job was in flight
    Cancelled,
    /// Transport, filesystem or timestamp error
    Error(String),
}

impl FileOutcome {
    /// Whether the file was written
    pub fn is_written(&self) -> bool {
        matches!(self, FileOutcome::Written { .. })
    }
}

/// One language that was attempted (or could not be evaluated)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReport {
    /// Resource the language belongs to
    pub resource: ResourceId,
    /// Remote language code
    pub language: String,
    /// Local file
    pub path: PathBuf,
    /// Why a download was attempted; `None` when evaluation itself failed
    pub reason: Option<DownloadReason>,
    /// What happened
    pub outcome: FileOutcome,
}

/// A language that was deliberately left alone
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedLanguage {
    /// Resource the language belongs to
    pub resource: ResourceId,
    /// Remote language code
    pub language: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// A mapping whose language statistics could not be fetched
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingFailure {
    /// Resource of the mapping
    pub resource: ResourceId,
    /// Error message
    pub error: String,
}

/// Everything a pull run did
///
/// Files are listed in completion order, not submission order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Attempted files
    pub files: Vec<FileReport>,
    /// Skipped languages
    pub skipped: Vec<SkippedLanguage>,
    /// Mappings that were not processed at all
    pub mapping_failures: Vec<MappingFailure>,
    /// Download workers that panicked
    pub panicked_workers: usize,
}

impl PullReport {
    /// Number of files written
    pub fn written(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_written()).count()
    }

    /// Number of attempted files that were not written
    pub fn failed(&self) -> usize {
        self.files.len() - self.written()
    }

    /// Files that were not written
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.outcome.is_written())
    }

    /// Look up the report of one language
    pub fn file(&self, resource: &ResourceId, language: &str) -> Option<&FileReport> {
        self.files
            .iter()
            .find(|f| &f.resource == resource && f.language == language)
    }

    /// Whether every attempted file was written and every mapping processed
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.mapping_failures.is_empty() && self.panicked_workers == 0
    }
}
