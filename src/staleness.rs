//! Per-language pull decisions
//!
//! [`decide`] is a pure function of the remote statistics, the local file
//! state and the run flags. [`evaluate`] wraps it and reads the local file's
//! timestamp only when the flags alone do not settle the verdict.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::PullOptions;
use crate::error::Result;
use crate::timestamp::TimestampSource;
use crate::types::ResourceLanguageStat;

/// Why a language is left alone
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote language is the resource's source language
    IsSourceLanguage,
    /// No local file exists and `all` was not requested
    NotTrackedLocally,
    /// A local file exists and overwriting is disabled
    ExistingFileProtected,
    /// The local file is at least as new as the remote translation
    UpToDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::IsSourceLanguage => "is source language",
            SkipReason::NotTrackedLocally => "not tracked locally",
            SkipReason::ExistingFileProtected => "existing file protected",
            SkipReason::UpToDate => "up to date",
        })
    }
}

/// Why a language is downloaded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadReason {
    /// No local file yet
    New,
    /// Requested with `force`
    Forced,
    /// The remote translation changed after the local file
    Stale,
}

impl fmt::Display for DownloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DownloadReason::New => "new",
            DownloadReason::Forced => "forced",
            DownloadReason::Stale => "stale",
        })
    }
}

/// Verdict for one remote language
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PullDecision {
    /// Leave the local file untouched
    Skip(SkipReason),
    /// Download into `path`
    Download {
        /// Destination file
        path: PathBuf,
        /// What triggered the download
        reason: DownloadReason,
    },
}

impl PullDecision {
    /// Whether this verdict starts a download
    pub fn is_download(&self) -> bool {
        matches!(self, PullDecision::Download { .. })
    }
}

/// What is known about the local translation file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalState {
    /// No file exists for the language
    Missing,
    /// A file exists
    Present {
        /// Last modification of the file
        modified: DateTime<Utc>,
    },
}

/// Decide whether one remote language should be downloaded
///
/// Rules apply in order, first match wins:
///
/// 1. the source language is never downloaded
/// 2. a missing file is skipped unless `all` is set
/// 3. an existing file is skipped when `skip_existing` is set
/// 4. a missing file is downloaded as new
/// 5. an existing file is downloaded when `force` is set, or when it is older
///    than the remote translation
pub fn decide(
    source_language: &str,
    stat: &ResourceLanguageStat,
    path: &Path,
    local: LocalState,
    options: &PullOptions,
) -> PullDecision {
    let download = |reason| PullDecision::Download {
        path: path.to_path_buf(),
        reason,
    };

    if stat.language == source_language {
        return PullDecision::Skip(SkipReason::IsSourceLanguage);
    }

    match local {
        LocalState::Missing if !options.all => PullDecision::Skip(SkipReason::NotTrackedLocally),
        LocalState::Present { .. } if options.skip_existing => {
            PullDecision::Skip(SkipReason::ExistingFileProtected)
        }
        LocalState::Missing => download(DownloadReason::New),
        LocalState::Present { .. } if options.force => download(DownloadReason::Forced),
        LocalState::Present { modified } => {
            if modified < stat.last_update {
                download(DownloadReason::Stale)
            } else {
                PullDecision::Skip(SkipReason::UpToDate)
            }
        }
    }
}

/// Decide for one remote language, reading the local timestamp if needed
///
/// `existing` is the discovered local file, `candidate` the path a new file
/// would be written to.
///
/// # Errors
///
/// Fails with [`Error::TimestampUnavailable`](crate::Error::TimestampUnavailable)
/// when the verdict depends on a timestamp the source cannot produce.
pub async fn evaluate(
    source_language: &str,
    stat: &ResourceLanguageStat,
    existing: Option<&Path>,
    candidate: &Path,
    options: &PullOptions,
    timestamps: &dyn TimestampSource,
) -> Result<PullDecision> {
    let Some(path) = existing else {
        return Ok(decide(
            source_language,
            stat,
            candidate,
            LocalState::Missing,
            options,
        ));
    };

    let settled = stat.language == source_language || options.skip_existing || options.force;
    // Rules 1, 3 and 5 (force) decide before the timestamp is compared
    let modified = if settled {
        stat.last_update
    } else {
        let modified = timestamps.last_modified(path).await?;
        tracing::trace!(
            path = %path.display(),
            source = timestamps.name(),
            local = %modified,
            remote = %stat.last_update,
            "compared timestamps"
        );
        modified
    };

    Ok(decide(
        source_language,
        stat,
        path,
        LocalState::Present { modified },
        options,
    ))
}
