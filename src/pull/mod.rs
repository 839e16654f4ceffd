//! Pull orchestration
//!
//! [`PullOrchestrator::run`] walks every mapping, asks the server for per-language
//! statistics once per resource, decides for each language whether the local
//! file needs refreshing and fans the downloads out to worker tasks. Workers
//! are bounded by `max_concurrent_downloads` and joined before the run
//! returns; their outcomes are collected into a [`PullReport`].
//!
//! # Failure handling
//!
//! A failing download never affects its siblings. Failures that happen before
//! a download is dispatched (fetching statistics, reading a local timestamp)
//! follow [`FailurePolicy`]: `Isolate` records them in the report and carries
//! on, `FailFast` aborts the run with the error. Files already written are
//! kept either way.

mod report;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use report::{FileOutcome, FileReport, MappingFailure, PullReport, SkippedLanguage};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::{HttpApi, RemoteApi};
use crate::config::{Config, FailurePolicy, PullConfig, PullOptions};
use crate::error::{Error, Result, format_api_errors};
use crate::job::{self, JobOutcome, PollSettings};
use crate::language;
use crate::mapping::FileMapping;
use crate::staleness::{self, DownloadReason, PullDecision};
use crate::timestamp::{FsTimestampSource, GitTimestampSource, TimestampSource};
use crate::types::{DownloadMode, PullEvent, ResourceId};

/// Capacity of the event channel; slow subscribers miss older events
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Drives pull runs against a [`RemoteApi`]
///
/// # Examples
///
/// ```no_run
/// use l10n_sync::{Config, PullOptions, PullOrchestrator};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::from_json_file(Path::new(".l10n-sync.json")).await?;
/// let mappings = config.load_mappings(Path::new("."))?;
/// let orchestrator = PullOrchestrator::from_config(&config)?;
///
/// let mut events = orchestrator.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// });
///
/// let report = orchestrator.run(&mappings, &PullOptions::default()).await?;
/// println!("{} written, {} failed", report.written(), report.failed());
/// # Ok(())
/// # }
/// ```
pub struct PullOrchestrator {
    api: Arc<dyn RemoteApi>,
    config: PullConfig,
    event_tx: broadcast::Sender<PullEvent>,
    cancel: CancellationToken,
    timestamps: Option<Arc<dyn TimestampSource>>,
}

impl PullOrchestrator {
    /// Create an orchestrator over any [`RemoteApi`]
    pub fn new(api: Arc<dyn RemoteApi>, config: PullConfig) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            config,
            event_tx,
            cancel: CancellationToken::new(),
            timestamps: None,
        }
    }

    /// Create an orchestrator talking HTTP to the configured host
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let api = HttpApi::new(&config.api)?;
        Ok(Self::new(Arc::new(api), config.pull.clone()))
    }

    /// Use `source` for local timestamps instead of choosing one from
    /// [`PullOptions::use_git_timestamps`]
    pub fn with_timestamp_source(mut self, source: Arc<dyn TimestampSource>) -> Self {
        self.timestamps = Some(source);
        self
    }

    /// Subscribe to pull events
    ///
    /// Multiple subscribers are supported; events sent before subscribing are
    /// not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<PullEvent> {
        self.event_tx.subscribe()
    }

    /// Stop polling in every in-flight download
    ///
    /// Affected files are reported as [`FileOutcome::Cancelled`]. The
    /// orchestrator stays cancelled: later runs cancel their downloads
    /// immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn emit(&self, event: PullEvent) {
        // No receivers is fine
        self.event_tx.send(event).ok();
    }

    fn timestamp_source(&self, options: &PullOptions) -> Result<Arc<dyn TimestampSource>> {
        if let Some(source) = &self.timestamps {
            return Ok(Arc::clone(source));
        }
        if options.use_git_timestamps {
            let git = GitTimestampSource::from_path().ok_or_else(|| {
                Error::ExternalTool("git timestamps requested but git is not in PATH".to_string())
            })?;
            return Ok(Arc::new(git));
        }
        Ok(Arc::new(FsTimestampSource))
    }

    /// Pull translations for every mapping
    ///
    /// Returns once every dispatched download is terminal. Mappings that
    /// declare the same resource and filter are processed once.
    ///
    /// # Errors
    ///
    /// Only under [`FailurePolicy::FailFast`], or when git timestamps are
    /// requested without a git binary. Downloads still running when the run
    /// aborts are dropped.
    pub async fn run(&self, mappings: &[FileMapping], options: &PullOptions) -> Result<PullReport> {
        let timestamps = self.timestamp_source(options)?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_downloads.max(1)));
        let settings = PollSettings::from(&self.config);
        let mut workers = JoinSet::new();
        let mut report = PullReport::default();
        let mut seen = HashSet::new();

        tracing::info!(
            mappings = mappings.len(),
            timestamps = timestamps.name(),
            mode = %options.mode,
            "starting pull"
        );

        for mapping in mappings {
            if !seen.insert((mapping.id().clone(), mapping.file_filter().to_string())) {
                continue;
            }

            let stats = match self.api.language_stats(mapping.id()).await {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!(
                        resource = %mapping.id(),
                        transport = e.is_transport(),
                        error = %e,
                        "failed to fetch language stats"
                    );
                    if self.config.failure_policy == FailurePolicy::FailFast {
                        return Err(e);
                    }
                    self.emit(PullEvent::MappingFailed {
                        resource: mapping.id().to_string(),
                        error: e.to_string(),
                    });
                    report.mapping_failures.push(MappingFailure {
                        resource: mapping.id().clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for stat in &stats {
                let local_code = language::to_local(mapping, &stat.language);
                let candidate =
                    language::path_for_language(mapping, &local_code, mapping.project_root());
                let decision = staleness::evaluate(
                    mapping.source_language(),
                    stat,
                    mapping.existing_path(&local_code),
                    &candidate,
                    options,
                    timestamps.as_ref(),
                )
                .await;

                match decision {
                    Ok(PullDecision::Skip(reason)) => {
                        tracing::debug!(
                            resource = %mapping.id(),
                            language = %stat.language,
                            %reason,
                            "skipping"
                        );
                        self.emit(PullEvent::Skipped {
                            resource: mapping.id().to_string(),
                            language: stat.language.clone(),
                            reason: reason.to_string(),
                        });
                        report.skipped.push(SkippedLanguage {
                            resource: mapping.id().clone(),
                            language: stat.language.clone(),
                            reason,
                        });
                    }
                    Ok(PullDecision::Download { path, reason }) => {
                        let worker = DownloadWorker {
                            api: Arc::clone(&self.api),
                            event_tx: self.event_tx.clone(),
                            semaphore: Arc::clone(&semaphore),
                            cancel: self.cancel.clone(),
                            settings,
                            mode: options.mode,
                            resource: mapping.id().clone(),
                            language: stat.language.clone(),
                            path,
                            reason,
                        };
                        workers.spawn(worker.run());
                    }
                    Err(e) => {
                        tracing::warn!(
                            resource = %mapping.id(),
                            language = %stat.language,
                            error = %e,
                            "could not evaluate local file"
                        );
                        if self.config.failure_policy == FailurePolicy::FailFast {
                            return Err(e);
                        }
                        self.emit(PullEvent::DownloadFailed {
                            resource: mapping.id().to_string(),
                            language: stat.language.clone(),
                            error: e.to_string(),
                        });
                        report.files.push(FileReport {
                            resource: mapping.id().clone(),
                            language: stat.language.clone(),
                            path: mapping
                                .existing_path(&local_code)
                                .map(PathBuf::from)
                                .unwrap_or(candidate),
                            reason: None,
                            outcome: FileOutcome::Error(e.to_string()),
                        });
                    }
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(file) => report.files.push(file),
                Err(e) => {
                    tracing::error!(error = %e, "download worker panicked");
                    report.panicked_workers += 1;
                }
            }
        }

        tracing::info!(
            written = report.written(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            mapping_failures = report.mapping_failures.len(),
            "pull finished"
        );
        Ok(report)
    }
}

/// Everything one download task needs, owned so it can be spawned
struct DownloadWorker {
    api: Arc<dyn RemoteApi>,
    event_tx: broadcast::Sender<PullEvent>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    settings: PollSettings,
    mode: DownloadMode,
    resource: ResourceId,
    language: String,
    path: PathBuf,
    reason: DownloadReason,
}

impl DownloadWorker {
    async fn run(self) -> FileReport {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => FileOutcome::Cancelled,
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(_permit) => self.download().await,
                Err(_) => FileOutcome::Cancelled,
            },
        };

        match &outcome {
            FileOutcome::Written { bytes } => {
                self.event_tx
                    .send(PullEvent::DownloadComplete {
                        resource: self.resource.to_string(),
                        language: self.language.clone(),
                        path: self.path.clone(),
                        bytes: *bytes,
                    })
                    .ok();
            }
            failure => {
                let error = describe(failure);
                tracing::warn!(
                    resource = %self.resource,
                    language = %self.language,
                    path = %self.path.display(),
                    error = %error,
                    "download failed"
                );
                self.event_tx
                    .send(PullEvent::DownloadFailed {
                        resource: self.resource.to_string(),
                        language: self.language.clone(),
                        error,
                    })
                    .ok();
            }
        }

        FileReport {
            resource: self.resource,
            language: self.language,
            path: self.path,
            reason: Some(self.reason),
            outcome,
        }
    }

    async fn download(&self) -> FileOutcome {
        tracing::info!(
            resource = %self.resource,
            language = %self.language,
            path = %self.path.display(),
            reason = %self.reason,
            "downloading"
        );
        self.event_tx
            .send(PullEvent::DownloadStarted {
                resource: self.resource.to_string(),
                language: self.language.clone(),
                path: self.path.clone(),
            })
            .ok();

        let outcome = job::download(
            self.api.as_ref(),
            &self.resource,
            &self.language,
            self.mode,
            self.settings,
            &self.cancel,
        )
        .await;

        match outcome {
            Ok(JobOutcome::Succeeded(content)) => match self.write(&content).await {
                Ok(()) => FileOutcome::Written {
                    bytes: content.len() as u64,
                },
                Err(e) => FileOutcome::Error(e.to_string()),
            },
            Ok(JobOutcome::Failed(errors)) => FileOutcome::JobFailed(errors),
            Ok(JobOutcome::TimedOut) => FileOutcome::TimedOut,
            Ok(JobOutcome::Cancelled) => FileOutcome::Cancelled,
            Err(e) => FileOutcome::Error(e.to_string()),
        }
    }

    async fn write(&self, content: &[u8]) -> Result<()> {
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| Error::file(&self.path, e))
    }
}

fn describe(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Written { bytes } => format!("wrote {bytes} bytes"),
        FileOutcome::JobFailed(errors) => format!("job failed: {}", format_api_errors(errors)),
        FileOutcome::TimedOut => "job did not finish before the deadline".to_string(),
        FileOutcome::Cancelled => "cancelled".to_string(),
        FileOutcome::Error(message) => message.clone(),
    }
}
