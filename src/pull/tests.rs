use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;

use super::*;
use crate::config::ResourceConfig;
use crate::error::ApiErrorItem;
use crate::staleness::SkipReason;
use crate::test_helpers::{DownloadScript, FixedTimestamps, ScriptedApi, day};
use crate::types::ResourceLanguageStat;

const RESOURCE: &str = "o:acme:p:web:r:app";
const FILTER: &str = "locales/<lang>/app.po";

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

fn mapping(root: &Path, resource: &str) -> FileMapping {
    let config = ResourceConfig {
        resource_id: resource.to_string(),
        file_filter: FILTER.to_string(),
        source_lang: "en".to_string(),
        ..Default::default()
    };
    FileMapping::load(&config, root).unwrap()
}

fn fast_config() -> PullConfig {
    PullConfig {
        poll_interval: Duration::from_millis(5),
        job_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn stats(languages: &[&str]) -> Vec<ResourceLanguageStat> {
    languages
        .iter()
        .map(|l| ResourceLanguageStat::new(*l, day(2024, 1, 2)))
        .collect()
}

fn resource_id() -> ResourceId {
    RESOURCE.parse().unwrap()
}

/// Project with `fr` older and `de` newer than the remote (2024-01-02),
/// `es` known remotely but absent locally
struct Scenario {
    root: TempDir,
    api: Arc<ScriptedApi>,
    timestamps: Arc<FixedTimestamps>,
}

impl Scenario {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        write(root.path(), "locales/en/app.po", "source");
        write(root.path(), "locales/fr/app.po", "old fr");
        write(root.path(), "locales/de/app.po", "old de");
        fs::create_dir_all(root.path().join("locales/es")).unwrap();

        let api = ScriptedApi::new()
            .with_stats(RESOURCE, stats(&["en", "fr", "de", "es"]))
            .with_download("fr", DownloadScript::AfterPolls(2, b"new fr".to_vec()))
            .with_download("de", DownloadScript::Immediate(b"new de".to_vec()))
            .with_download("es", DownloadScript::Immediate(b"new es".to_vec()));

        let timestamps = FixedTimestamps::new()
            .with(&root.path().join("locales/fr/app.po"), day(2024, 1, 1))
            .with(&root.path().join("locales/de/app.po"), day(2024, 1, 3));

        Self {
            root,
            api: Arc::new(api),
            timestamps: Arc::new(timestamps),
        }
    }

    fn orchestrator(&self) -> PullOrchestrator {
        PullOrchestrator::new(self.api.clone(), fast_config())
            .with_timestamp_source(self.timestamps.clone())
    }

    async fn run(&self, options: PullOptions) -> PullReport {
        let mappings = vec![mapping(self.root.path(), RESOURCE)];
        self.orchestrator().run(&mappings, &options).await.unwrap()
    }
}

#[tokio::test]
async fn default_run_refreshes_only_stale_tracked_files() {
    let scenario = Scenario::new();

    let report = scenario.run(PullOptions::default()).await;

    assert_eq!(scenario.api.created_languages(), ["fr"]);
    assert_eq!(read(scenario.root.path(), "locales/fr/app.po"), "new fr");
    assert_eq!(read(scenario.root.path(), "locales/de/app.po"), "old de");
    assert!(!scenario.root.path().join("locales/es/app.po").exists());

    assert!(report.is_success());
    assert_eq!(report.written(), 1);
    let fr = report.file(&resource_id(), "fr").unwrap();
    assert_eq!(fr.reason, Some(DownloadReason::Stale));
    assert_eq!(fr.outcome, FileOutcome::Written { bytes: 6 });

    let mut skipped: Vec<_> = report
        .skipped
        .iter()
        .map(|s| (s.language.as_str(), s.reason))
        .collect();
    skipped.sort_by_key(|(language, _)| *language);
    assert_eq!(
        skipped,
        [
            ("de", SkipReason::UpToDate),
            ("en", SkipReason::IsSourceLanguage),
            ("es", SkipReason::NotTrackedLocally),
        ]
    );
}

#[tokio::test]
async fn all_also_fetches_untracked_languages() {
    let scenario = Scenario::new();

    let report = scenario
        .run(PullOptions {
            all: true,
            ..Default::default()
        })
        .await;

    assert_eq!(scenario.api.created_languages(), ["es", "fr"]);
    assert_eq!(read(scenario.root.path(), "locales/es/app.po"), "new es");
    assert_eq!(
        report.file(&resource_id(), "es").unwrap().reason,
        Some(DownloadReason::New)
    );
    assert_eq!(report.written(), 2);
}

#[tokio::test]
async fn skip_existing_protects_stale_files() {
    let scenario = Scenario::new();

    let report = scenario
        .run(PullOptions {
            skip_existing: true,
            ..Default::default()
        })
        .await;

    assert!(scenario.api.created_languages().is_empty());
    assert_eq!(read(scenario.root.path(), "locales/fr/app.po"), "old fr");
    assert!(
        report
            .skipped
            .iter()
            .any(|s| s.language == "fr" && s.reason == SkipReason::ExistingFileProtected)
    );
}

#[tokio::test]
async fn force_refreshes_current_files() {
    let scenario = Scenario::new();

    scenario
        .run(PullOptions {
            force: true,
            ..Default::default()
        })
        .await;

    assert_eq!(scenario.api.created_languages(), ["de", "fr"]);
    assert_eq!(read(scenario.root.path(), "locales/de/app.po"), "new de");
}

#[tokio::test]
async fn one_failing_job_does_not_affect_siblings() {
    let root = tempfile::tempdir().unwrap();
    let languages = ["de", "es", "fr", "it", "nl"];
    for language in languages {
        fs::create_dir_all(root.path().join(format!("locales/{language}"))).unwrap();
    }

    let mut api = ScriptedApi::new().with_stats(RESOURCE, stats(&languages));
    for language in languages {
        let script = if language == "it" {
            DownloadScript::Fail(vec![ApiErrorItem {
                code: "export_failed".into(),
                detail: "no translations".into(),
                ..Default::default()
            }])
        } else {
            DownloadScript::AfterPolls(2, language.as_bytes().to_vec())
        };
        api = api.with_download(language, script);
    }

    let orchestrator = PullOrchestrator::new(Arc::new(api), fast_config());
    let report = orchestrator
        .run(
            &[mapping(root.path(), RESOURCE)],
            &PullOptions {
                all: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(report.files.len(), 5);
    assert_eq!(report.written(), 4);
    assert!(!report.is_success());
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].language, "it");
    assert!(matches!(failed[0].outcome, FileOutcome::JobFailed(ref e) if e[0].code == "export_failed"));

    for language in ["de", "es", "fr", "nl"] {
        assert_eq!(read(root.path(), &format!("locales/{language}/app.po")), language);
    }
    assert!(!root.path().join("locales/it/app.po").exists());
}

#[tokio::test]
async fn concurrent_downloads_respect_the_limit() {
    let root = tempfile::tempdir().unwrap();
    let languages = ["ar", "cs", "da", "el", "fi", "hu"];
    let mut api = ScriptedApi::new().with_stats(RESOURCE, stats(&languages));
    for language in languages {
        fs::create_dir_all(root.path().join(format!("locales/{language}"))).unwrap();
        api = api.with_download(language, DownloadScript::AfterPolls(3, b"x".to_vec()));
    }
    let api = Arc::new(api);

    let config = PullConfig {
        max_concurrent_downloads: 2,
        ..fast_config()
    };
    let report = PullOrchestrator::new(api.clone(), config)
        .run(
            &[mapping(root.path(), RESOURCE)],
            &PullOptions {
                all: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(report.written(), 6);
    let peak = api.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "{peak} jobs ran at once");
    assert!(peak >= 1);
}

#[tokio::test]
async fn isolate_records_mapping_failure_and_continues() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "locales/fr/app.po", "old");
    let broken = "o:acme:p:web:r:broken";

    let api = ScriptedApi::new()
        .with_failing_stats(broken)
        .with_stats(RESOURCE, stats(&["fr"]))
        .with_download("fr", DownloadScript::Immediate(b"new".to_vec()));
    let mappings = [mapping(root.path(), broken), mapping(root.path(), RESOURCE)];

    let mut events = {
        let orchestrator = PullOrchestrator::new(Arc::new(api), fast_config())
            .with_timestamp_source(Arc::new(FixedTimestamps::new().with(
                &root.path().join("locales/fr/app.po"),
                day(2024, 1, 1),
            )));
        let events = orchestrator.subscribe();
        let report = orchestrator
            .run(&mappings, &PullOptions::default())
            .await
            .unwrap();

        assert_eq!(report.mapping_failures.len(), 1);
        assert_eq!(report.mapping_failures[0].resource.to_string(), broken);
        assert_eq!(report.written(), 1);
        assert!(!report.is_success());
        events
    };

    let mut mapping_failed = false;
    while let Ok(event) = events.try_recv() {
        if let PullEvent::MappingFailed { resource, .. } = event {
            assert_eq!(resource, broken);
            mapping_failed = true;
        }
    }
    assert!(mapping_failed);
    assert_eq!(read(root.path(), "locales/fr/app.po"), "new");
}

#[tokio::test]
async fn fail_fast_aborts_on_stats_error() {
    let root = tempfile::tempdir().unwrap();
    let api = ScriptedApi::new().with_failing_stats(RESOURCE);
    let config = PullConfig {
        failure_policy: FailurePolicy::FailFast,
        ..fast_config()
    };

    let result = PullOrchestrator::new(Arc::new(api), config)
        .run(&[mapping(root.path(), RESOURCE)], &PullOptions::default())
        .await;

    assert!(matches!(result, Err(Error::Api { status: 500, .. })));
}

#[tokio::test]
async fn missing_timestamp_follows_failure_policy() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "locales/fr/app.po", "old");
    let api = Arc::new(
        ScriptedApi::new()
            .with_stats(RESOURCE, stats(&["fr"]))
            .with_download("fr", DownloadScript::Immediate(b"new".to_vec())),
    );
    let mappings = [mapping(root.path(), RESOURCE)];

    let isolated = PullOrchestrator::new(api.clone(), fast_config())
        .with_timestamp_source(Arc::new(FixedTimestamps::new()))
        .run(&mappings, &PullOptions::default())
        .await
        .unwrap();
    let fr = isolated.file(&resource_id(), "fr").unwrap();
    assert_eq!(fr.reason, None);
    assert!(matches!(fr.outcome, FileOutcome::Error(ref m) if m.contains("no commit history")));
    assert!(api.created_languages().is_empty());

    let fail_fast = PullOrchestrator::new(
        api.clone(),
        PullConfig {
            failure_policy: FailurePolicy::FailFast,
            ..fast_config()
        },
    )
    .with_timestamp_source(Arc::new(FixedTimestamps::new()))
    .run(&mappings, &PullOptions::default())
    .await;
    assert!(matches!(fail_fast, Err(Error::TimestampUnavailable { .. })));
    assert_eq!(read(root.path(), "locales/fr/app.po"), "old");
}

#[tokio::test]
async fn cancel_reports_in_flight_downloads_as_cancelled() {
    let root = tempfile::tempdir().unwrap();
    for language in ["fr", "de"] {
        fs::create_dir_all(root.path().join(format!("locales/{language}"))).unwrap();
    }
    let api = ScriptedApi::new()
        .with_stats(RESOURCE, stats(&["fr", "de"]))
        .with_download("fr", DownloadScript::PendingForever)
        .with_download("de", DownloadScript::PendingForever);
    let config = PullConfig {
        job_timeout: Duration::from_secs(60),
        ..fast_config()
    };
    let orchestrator = Arc::new(PullOrchestrator::new(Arc::new(api), config));
    let mappings = vec![mapping(root.path(), RESOURCE)];

    let handle = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .run(
                    &mappings,
                    &PullOptions {
                        all: true,
                        ..Default::default()
                    },
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not return after cancel")
        .unwrap()
        .unwrap();
    assert_eq!(report.files.len(), 2);
    assert!(
        report
            .files
            .iter()
            .all(|f| f.outcome == FileOutcome::Cancelled)
    );
}

#[tokio::test]
async fn duplicate_mappings_are_processed_once() {
    let root = tempfile::tempdir().unwrap();
    let api = Arc::new(ScriptedApi::new().with_stats(RESOURCE, stats(&["en"])));
    let mappings = [mapping(root.path(), RESOURCE), mapping(root.path(), RESOURCE)];

    let report = PullOrchestrator::new(api.clone(), fast_config())
        .run(&mappings, &PullOptions::default())
        .await
        .unwrap();

    assert_eq!(api.stats_calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.skipped.len(), 1);
}

#[tokio::test]
async fn language_overrides_map_remote_codes_to_local_files() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "locales/pt-BR/app.po", "old");
    let config = ResourceConfig {
        resource_id: RESOURCE.to_string(),
        file_filter: FILTER.to_string(),
        source_lang: "en".to_string(),
        language_overrides: [("pt_BR".to_string(), "pt-BR".to_string())].into(),
        ..Default::default()
    };
    let mapping = FileMapping::load(&config, root.path()).unwrap();

    let api = Arc::new(
        ScriptedApi::new()
            .with_stats(RESOURCE, stats(&["pt_BR"]))
            .with_download("pt_BR", DownloadScript::Immediate(b"novo".to_vec())),
    );
    let report = PullOrchestrator::new(api.clone(), fast_config())
        .run(
            &[mapping],
            &PullOptions {
                force: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(api.created_languages(), ["pt_BR"]);
    assert_eq!(read(root.path(), "locales/pt-BR/app.po"), "novo");
    assert_eq!(report.written(), 1);
}

#[tokio::test]
async fn events_follow_the_download_lifecycle() {
    let scenario = Scenario::new();
    let orchestrator = scenario.orchestrator();
    let mut events = orchestrator.subscribe();

    orchestrator
        .run(
            &[mapping(scenario.root.path(), RESOURCE)],
            &PullOptions::default(),
        )
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            PullEvent::DownloadStarted { language, .. } => kinds.push(format!("started:{language}")),
            PullEvent::DownloadComplete { language, bytes, .. } => {
                kinds.push(format!("complete:{language}:{bytes}"))
            }
            PullEvent::Skipped { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(kinds, ["started:fr", "complete:fr:6"]);
}

#[tokio::test]
async fn git_timestamps_without_git_fail_before_any_request() {
    if GitTimestampSource::from_path().is_some() {
        println!("Skipping test: git is installed");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let api = Arc::new(ScriptedApi::new());

    let result = PullOrchestrator::new(api.clone(), fast_config())
        .run(
            &[mapping(root.path(), RESOURCE)],
            &PullOptions {
                use_git_timestamps: true,
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(Error::ExternalTool(_))));
    assert_eq!(api.stats_calls.load(Ordering::SeqCst), 0);
}
