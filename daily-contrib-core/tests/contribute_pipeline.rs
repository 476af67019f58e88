use std::fs;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::tempdir;

use daily_contrib_core::catalog::{BuiltinCatalog, Category};
use daily_contrib_core::config::PipelineConfig;
use daily_contrib_core::contract::{
    BackendError, BackendOp, CatalogError, Decision, MockContentCatalog, MockRepositoryBackend,
    PublicationOutcome, RepositoryBackend,
};
use daily_contrib_core::contribute::{contribute, RunOptions, RunState};

const ADD_MESSAGE: &str = "chore: add daily contribution - 2024-01-15-til.md";

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

fn til_options() -> RunOptions {
    RunOptions {
        date: day(),
        category: Some(Category::Til),
        dry_run: false,
    }
}

fn fixed_catalog(body: &'static str) -> MockContentCatalog {
    let mut catalog = MockContentCatalog::new();
    catalog
        .expect_produce()
        .returning(move |_| Ok(body.to_string()));
    catalog
}

/// Backend that accepts every call and reports a staged change.
fn accepting_backend() -> MockRepositoryBackend {
    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().returning(|| true);
    backend.expect_has_pending_change().returning(|_| Ok(false));
    backend.expect_stage().returning(|_| Ok(()));
    backend.expect_has_staged_change().returning(|_| Ok(true));
    backend.expect_commit().returning(|_, _| Ok(()));
    backend.expect_push().returning(|| Ok(()));
    backend
}

fn files_for_day(root: &Path) -> Vec<String> {
    fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("2024-01-15-"))
        .collect()
}

/// Hand-rolled fake that records the call order and refuses to commit
/// unless the latest staged-change check returned true.
struct RecordingBackend {
    calls: Mutex<Vec<&'static str>>,
    last_diff: Mutex<Option<bool>>,
    staged_change: bool,
    push_error: Option<&'static str>,
}

impl RecordingBackend {
    fn new(staged_change: bool, push_error: Option<&'static str>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            last_diff: Mutex::new(None),
            staged_change,
            push_error,
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryBackend for RecordingBackend {
    async fn has_identity(&self) -> bool {
        self.calls.lock().unwrap().push("identity");
        true
    }

    async fn has_pending_change(&self, _path: &Path) -> Result<bool, BackendError> {
        self.calls.lock().unwrap().push("pending");
        Ok(false)
    }

    async fn stage(&self, _path: &Path) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push("stage");
        Ok(())
    }

    async fn has_staged_change(&self, _path: &Path) -> Result<bool, BackendError> {
        self.calls.lock().unwrap().push("diff");
        *self.last_diff.lock().unwrap() = Some(self.staged_change);
        Ok(self.staged_change)
    }

    async fn commit(&self, _path: &Path, _message: &str) -> Result<(), BackendError> {
        assert_eq!(
            *self.last_diff.lock().unwrap(),
            Some(true),
            "commit called without a preceding positive staged-change check"
        );
        self.calls.lock().unwrap().push("commit");
        Ok(())
    }

    async fn push(&self) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push("push");
        match self.push_error {
            Some(detail) => Err(BackendError::new(BackendOp::Push, detail)),
            None => Ok(()),
        }
    }
}

#[tokio::test]
async fn first_run_on_empty_root_publishes_with_add_message() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path().join("contributions"));
    let catalog = fixed_catalog("# TIL\n");

    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().times(1).returning(|| true);
    backend
        .expect_stage()
        .withf(|path| path.ends_with("2024-01-15-til.md"))
        .times(1)
        .returning(|_| Ok(()));
    backend
        .expect_has_staged_change()
        .times(1)
        .returning(|_| Ok(true));
    backend
        .expect_commit()
        .withf(|path, message| path.ends_with("2024-01-15-til.md") && message == ADD_MESSAGE)
        .times(1)
        .returning(|_, _| Ok(()));
    backend.expect_push().times(1).returning(|| Ok(()));

    let report = contribute(&config, &catalog, &backend, &til_options()).await;

    assert_eq!(
        report.outcome,
        PublicationOutcome::Published {
            commit_message: ADD_MESSAGE.to_string()
        }
    );
    assert_eq!(report.outcome.exit_code(), 0);
    assert_eq!(report.decision, Some(Decision::Created));
    assert_eq!(
        report.states,
        vec![
            RunState::Init,
            RunState::StorageReady,
            RunState::Decided(Decision::Created),
            RunState::Published
        ]
    );
    let written = config.storage_root.join("2024-01-15-til.md");
    assert_eq!(fs::read_to_string(written).unwrap(), "# TIL\n");
    assert!(report.content_sha256.is_some());
}

#[tokio::test]
async fn second_run_same_key_is_noop_without_publishing_calls() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    let first = contribute(
        &config,
        &fixed_catalog("# first\n"),
        &accepting_backend(),
        &til_options(),
    )
    .await;
    assert_eq!(first.decision, Some(Decision::Created));
    let path = dir.path().join("2024-01-15-til.md");
    let before = fs::read(&path).unwrap();

    // Only the read-only status query is expected; staging, committing or pushing panics.
    let mut backend = MockRepositoryBackend::new();
    backend
        .expect_has_pending_change()
        .times(1)
        .returning(|_| Ok(false));
    let mut catalog = MockContentCatalog::new();
    catalog.expect_produce().never();

    let second = contribute(&config, &catalog, &backend, &til_options()).await;

    assert_eq!(second.outcome, PublicationOutcome::NoOpAlreadyExists);
    assert_eq!(second.outcome.exit_code(), 0);
    assert_eq!(second.decision, Some(Decision::Existed));
    assert_eq!(second.states.last(), Some(&RunState::NoOp));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(first.content_sha256, second.content_sha256);
}

#[tokio::test]
async fn empty_stage_never_reaches_commit() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().returning(|| true);
    backend.expect_stage().times(1).returning(|_| Ok(()));
    backend
        .expect_has_staged_change()
        .times(1)
        .returning(|_| Ok(false));
    backend.expect_commit().never();
    backend.expect_push().never();

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    assert_eq!(report.outcome, PublicationOutcome::NoOpNoChange);
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn recording_fake_sees_no_commit_after_negative_check() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    let backend = RecordingBackend::new(false, None);

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    assert_eq!(report.outcome, PublicationOutcome::NoOpNoChange);
    assert_eq!(backend.calls(), vec!["identity", "stage", "diff"]);
}

#[tokio::test]
async fn push_failure_is_failed_push_and_keeps_local_commit() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    let backend = RecordingBackend::new(true, Some("could not read from remote"));

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    match &report.outcome {
        PublicationOutcome::Failed(reason) => {
            assert_eq!(reason.step, "push");
            assert!(reason.detail.contains("could not read from remote"));
        }
        other => panic!("expected push failure, got {other:?}"),
    }
    assert_ne!(report.outcome.exit_code(), 0);
    assert_eq!(report.states.last(), Some(&RunState::Failed));
    // The commit happened and nothing ran after the failed push.
    assert_eq!(
        backend.calls(),
        vec!["identity", "stage", "diff", "commit", "push"]
    );
    assert!(dir.path().join("2024-01-15-til.md").exists());
}

#[tokio::test]
async fn commit_failure_stops_before_push() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().returning(|| true);
    backend.expect_stage().returning(|_| Ok(()));
    backend.expect_has_staged_change().returning(|_| Ok(true));
    backend
        .expect_commit()
        .times(1)
        .returning(|_, _| Err(BackendError::new(BackendOp::Commit, "hook rejected")));
    backend.expect_push().never();

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    match report.outcome {
        PublicationOutcome::Failed(reason) => {
            assert_eq!(reason.step, "commit");
            assert!(reason.detail.contains("hook rejected"));
        }
        other => panic!("expected commit failure, got {other:?}"),
    }
}

#[tokio::test]
async fn stage_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().returning(|| true);
    backend
        .expect_stage()
        .returning(|_| Err(BackendError::new(BackendOp::Stage, "not a git repository")));
    backend.expect_has_staged_change().never();
    backend.expect_commit().never();

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    assert!(matches!(
        report.outcome,
        PublicationOutcome::Failed(ref r) if r.step == "stage"
    ));
}

#[tokio::test]
async fn missing_identity_only_warns() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().times(1).returning(|| false);
    backend.expect_stage().returning(|_| Ok(()));
    backend.expect_has_staged_change().returning(|_| Ok(true));
    backend.expect_commit().times(1).returning(|_, _| Ok(()));
    backend.expect_push().times(1).returning(|| Ok(()));

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    assert!(matches!(report.outcome, PublicationOutcome::Published { .. }));
}

#[tokio::test]
async fn republishing_an_externally_edited_artifact_uses_update_message() {
    let dir = tempdir().unwrap();
    let mut config = PipelineConfig::new(dir.path());
    config.republish_existing = true;
    fs::write(dir.path().join("2024-01-15-til.md"), "# edited by hand\n").unwrap();

    let mut catalog = MockContentCatalog::new();
    catalog.expect_produce().never();
    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().returning(|| true);
    backend.expect_stage().times(1).returning(|_| Ok(()));
    backend
        .expect_has_staged_change()
        .times(1)
        .returning(|_| Ok(true));
    backend
        .expect_commit()
        .withf(|_, message| message == "chore: update daily contribution - 2024-01-15-til.md")
        .times(1)
        .returning(|_, _| Ok(()));
    backend.expect_push().times(1).returning(|| Ok(()));

    let report = contribute(&config, &catalog, &backend, &til_options()).await;

    assert_eq!(report.decision, Some(Decision::Existed));
    assert!(matches!(
        report.outcome,
        PublicationOutcome::Published { ref commit_message } if commit_message.contains("update")
    ));
    assert_eq!(
        fs::read_to_string(dir.path().join("2024-01-15-til.md")).unwrap(),
        "# edited by hand\n"
    );
}

#[tokio::test]
async fn republishing_an_unchanged_artifact_is_already_exists() {
    let dir = tempdir().unwrap();
    let mut config = PipelineConfig::new(dir.path());
    config.republish_existing = true;
    fs::write(dir.path().join("2024-01-15-til.md"), "# committed\n").unwrap();

    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_identity().returning(|| true);
    backend.expect_stage().returning(|_| Ok(()));
    backend.expect_has_staged_change().returning(|_| Ok(false));
    backend.expect_commit().never();

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    assert_eq!(report.outcome, PublicationOutcome::NoOpAlreadyExists);
}

#[tokio::test]
async fn repeated_random_runs_leave_one_artifact_per_day() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    let catalog = BuiltinCatalog::new(day());
    let backend = accepting_backend();
    let options = RunOptions::for_date(day());

    let mut created = 0;
    for _ in 0..12 {
        let report = contribute(&config, &catalog, &backend, &options).await;
        assert!(report.outcome.is_success());
        if report.decision == Some(Decision::Created) {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(files_for_day(dir.path()).len(), 1);
}

#[tokio::test]
async fn requested_category_yields_to_existing_artifact_of_the_day() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    fs::write(dir.path().join("2024-01-15-note.md"), "# note\n").unwrap();

    let mut backend = MockRepositoryBackend::new();
    backend.expect_has_pending_change().returning(|_| Ok(false));

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    assert_eq!(report.key.map(|k| k.category), Some(Category::Note));
    assert_eq!(report.outcome, PublicationOutcome::NoOpAlreadyExists);
    assert_eq!(files_for_day(dir.path()), vec!["2024-01-15-note.md"]);
}

#[tokio::test]
async fn storage_failure_aborts_before_backend() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("file-not-dir");
    fs::write(&blocker, "x").unwrap();
    let config = PipelineConfig::new(&blocker);

    let report = contribute(
        &config,
        &fixed_catalog("# x\n"),
        &MockRepositoryBackend::new(),
        &til_options(),
    )
    .await;

    assert!(matches!(
        report.outcome,
        PublicationOutcome::Failed(ref r) if r.step == "storage"
    ));
    assert_eq!(report.states, vec![RunState::Init, RunState::Failed]);
}

#[tokio::test]
async fn catalog_failure_writes_nothing() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    let mut catalog = MockContentCatalog::new();
    catalog
        .expect_produce()
        .returning(|c| Err(CatalogError::EmptyDocument(c)));

    let report = contribute(
        &config,
        &catalog,
        &MockRepositoryBackend::new(),
        &til_options(),
    )
    .await;

    assert!(matches!(
        report.outcome,
        PublicationOutcome::Failed(ref r) if r.step == "catalog"
    ));
    assert!(files_for_day(dir.path()).is_empty());
}

#[tokio::test]
async fn dry_run_touches_neither_disk_nor_backend() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    let options = RunOptions {
        dry_run: true,
        ..til_options()
    };

    let report = contribute(
        &config,
        &fixed_catalog("# x\n"),
        &MockRepositoryBackend::new(),
        &options,
    )
    .await;

    assert_eq!(
        report.outcome,
        PublicationOutcome::DryRun {
            commit_message: ADD_MESSAGE.to_string()
        }
    );
    assert!(files_for_day(dir.path()).is_empty());
}

#[tokio::test]
async fn report_serialises_outcome_and_states() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());

    let report = contribute(
        &config,
        &fixed_catalog("# x\n"),
        &accepting_backend(),
        &til_options(),
    )
    .await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["outcome"]["outcome"], "published");
    assert_eq!(json["outcome"]["commit_message"], ADD_MESSAGE);
    assert_eq!(json["key"]["category"], "til");
    assert_eq!(json["states"][2]["state"], "decided");
    assert_eq!(json["states"][2]["decision"], "created");
}

#[tokio::test]
async fn interrupted_run_is_resumed_with_update_message() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    fs::write(dir.path().join("2024-01-15-til.md"), "# written, never committed\n").unwrap();

    let mut catalog = MockContentCatalog::new();
    catalog.expect_produce().never();
    let mut backend = MockRepositoryBackend::new();
    backend
        .expect_has_pending_change()
        .times(1)
        .returning(|_| Ok(true));
    backend.expect_has_identity().returning(|| true);
    backend.expect_stage().times(1).returning(|_| Ok(()));
    backend
        .expect_has_staged_change()
        .times(1)
        .returning(|_| Ok(true));
    backend
        .expect_commit()
        .withf(|_, message| message == "chore: update daily contribution - 2024-01-15-til.md")
        .times(1)
        .returning(|_, _| Ok(()));
    backend.expect_push().times(1).returning(|| Ok(()));

    let report = contribute(&config, &catalog, &backend, &til_options()).await;

    assert_eq!(report.decision, Some(Decision::Existed));
    assert!(matches!(report.outcome, PublicationOutcome::Published { .. }));
    assert_eq!(report.states.last(), Some(&RunState::Published));
}

#[tokio::test]
async fn status_query_failure_is_fatal_for_existing_artifact() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    fs::write(dir.path().join("2024-01-15-til.md"), "# x\n").unwrap();

    let mut backend = MockRepositoryBackend::new();
    backend
        .expect_has_pending_change()
        .returning(|_| Err(BackendError::new(BackendOp::Status, "not a git repository")));
    backend.expect_stage().never();

    let report = contribute(&config, &fixed_catalog("# x\n"), &backend, &til_options()).await;

    assert!(matches!(
        report.outcome,
        PublicationOutcome::Failed(ref r) if r.step == "status"
    ));
}

#[tokio::test]
async fn dry_run_refuses_an_empty_document_and_reports_no_hash() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    let options = RunOptions {
        dry_run: true,
        ..til_options()
    };

    let blank = contribute(
        &config,
        &fixed_catalog("  \n"),
        &MockRepositoryBackend::new(),
        &options,
    )
    .await;
    assert!(matches!(
        blank.outcome,
        PublicationOutcome::Failed(ref r) if r.step == "catalog"
    ));

    let ok = contribute(
        &config,
        &fixed_catalog("# x\n"),
        &MockRepositoryBackend::new(),
        &options,
    )
    .await;
    assert!(matches!(ok.outcome, PublicationOutcome::DryRun { .. }));
    assert_eq!(ok.content_sha256, None);
}

#[cfg(unix)]
#[tokio::test]
async fn dry_run_treats_a_dangling_symlink_as_existing() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path());
    std::os::unix::fs::symlink(
        dir.path().join("missing-target"),
        dir.path().join("2024-01-15-til.md"),
    )
    .unwrap();
    let options = RunOptions {
        dry_run: true,
        ..til_options()
    };
    let mut catalog = MockContentCatalog::new();
    catalog.expect_produce().never();

    let report = contribute(&config, &catalog, &MockRepositoryBackend::new(), &options).await;

    assert_eq!(report.outcome, PublicationOutcome::NoOpAlreadyExists);
    assert_eq!(report.decision, Some(Decision::Existed));
}
