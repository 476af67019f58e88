//! High-level pipeline: one run of ensure-root → gate → publish.
//!
//! [`contribute`] walks the run through
//! `Init → StorageReady → Decided{Existed|Created} → Published | NoOp | Failed`
//! and returns a [`ContributionReport`] recording every state it visited.
//!
//! # Responsibilities
//! - Fail fast: the first fatal error ends the run, and nothing is retried.
//! - Never publish twice for a day. Before the random category draw, the
//!   storage root is searched for any artifact with today's date, and if one
//!   exists its category wins.
//! - Never hide a half-finished publication. If the push fails after a local
//!   commit, the outcome is `Failed` with step `push` and the commit stays.
//!
//! # Concurrency
//! A run is strictly sequential and assumes it is the only writer to the
//! storage root and the work tree. Two concurrent runs against the same
//! repository are not guarded against.
//!
//! # Resuming
//! An interrupted run can leave an artifact written but not committed. The
//! next run sees it as `Existed`, asks the backend whether the path still
//! differs from the last commit, and if so stages it and commits it with the
//! "update" message. A clean `Existed` path makes no staging, commit, or push
//! call unless `republish_existing` is set.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::catalog::{select_category, Category};
use crate::config::PipelineConfig;
use crate::contract::{
    CatalogError, ContentCatalog, ContributeError, ContributionKey, Decision, FailureReason,
    PublicationOutcome, RepositoryBackend, StorageError,
};
use crate::gate::{self, Artifact};
use crate::publish::{commit_message, Publisher};

/// States of a single run, in the order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "decision", rename_all = "snake_case")]
pub enum RunState {
    Init,
    StorageReady,
    Decided(Decision),
    Published,
    NoOp,
    Failed,
}

/// Per-invocation inputs that are not part of the persistent config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub date: NaiveDate,
    /// Skip the random draw. Ignored if another category already has today's artifact.
    pub category: Option<Category>,
    /// Resolve the key and check the gate without writing or touching the backend.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            category: None,
            dry_run: false,
        }
    }
}

/// Everything a run decided and did.
#[derive(Debug, Clone, Serialize)]
pub struct ContributionReport {
    pub key: Option<ContributionKey>,
    pub path: Option<PathBuf>,
    pub decision: Option<Decision>,
    pub content_sha256: Option<String>,
    pub outcome: PublicationOutcome,
    pub states: Vec<RunState>,
}

impl ContributionReport {
    fn new() -> Self {
        Self {
            key: None,
            path: None,
            decision: None,
            content_sha256: None,
            outcome: PublicationOutcome::NoOpAlreadyExists,
            states: vec![RunState::Init],
        }
    }

    fn finish(mut self, outcome: PublicationOutcome) -> Self {
        let terminal = match &outcome {
            PublicationOutcome::Published { .. } => RunState::Published,
            PublicationOutcome::Failed(_) => RunState::Failed,
            _ => RunState::NoOp,
        };
        self.states.push(terminal);
        self.outcome = outcome;
        self
    }

    fn fail(self, err: ContributeError) -> Self {
        error!(reason = err.reason(), error = %err, "[CONTRIB][ERROR] Run failed");
        self.finish(PublicationOutcome::Failed(FailureReason::from(&err)))
    }
}

/// Runs the pipeline once and reports the terminal outcome.
pub async fn contribute<C, B>(
    config: &PipelineConfig,
    catalog: &C,
    backend: &B,
    options: &RunOptions,
) -> ContributionReport
where
    C: ContentCatalog + ?Sized,
    B: RepositoryBackend + ?Sized,
{
    let mut report = ContributionReport::new();
    let root = config.storage_root.as_path();
    info!(storage_root = %root.display(), date = %options.date, "[CONTRIB] Starting daily contribution");

    if let Err(e) = gate::ensure_storage_root(root) {
        return report.fail(e.into());
    }
    report.states.push(RunState::StorageReady);

    let category = match resolve_category(config, options) {
        Ok(c) => c,
        Err(e) => return report.fail(e),
    };
    let key = ContributionKey::new(options.date, category);
    report.key = Some(key);
    info!(%category, date = %key.date, "[CONTRIB] Contribution key resolved");

    if options.dry_run {
        return dry_run(config, catalog, &key, report);
    }

    let artifact = match gate::ensure_artifact(root, &key, &config.extension, catalog) {
        Ok(a) => a,
        Err(e) => return report.fail(e),
    };
    report.path = Some(artifact.path.clone());
    report.decision = Some(artifact.decision);
    report.states.push(RunState::Decided(artifact.decision));
    match digest(&artifact) {
        Ok(hash) => report.content_sha256 = Some(hash),
        Err(e) => return report.fail(e.into()),
    }

    if artifact.existed() && !config.republish_existing {
        match Publisher::new(backend).pending_change(&artifact.path).await {
            Ok(false) => {
                info!(path = %artifact.path.display(), "[CONTRIB] Artifact already existed; nothing to publish");
                return report.finish(PublicationOutcome::NoOpAlreadyExists);
            }
            Ok(true) => warn!(
                path = %artifact.path.display(),
                "[CONTRIB] Artifact exists but is not committed; resuming publication"
            ),
            Err(e) => return report.fail(e.into()),
        }
    }

    let outcome = match publish(backend, &artifact).await {
        Ok(outcome) => outcome,
        Err(e) => return report.fail(e),
    };
    info!(summary = %outcome.summary(), "[CONTRIB] Run complete");
    report.finish(outcome)
}

async fn publish<B>(backend: &B, artifact: &Artifact) -> Result<PublicationOutcome, ContributeError>
where
    B: RepositoryBackend + ?Sized,
{
    let publisher = Publisher::new(backend);
    publisher.check_identity().await;

    let Some(change) = publisher.stage(&artifact.path).await? else {
        return Ok(if artifact.existed() {
            PublicationOutcome::NoOpAlreadyExists
        } else {
            PublicationOutcome::NoOpNoChange
        });
    };

    let message = commit_message(&file_name(artifact), artifact.existed());
    let commit = publisher.commit(change, &message).await?;
    publisher.push(&commit).await?;
    Ok(PublicationOutcome::Published {
        commit_message: commit.message,
    })
}

/// Picks today's category: an existing artifact's category, else the
/// requested one, else a uniform draw from the configured set.
fn resolve_category(config: &PipelineConfig, options: &RunOptions) -> Result<Category, ContributeError> {
    if let Some((existing, path)) =
        gate::existing_for_date(&config.storage_root, options.date, &config.extension)?
    {
        if let Some(requested) = options.category.filter(|c| *c != existing) {
            warn!(
                %requested,
                %existing,
                path = %path.display(),
                "[CONTRIB] Today's artifact already has a different category; keeping it"
            );
        }
        return Ok(existing);
    }
    if let Some(requested) = options.category {
        return Ok(requested);
    }
    let mut rng = rand::thread_rng();
    select_category(&config.categories, &mut rng)
        .ok_or(ContributeError::Catalog(CatalogError::EmptyCategorySet))
}

fn dry_run<C>(
    config: &PipelineConfig,
    catalog: &C,
    key: &ContributionKey,
    mut report: ContributionReport,
) -> ContributionReport
where
    C: ContentCatalog + ?Sized,
{
    let path = match gate::artifact_path(&config.storage_root, key, &config.extension) {
        Ok(p) => p,
        Err(e) => return report.fail(e.into()),
    };
    report.path = Some(path.clone());
    let exists = match gate::path_exists(&path) {
        Ok(exists) => exists,
        Err(e) => return report.fail(e.into()),
    };
    if exists {
        report.decision = Some(Decision::Existed);
        report.states.push(RunState::Decided(Decision::Existed));
        return report.finish(PublicationOutcome::NoOpAlreadyExists);
    }
    // Body is discarded; a real run draws its own.
    if let Err(e) = gate::produce_document(catalog, key.category) {
        return report.fail(e.into());
    }
    let message = commit_message(&key.file_name(&config.extension), false);
    info!(path = %path.display(), "[CONTRIB] Dry run; artifact would be created");
    report.finish(PublicationOutcome::DryRun {
        commit_message: message,
    })
}

fn file_name(artifact: &Artifact) -> String {
    artifact
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn digest(artifact: &Artifact) -> Result<String, StorageError> {
    let bytes = fs::read(&artifact.path).map_err(|e| StorageError::io(&artifact.path, e))?;
    Ok(sha256_hex(&bytes))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
