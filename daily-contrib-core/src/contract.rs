//! # contract: seams between the pipeline and its collaborators
//!
//! This module holds the two traits the pipeline consumes and the plain data
//! that flows across them:
//! - [`ContentCatalog`] renders a document for a [`Category`].
//! - [`RepositoryBackend`] queries, stages, commits, and pushes a single path.
//!
//! Both traits are annotated for `mockall` (behind `test-export-mocks`) so
//! tests can assert which backend calls happen and which never do.
//!
//! Error types live here too, one per failure family. Every fatal error
//! converts into [`ContributeError`], whose [`ContributeError::reason`] names
//! the step that failed.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::catalog::Category;

/// Identifies at most one artifact: one calendar day, one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContributionKey {
    pub date: NaiveDate,
    pub category: Category,
}

impl ContributionKey {
    pub fn new(date: NaiveDate, category: Category) -> Self {
        Self { date, category }
    }

    /// `<YYYY-MM-DD>-` prefix shared by every artifact of the day.
    pub fn date_prefix(date: NaiveDate) -> String {
        format!("{}-", date.format("%Y-%m-%d"))
    }

    /// Deterministic file name, e.g. `2024-01-15-til.md`.
    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "{}{}.{}",
            Self::date_prefix(self.date),
            self.category,
            extension
        )
    }
}

/// What the idempotency gate found at the artifact path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Existed,
    Created,
}

/// Why a run failed: the step name plus the diagnostic that came with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    pub step: &'static str,
    pub detail: String,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.detail)
    }
}

impl From<&ContributeError> for FailureReason {
    fn from(e: &ContributeError) -> Self {
        FailureReason {
            step: e.reason(),
            detail: e.to_string(),
        }
    }
}

/// Terminal result of one run.
///
/// The two no-op variants are kept apart: one means the artifact was already
/// there, the other means it was written but staging saw no difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublicationOutcome {
    Published { commit_message: String },
    NoOpAlreadyExists,
    NoOpNoChange,
    /// Only produced with `dry_run`: the artifact is absent and would be published.
    DryRun { commit_message: String },
    Failed(FailureReason),
}

impl PublicationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, PublicationOutcome::Failed(_))
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Single user-facing line describing the outcome.
    pub fn summary(&self) -> String {
        match self {
            PublicationOutcome::Published { commit_message } => {
                format!("published: {commit_message}")
            }
            PublicationOutcome::NoOpAlreadyExists => {
                "nothing to do: today's contribution already exists".to_string()
            }
            PublicationOutcome::NoOpNoChange => {
                "nothing to do: staging found no change to commit".to_string()
            }
            PublicationOutcome::DryRun { commit_message } => {
                format!("dry run: would publish '{commit_message}'")
            }
            PublicationOutcome::Failed(reason) => format!("failed: {reason}"),
        }
    }
}

/// Produces document bodies. Must be total over [`Category`] and must not
/// read or mutate persisted state.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ContentCatalog: Send + Sync {
    fn produce(&self, category: Category) -> Result<String, CatalogError>;
}

/// The version-control operations the publisher needs.
///
/// There is no rollback operation: a local commit that fails to
/// push stays in history.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// Whether an author identity is configured. A `false` here is a warning only.
    async fn has_identity(&self) -> bool;

    /// Whether `path` differs from the last commit, tracked or not. Read-only:
    /// must not touch the pending-change set.
    async fn has_pending_change(&self, path: &Path) -> Result<bool, BackendError>;

    /// Add `path` to the pending-change set.
    async fn stage(&self, path: &Path) -> Result<(), BackendError>;

    /// Whether the pending-change set contains a change for `path`.
    async fn has_staged_change(&self, path: &Path) -> Result<bool, BackendError>;

    /// Record the staged change of `path`, and nothing else, as a new history entry.
    async fn commit(&self, path: &Path, message: &str) -> Result<(), BackendError>;

    /// Send local history upstream.
    async fn push(&self) -> Result<(), BackendError>;
}

#[derive(Debug)]
pub enum StorageError {
    Io { path: PathBuf, source: std::io::Error },
    NotADirectory(PathBuf),
    OutsideRoot { root: PathBuf, name: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io { path, source } => {
                write!(f, "I/O error at {}: {}", path.display(), source)
            }
            StorageError::NotADirectory(path) => {
                write!(f, "storage root {} is not a directory", path.display())
            }
            StorageError::OutsideRoot { root, name } => write!(
                f,
                "artifact name '{}' would escape storage root {}",
                name,
                root.display()
            ),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    UnknownCategory(String),
    EmptyDocument(Category),
    EmptyCategorySet,
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::UnknownCategory(name) => write!(
                f,
                "unknown category '{}' (expected one of: {})",
                name,
                Category::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            CatalogError::EmptyDocument(category) => {
                write!(f, "catalog produced an empty document for '{category}'")
            }
            CatalogError::EmptyCategorySet => write!(f, "no categories configured to choose from"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// The backend operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOp {
    Status,
    Stage,
    Diff,
    Commit,
    Push,
}

impl BackendOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendOp::Status => "status",
            BackendOp::Stage => "stage",
            BackendOp::Diff => "diff",
            BackendOp::Commit => "commit",
            BackendOp::Push => "push",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub op: BackendOp,
    pub detail: String,
}

impl BackendError {
    pub fn new(op: BackendOp, detail: impl Into<String>) -> Self {
        Self {
            op,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.op.as_str(), self.detail)?;
        if self.op == BackendOp::Push {
            write!(f, " (the local commit was kept; push again to publish it)")?;
        }
        Ok(())
    }
}

impl std::error::Error for BackendError {}

/// Any fatal error of a run.
#[derive(Debug)]
pub enum ContributeError {
    Storage(StorageError),
    Catalog(CatalogError),
    Backend(BackendError),
}

impl ContributeError {
    /// Short name of the failed step: `storage`, `catalog`, or the [`BackendOp`] name.
    pub fn reason(&self) -> &'static str {
        match self {
            ContributeError::Storage(_) => "storage",
            ContributeError::Catalog(_) => "catalog",
            ContributeError::Backend(e) => e.op.as_str(),
        }
    }
}

impl fmt::Display for ContributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributeError::Storage(e) => e.fmt(f),
            ContributeError::Catalog(e) => e.fmt(f),
            ContributeError::Backend(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ContributeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContributeError::Storage(e) => Some(e),
            ContributeError::Catalog(e) => Some(e),
            ContributeError::Backend(e) => Some(e),
        }
    }
}

impl From<StorageError> for ContributeError {
    fn from(e: StorageError) -> Self {
        ContributeError::Storage(e)
    }
}

impl From<CatalogError> for ContributeError {
    fn from(e: CatalogError) -> Self {
        ContributeError::Catalog(e)
    }
}

impl From<BackendError> for ContributeError {
    fn from(e: BackendError) -> Self {
        ContributeError::Backend(e)
    }
}
