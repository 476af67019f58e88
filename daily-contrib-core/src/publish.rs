//! Repository publisher: stage one path, commit only a real change, push.
//!
//! A commit needs a [`StagedChange`], and the only way to obtain one is
//! [`Publisher::stage`] reporting that the pending-change set is non-empty.
//! Committing an empty stage is therefore unrepresentable rather than an
//! error to be ignored. Likewise [`Publisher::push`] takes the
//! [`Commit`] produced by [`Publisher::commit`].

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::contract::{BackendError, RepositoryBackend};

/// Proof that staging left a change for `path`.
#[derive(Debug)]
pub struct StagedChange {
    path: PathBuf,
}

impl StagedChange {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Proof that a local commit was recorded.
#[derive(Debug)]
pub struct Commit {
    pub message: String,
}

/// Commit message for the artifact `file_name`.
pub fn commit_message(file_name: &str, existed: bool) -> String {
    if existed {
        format!("chore: update daily contribution - {file_name}")
    } else {
        format!("chore: add daily contribution - {file_name}")
    }
}

pub struct Publisher<'a, B: RepositoryBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: RepositoryBackend + ?Sized> Publisher<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Warns when no author identity is configured, then carries on with the
    /// backend's own defaults.
    pub async fn check_identity(&self) -> bool {
        let ok = self.backend.has_identity().await;
        if !ok {
            warn!("[PUBLISH] No author identity configured; relying on the backend's default identity");
        }
        ok
    }

    /// Read-only check for an uncommitted change at `path`.
    pub async fn pending_change(&self, path: &Path) -> Result<bool, BackendError> {
        let pending = self.backend.has_pending_change(path).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "[PUBLISH][ERROR] Could not query repository status");
            e
        })?;
        if pending {
            info!(path = %path.display(), "[PUBLISH] Path has uncommitted changes");
        }
        Ok(pending)
    }

    /// Stages `path` and reports whether that produced a change to commit.
    pub async fn stage(&self, path: &Path) -> Result<Option<StagedChange>, BackendError> {
        self.backend.stage(path).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "[PUBLISH][ERROR] Staging failed");
            e
        })?;
        info!(path = %path.display(), "[PUBLISH] Staged artifact");

        let changed = self.backend.has_staged_change(path).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "[PUBLISH][ERROR] Could not inspect staged changes");
            e
        })?;
        if changed {
            Ok(Some(StagedChange {
                path: path.to_path_buf(),
            }))
        } else {
            info!(path = %path.display(), "[PUBLISH] Nothing staged; skipping commit");
            Ok(None)
        }
    }

    pub async fn commit(&self, change: StagedChange, message: &str) -> Result<Commit, BackendError> {
        match self.backend.commit(&change.path, message).await {
            Ok(()) => {
                info!(path = %change.path.display(), commit_message = %message, "[PUBLISH] Committed");
                Ok(Commit {
                    message: message.to_string(),
                })
            }
            Err(e) => {
                error!(error = %e, commit_message = %message, "[PUBLISH][ERROR] Commit failed");
                Err(e)
            }
        }
    }

    /// Pushes `commit` upstream. On failure the commit stays in local history.
    pub async fn push(&self, commit: &Commit) -> Result<(), BackendError> {
        match self.backend.push().await {
            Ok(()) => {
                info!(commit_message = %commit.message, "[PUBLISH] Pushed");
                Ok(())
            }
            Err(e) => {
                error!(
                    error = %e,
                    commit_message = %commit.message,
                    "[PUBLISH][ERROR] Push failed; local commit is not rolled back"
                );
                Err(e)
            }
        }
    }
}
