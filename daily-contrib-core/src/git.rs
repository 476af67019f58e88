use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::contract::{BackendError, BackendOp, RepositoryBackend};

/// Repository configuration - which work tree to publish from and where to push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_work_tree")]
    pub work_tree: PathBuf,
    /// Remote to push to. `None` pushes to the branch's configured upstream.
    #[serde(default)]
    pub remote: Option<String>,
    /// Remote branch to push `HEAD` to. Only used together with `remote`.
    #[serde(default)]
    pub branch: Option<String>,
}

fn default_work_tree() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            work_tree: default_work_tree(),
            remote: None,
            branch: None,
        }
    }
}

impl RepositoryConfig {
    /// Arguments after `git push`.
    pub fn push_args(&self) -> Vec<String> {
        match (&self.remote, &self.branch) {
            (Some(remote), Some(branch)) => vec![remote.clone(), format!("HEAD:{branch}")],
            (Some(remote), None) => vec![remote.clone(), "HEAD".to_string()],
            (None, _) => Vec::new(),
        }
    }
}

/// [`RepositoryBackend`] over the `git` binary, run with `-C <work_tree>`.
pub struct GitBackend {
    config: RepositoryConfig,
}

impl GitBackend {
    pub fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.config.work_tree);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Runs git and returns its output, whatever the exit status.
    async fn output(&self, op: BackendOp, args: &[&OsStr]) -> Result<Output, BackendError> {
        let output = self.command().args(args).output().await;
        match output {
            Ok(out) => Ok(out),
            Err(e) => {
                tracing::error!(
                    error = ?e,
                    op = op.as_str(),
                    work_tree = %self.config.work_tree.display(),
                    "Failed to launch git process"
                );
                Err(BackendError::new(op, format!("failed to launch git: {e}")))
            }
        }
    }

    /// Runs git and requires a zero exit status.
    async fn run(&self, op: BackendOp, args: &[&OsStr]) -> Result<Output, BackendError> {
        let out = self.output(op, args).await?;
        if out.status.success() {
            tracing::debug!(op = op.as_str(), status = ?out.status, "git succeeded");
            Ok(out)
        } else {
            let detail = diagnostic(&out);
            tracing::error!(
                op = op.as_str(),
                work_tree = %self.config.work_tree.display(),
                "Git exited with non-zero code: {}", out.status
            );
            Err(BackendError::new(op, detail))
        }
    }

    async fn config_value(&self, key: &str) -> Option<String> {
        let out = self
            .command()
            .args(["config", "--get", key])
            .output()
            .await
            .ok()?;
        let value = String::from_utf8_lossy(&out.stdout).trim().to_string();
        (out.status.success() && !value.is_empty()).then_some(value)
    }
}

#[async_trait]
impl RepositoryBackend for GitBackend {
    async fn has_identity(&self) -> bool {
        let name = self.config_value("user.name").await;
        let email = self.config_value("user.email").await;
        tracing::debug!(has_name = name.is_some(), has_email = email.is_some(), "Checked git identity");
        name.is_some() && email.is_some()
    }

    async fn has_pending_change(&self, path: &Path) -> Result<bool, BackendError> {
        let path = absolute(path).map_err(|e| BackendError::new(BackendOp::Status, e.to_string()))?;
        let out = self
            .run(
                BackendOp::Status,
                &[
                    OsStr::new("status"),
                    OsStr::new("--porcelain"),
                    OsStr::new("--untracked-files=all"),
                    OsStr::new("--"),
                    path.as_os_str(),
                ],
            )
            .await?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    async fn stage(&self, path: &Path) -> Result<(), BackendError> {
        let path = absolute(path).map_err(|e| BackendError::new(BackendOp::Stage, e.to_string()))?;
        self.run(BackendOp::Stage, &[OsStr::new("add"), OsStr::new("--"), path.as_os_str()])
            .await
            .map(|_| ())
    }

    async fn has_staged_change(&self, path: &Path) -> Result<bool, BackendError> {
        let path = absolute(path).map_err(|e| BackendError::new(BackendOp::Diff, e.to_string()))?;
        let out = self
            .output(
                BackendOp::Diff,
                &[
                    OsStr::new("diff"),
                    OsStr::new("--staged"),
                    OsStr::new("--quiet"),
                    OsStr::new("--"),
                    path.as_os_str(),
                ],
            )
            .await?;
        // `--quiet` exits 1 when there are differences and 0 when there are none.
        match out.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(BackendError::new(BackendOp::Diff, diagnostic(&out))),
        }
    }

    async fn commit(&self, path: &Path, message: &str) -> Result<(), BackendError> {
        let path = absolute(path).map_err(|e| BackendError::new(BackendOp::Commit, e.to_string()))?;
        // The pathspec limits the commit to this file even if other paths are staged.
        self.run(
            BackendOp::Commit,
            &[
                OsStr::new("commit"),
                OsStr::new("-m"),
                OsStr::new(message),
                OsStr::new("--"),
                path.as_os_str(),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn push(&self) -> Result<(), BackendError> {
        let extra = self.config.push_args();
        let mut args = vec![OsStr::new("push")];
        args.extend(extra.iter().map(OsStr::new));
        self.run(BackendOp::Push, &args).await.map(|_| ())
    }
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn diagnostic(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("git exited with {}", out.status)
}
