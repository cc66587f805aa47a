//! Version-control collaborator. A failed commit never undoes an install.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Non-fatal commit failure, reported alongside a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CommitWarning(pub String);

#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), CommitWarning>;
}

pub fn commit_message(name: &str, description: &str) -> String {
    format!("Add command: {name}\n\nDescription: {description}")
}

/// Commits through the `git` executable in a fixed repository directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn git(&self, args: &[&str], paths: &[PathBuf]) -> Result<(), CommitWarning> {
        let output = Command::new("git")
            .current_dir(&self.repo_dir)
            .args(args)
            .arg("--")
            .args(paths)
            .output()
            .await
            .map_err(|error| CommitWarning(format!("failed to run git: {error}")))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CommitWarning(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )))
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), CommitWarning> {
        if paths.is_empty() {
            return Err(CommitWarning("nothing to commit".to_string()));
        }
        self.git(&["add"], paths).await?;
        self.git(&["commit", "-m", message], paths).await?;
        tracing::info!("committed {} files in {}", paths.len(), self.repo_dir.display());
        Ok(())
    }
}
