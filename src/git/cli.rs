//! `RepositoryClient` backed by the git command line

use crate::core::{Branch, GitOperationError, RepoStatus};
use crate::git::{RepositoryClient, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::debug;

fn ahead_behind_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^# branch\.ab \+(\d+) -(\d+)$").expect("ahead/behind pattern is valid")
    })
}

/// Parse `git status --porcelain=v2 --branch` output; `None` without an upstream
pub fn parse_ahead_behind(porcelain: &str) -> Option<RepoStatus> {
    let caps = ahead_behind_re().captures(porcelain)?;
    Some(RepoStatus {
        ahead: caps[1].parse().ok()?,
        behind: caps[2].parse().ok()?,
    })
}

/// Git client operating on one working tree against one remote/branch
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
    remote: String,
    branch: String,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Run `git <args>` in the working tree, returning trimmed stdout
    async fn git(&self, operation: &str, args: &[&str]) -> Result<String> {
        debug!("git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GitOperationError::new(operation, format!("failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitOperationError::new(
                operation,
                format!("git {} ({}): {}", args.join(" "), output.status, stderr.trim()),
            ));
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|_| GitOperationError::new(operation, "invalid utf-8 in git output"))
    }
}

#[async_trait]
impl RepositoryClient for GitCli {
    async fn current_branch(&self) -> Result<Branch> {
        let name = self.git("branch", &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let commit = self.git("branch", &["rev-parse", "HEAD"]).await?;
        let label = self.git("branch", &["log", "-1", "--format=%s"]).await?;
        Ok(Branch {
            is_current: true,
            name,
            commit,
            label,
        })
    }

    async fn checkout(&self, branch: &str) -> Result<()> {
        self.git("checkout", &["checkout", branch]).await.map(drop)
    }

    async fn fetch(&self) -> Result<()> {
        self.git("fetch", &["fetch", &self.remote]).await.map(drop)
    }

    async fn status(&self) -> Result<RepoStatus> {
        let porcelain = self
            .git("status", &["status", "--porcelain=v2", "--branch"])
            .await?;
        if let Some(status) = parse_ahead_behind(&porcelain) {
            return Ok(status);
        }

        // No upstream configured: compare against <remote>/<branch> directly.
        let range = format!("HEAD..{}/{}", self.remote, self.branch);
        let count = self.git("status", &["rev-list", "--count", &range]).await?;
        let behind = count
            .parse()
            .map_err(|_| GitOperationError::new("status", format!("unexpected rev-list output '{}'", count)))?;
        Ok(RepoStatus { ahead: 0, behind })
    }

    async fn reset_hard(&self) -> Result<()> {
        self.git("reset", &["reset", "--hard"]).await.map(drop)
    }

    async fn clean_untracked(&self) -> Result<()> {
        self.git("clean", &["clean", "-f"]).await.map(drop)
    }

    async fn pull(&self) -> Result<()> {
        self.git("pull", &["pull", &self.remote, &self.branch]).await.map(drop)
    }
}
