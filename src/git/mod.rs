//! Git repository access
//!
//! `RepositoryClient` is the capability the scheduler needs to keep the
//! working tree in sync with the remote; `GitCli` implements it on top of
//! the `git` binary.

pub mod cli;

use crate::core::{Branch, GitOperationError, RepoStatus};
use async_trait::async_trait;

pub use cli::GitCli;

pub type Result<T> = std::result::Result<T, GitOperationError>;

/// Git operations used to synchronise the working tree
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Currently checked-out branch
    async fn current_branch(&self) -> Result<Branch>;

    async fn checkout(&self, branch: &str) -> Result<()>;

    /// Fetch from the configured remote
    async fn fetch(&self) -> Result<()>;

    /// Divergence from the remote tracking branch
    async fn status(&self) -> Result<RepoStatus>;

    /// `reset --hard`
    async fn reset_hard(&self) -> Result<()>;

    /// Remove untracked files
    async fn clean_untracked(&self) -> Result<()>;

    /// Pull the configured branch from the configured remote
    async fn pull(&self) -> Result<()>;
}
