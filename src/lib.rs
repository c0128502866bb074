//! autodeploy - a continuous deployment agent for a single git repository

pub mod cli;
pub mod core;
pub mod execution;
pub mod git;
pub mod notify;

// Re-export commonly used types
pub use core::config::DeployConfig;
pub use core::{Branch, DeployError, DeployStage, PipelineResult, Steps};
pub use execution::{
    CommandRunner, ExecutionEvent, PipelineRunner, PollScheduler, ShellCommandRunner, TickOutcome,
};
pub use git::{GitCli, RepositoryClient};
pub use notify::{LogNotifier, Notifier, ProgressFormatter, SlackNotifier};
