//! Error taxonomy for the deploy orchestration core

use crate::core::state::TaskProgress;
use thiserror::Error;

/// A shell command that could not be run or exited unsuccessfully
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} `{command}`{}", exit_suffix(.exit_code))]
pub struct CommandError {
    /// The command string as handed to the shell
    pub command: String,

    /// Exit code, `None` when the process never started or died from a signal
    pub exit_code: Option<i32>,

    /// Human readable failure description
    pub message: String,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exited with error code {})", code),
        None => String::new(),
    }
}

impl CommandError {
    /// Command exited with a non-zero status
    pub fn exited(command: impl Into<String>, code: i32, stdout: String, stderr: String) -> Self {
        Self {
            command: command.into(),
            exit_code: Some(code),
            message: "Command failed:".to_string(),
            stdout,
            stderr,
        }
    }

    /// Command could not be run to completion (spawn failure, signal)
    pub fn aborted(
        command: impl Into<String>,
        message: impl Into<String>,
        stdout: String,
        stderr: String,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code: None,
            message: message.into(),
            stdout,
            stderr,
        }
    }
}

/// One or more task groups failed; carries the outcome of every group that ran
#[derive(Debug, Clone, Error)]
#[error("task group `{}` failed", .progress.first_failure().unwrap_or("<unknown>"))]
pub struct AggregateTaskError {
    pub progress: TaskProgress,
}

/// A git operation failed during repository synchronisation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("git {operation} failed: {cause}")]
pub struct GitOperationError {
    pub operation: String,
    pub cause: String,
}

impl GitOperationError {
    pub fn new(operation: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            cause: cause.into(),
        }
    }
}

/// The poll scheduler ran out of consecutive retries
#[derive(Debug, Clone, Error)]
#[error("poll scheduler stopped after {attempts} consecutive failed attempts, last error: {last_error}")]
pub struct SchedulerExhaustedError {
    pub attempts: u32,
    pub last_error: GitOperationError,
}

/// Terminal failure of a pipeline stage
#[derive(Debug, Clone, Error)]
pub enum DeployError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Tasks(#[from] AggregateTaskError),

    #[error(transparent)]
    Git(#[from] GitOperationError),

    #[error("failed to stamp commit into {path}: {message}")]
    Stamp { path: String, message: String },

    #[error("{0}")]
    Unexpected(String),
}
