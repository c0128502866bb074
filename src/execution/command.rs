//! Shell command execution

use crate::core::CommandError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

/// Capability to execute one shell command string
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` in `cwd` with `env` layered over the inherited environment
    async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    /// Shell executable
    shell: String,
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different shell (must accept `-c <command>`)
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, CommandError> {
        debug!("Spawning `{}` in {:?}", command, cwd);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command).envs(env).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| {
            error!("✗ \"{}\": {}", command, e);
            CommandError::aborted(
                command,
                format!("Failed to spawn {}: {}", self.shell, e),
                String::new(),
                String::new(),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!("✗ \"{}\" ({})", command, output.status);
            return Err(match output.status.code() {
                Some(code) => CommandError::exited(command, code, stdout, stderr),
                None => CommandError::aborted(
                    command,
                    format!("Command terminated by signal ({})", output.status),
                    stdout,
                    stderr,
                ),
            });
        }

        info!("✓ \"{}\"", command);
        Ok(CommandOutput {
            command: command.to_string(),
            stdout,
            stderr,
        })
    }
}

/// Quote a value for safe interpolation into a `sh -c` command line
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
