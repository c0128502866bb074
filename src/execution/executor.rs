//! Task group executor - runs groups in order, commands within a group concurrently

use crate::{
    core::{AggregateTaskError, CommandError, DeployError, Steps, TaskGroup, TaskOutcome, TaskProgress},
    execution::{CommandOutput, CommandRunner},
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Executes `Steps`: one group at a time, all commands of a group at once
pub struct TaskGroupExecutor {
    runner: Arc<dyn CommandRunner>,
    env: Arc<HashMap<String, String>>,
}

impl TaskGroupExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, env: HashMap<String, String>) -> Self {
        Self {
            runner,
            env: Arc::new(env),
        }
    }

    /// Run every group in order, stopping at the first group with a failure
    ///
    /// On success the outputs of all commands are returned in group order.
    /// On failure the error carries the outcome of every group; groups after
    /// the failing one are recorded as not run.
    pub async fn execute(
        &self,
        steps: &Steps,
        cwd: &Path,
    ) -> Result<Vec<CommandOutput>, AggregateTaskError> {
        let mut progress = TaskProgress::new();
        let mut results = Vec::with_capacity(steps.command_count());

        for (index, group) in steps.iter().enumerate() {
            match self.run_group(group, cwd).await {
                Ok(outputs) => {
                    info!("[deploy] {} - Completed", group.name);
                    progress.record(&group.name, TaskOutcome::completed());
                    results.extend(outputs);
                }
                Err(e) => {
                    error!("[deploy] {} - failed: {}", group.name, e);
                    progress.record(&group.name, TaskOutcome::failed(e));
                    for skipped in steps.iter().skip(index + 1) {
                        progress.record(&skipped.name, TaskOutcome::not_run());
                    }
                    return Err(AggregateTaskError { progress });
                }
            }
        }

        Ok(results)
    }

    /// Spawn every command of the group, then join them all in command order
    async fn run_group(&self, group: &TaskGroup, cwd: &Path) -> Result<Vec<CommandOutput>, DeployError> {
        let handles: Vec<JoinHandle<Result<CommandOutput, CommandError>>> = group
            .commands
            .iter()
            .map(|command| {
                let runner = Arc::clone(&self.runner);
                let env = Arc::clone(&self.env);
                let command = command.clone();
                let cwd = cwd.to_path_buf();
                tokio::spawn(async move { runner.run(&command, Some(&cwd), &env).await })
            })
            .collect();

        // Barrier: the group resolves only after every command has finished.
        let mut outputs = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(output)) => outputs.push(output),
                Ok(Err(e)) => {
                    first_error.get_or_insert(DeployError::Command(e));
                }
                Err(join_error) => {
                    first_error.get_or_insert(DeployError::Unexpected(format!(
                        "command task in group '{}' did not complete: {}",
                        group.name, join_error
                    )));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }
}
