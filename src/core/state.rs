//! Execution state models

use crate::core::error::DeployError;
use crate::notify::NotificationHandle;

/// Outcome of a single task group
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Every command in the group succeeded
    pub done: bool,

    /// First failing command's error, if any
    pub error: Option<DeployError>,
}

impl TaskOutcome {
    pub fn completed() -> Self {
        Self {
            done: true,
            error: None,
        }
    }

    pub fn failed(error: DeployError) -> Self {
        Self {
            done: false,
            error: Some(error),
        }
    }

    /// Group was planned but never started
    pub fn not_run() -> Self {
        Self {
            done: false,
            error: None,
        }
    }
}

/// Per-invocation progress of a `TaskGroupExecutor`, in group order
///
/// Groups that never started are recorded with [`TaskOutcome::not_run`].
#[derive(Debug, Clone, Default)]
pub struct TaskProgress {
    entries: Vec<(String, TaskOutcome)>,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the outcome of a group
    pub fn record(&mut self, group: &str, outcome: TaskOutcome) {
        match self.entries.iter_mut().find(|(name, _)| name == group) {
            Some((_, existing)) => *existing = outcome,
            None => self.entries.push((group.to_string(), outcome)),
        }
    }

    pub fn get(&self, group: &str) -> Option<&TaskOutcome> {
        self.entries
            .iter()
            .find(|(name, _)| name == group)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskOutcome)> {
        self.entries.iter().map(|(name, outcome)| (name.as_str(), outcome))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of the first group carrying an error
    pub fn first_failure(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, outcome)| outcome.error.is_some())
            .map(|(name, _)| name.as_str())
    }
}

/// Terminal value of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Build through Restart all succeeded
    pub success: bool,

    /// Delivery receipt of the main run notification
    pub notification: Option<NotificationHandle>,

    /// `Some(false)` when post tasks ran and failed
    pub post_tasks_succeeded: Option<bool>,
}

impl PipelineResult {
    pub fn succeeded(notification: Option<NotificationHandle>) -> Self {
        Self {
            success: true,
            notification,
            post_tasks_succeeded: None,
        }
    }

    pub fn failed(notification: Option<NotificationHandle>) -> Self {
        Self {
            success: false,
            notification,
            post_tasks_succeeded: None,
        }
    }
}
