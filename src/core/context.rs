//! Per-run context threaded through the pipeline stages

use crate::core::stage::DeployStage;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// State owned by a single pipeline run
///
/// A fresh context is created for every run, so nothing leaks between runs.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unique run ID
    pub run_id: Uuid,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Stages included in this run, in order
    stages: Vec<DeployStage>,

    /// Stage currently executing (or the last one that executed)
    current: DeployStage,
}

impl RunContext {
    pub fn new(stages: Vec<DeployStage>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            stages,
            current: DeployStage::Build,
        }
    }

    pub fn stages(&self) -> &[DeployStage] {
        &self.stages
    }

    pub fn current_stage(&self) -> DeployStage {
        self.current
    }

    /// Move to `stage`; stages only ever move forward
    pub fn enter(&mut self, stage: DeployStage) {
        debug_assert!(stage >= self.current, "stage moved backwards: {} -> {}", self.current, stage);
        debug_assert!(self.stages.contains(&stage), "stage {} was not planned", stage);
        self.current = stage;
    }

    /// Planned stages that run before post tasks
    pub fn main_stages(&self) -> impl Iterator<Item = DeployStage> + '_ {
        self.stages
            .iter()
            .copied()
            .filter(|stage| *stage != DeployStage::PostTasks)
    }

    pub fn includes(&self, stage: DeployStage) -> bool {
        self.stages.contains(&stage)
    }

    /// Seconds elapsed since the run started
    pub fn elapsed_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}
