//! Deploy stages

use crate::core::config::DeployConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed, ordered stages of a deploy run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeployStage {
    Build,
    Test,
    Deploy,
    PostDeploy,
    Restart,
    PostTasks,
}

impl DeployStage {
    pub const ALL: [DeployStage; 6] = [
        DeployStage::Build,
        DeployStage::Test,
        DeployStage::Deploy,
        DeployStage::PostDeploy,
        DeployStage::Restart,
        DeployStage::PostTasks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeployStage::Build => "Build",
            DeployStage::Test => "Test",
            DeployStage::Deploy => "Deploy",
            DeployStage::PostDeploy => "PostDeploy",
            DeployStage::Restart => "Restart",
            DeployStage::PostTasks => "PostTasks",
        }
    }

    /// Whether the configuration includes this stage
    pub fn is_configured(self, config: &DeployConfig) -> bool {
        match self {
            DeployStage::Build | DeployStage::Deploy => true,
            DeployStage::Test => config.test.is_some(),
            DeployStage::PostDeploy => config.commit_tag.is_some(),
            DeployStage::Restart => config.restart.is_some(),
            DeployStage::PostTasks => config.post_tasks.is_some(),
        }
    }

    /// Stages a run will go through, in order
    pub fn planned(config: &DeployConfig) -> Vec<DeployStage> {
        Self::ALL
            .into_iter()
            .filter(|stage| stage.is_configured(config))
            .collect()
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
