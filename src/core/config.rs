//! Deploy agent configuration from YAML

use crate::core::steps::Steps;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level keys accepted when `strict: true`
const KNOWN_KEYS: &[&str] = &[
    "repository",
    "poll_secs",
    "debug",
    "strict",
    "build_path",
    "deploy_path",
    "build",
    "test",
    "post_tasks",
    "restart",
    "commit_tag",
    "commit_tag_exclude",
    "environment",
    "notify",
];

/// Top-level deploy agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Repository being watched
    pub repository: RepositoryConfig,

    /// Seconds between polls
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    /// Run the pipeline on every tick and only log notifications
    #[serde(default)]
    pub debug: bool,

    /// Reject unknown top-level keys
    #[serde(default)]
    pub strict: bool,

    /// Working directory for build, test and post-task commands
    #[serde(default)]
    build_path: Option<PathBuf>,

    /// Directory the build output is mirrored into
    pub deploy_path: PathBuf,

    /// Build task groups (mandatory)
    pub build: Steps,

    /// Test task groups
    #[serde(default)]
    pub test: Option<Steps>,

    /// Task groups run after a successful deploy
    #[serde(default)]
    pub post_tasks: Option<Steps>,

    /// Command restarting the deployed service
    #[serde(default)]
    pub restart: Option<String>,

    /// Marker replaced by the deployed commit hash
    #[serde(default)]
    pub commit_tag: Option<String>,

    /// Directory names skipped when stamping the commit tag
    #[serde(default = "default_commit_tag_exclude")]
    pub commit_tag_exclude: Vec<String>,

    /// Environment overlay for every spawned command
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Notification settings
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// The watched git repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Path of the local working tree
    pub path: PathBuf,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,
}

/// Notification sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Incoming webhook URL; when absent notifications are only logged
    pub endpoint: Option<String>,

    pub channel: Option<String>,

    pub username: String,

    /// Title of the progress attachment
    pub title: String,

    /// Empty text disables the success notification
    pub success_text: String,

    pub failed_text: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            channel: None,
            username: "node-deploy-server".to_string(),
            title: "Deployment".to_string(),
            success_text: "Build success!".to_string(),
            failed_text: "Build failed!".to_string(),
        }
    }
}

fn default_poll_secs() -> u64 {
    60
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_commit_tag_exclude() -> Vec<String> {
    vec!["node_modules".to_string()]
}

impl DeployConfig {
    /// Minimal configuration with defaults and no task groups
    pub fn for_paths(repository: impl Into<PathBuf>, deploy_path: impl Into<PathBuf>) -> Self {
        Self {
            repository: RepositoryConfig {
                path: repository.into(),
                remote: default_remote(),
                branch: default_branch(),
            },
            poll_secs: default_poll_secs(),
            debug: false,
            strict: false,
            build_path: None,
            deploy_path: deploy_path.into(),
            build: Steps::new(),
            test: None,
            post_tasks: None,
            restart: None,
            commit_tag: None,
            commit_tag_exclude: default_commit_tag_exclude(),
            environment: HashMap::new(),
            notify: NotifyConfig::default(),
        }
    }

    pub fn with_build(mut self, build: Steps) -> Self {
        self.build = build;
        self
    }

    pub fn with_build_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_path = Some(path.into());
        self
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(yaml)?;
        let config: DeployConfig = serde_yaml::from_value(raw.clone())?;
        if config.strict {
            Self::check_known_keys(&raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn check_known_keys(raw: &Value) -> Result<()> {
        let Some(mapping) = raw.as_mapping() else {
            return Ok(());
        };
        for key in mapping.keys() {
            let name = key.as_str().unwrap_or_default();
            if !KNOWN_KEYS.contains(&name) {
                anyhow::bail!("Unknown configuration key '{}' (strict mode)", name);
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.repository.path.as_os_str().is_empty() {
            anyhow::bail!("repository.path must not be empty");
        }
        if self.repository.branch.trim().is_empty() {
            anyhow::bail!("repository.branch must not be empty");
        }
        if self.repository.remote.trim().is_empty() {
            anyhow::bail!("repository.remote must not be empty");
        }
        if self.deploy_path.as_os_str().is_empty() {
            anyhow::bail!("deploy_path must not be empty");
        }
        if self.poll_secs == 0 {
            anyhow::bail!("poll_secs must be greater than zero");
        }

        if self.build.is_empty() {
            anyhow::bail!("build must define at least one task group");
        }
        Self::validate_steps("build", &self.build)?;
        if let Some(test) = &self.test {
            Self::validate_steps("test", test)?;
        }
        if let Some(post_tasks) = &self.post_tasks {
            Self::validate_steps("post_tasks", post_tasks)?;
        }

        if matches!(&self.restart, Some(cmd) if cmd.trim().is_empty()) {
            anyhow::bail!("restart must not be an empty command");
        }
        if matches!(&self.commit_tag, Some(tag) if tag.is_empty()) {
            anyhow::bail!("commit_tag must not be empty");
        }

        Ok(())
    }

    fn validate_steps(section: &str, steps: &Steps) -> Result<()> {
        for group in steps {
            if group.name.trim().is_empty() {
                anyhow::bail!("{} contains a task group with an empty name", section);
            }
            if group.commands.is_empty() {
                anyhow::bail!("{} task group '{}' has no commands", section, group.name);
            }
            if group.commands.iter().any(|c| c.trim().is_empty()) {
                anyhow::bail!("{} task group '{}' contains an empty command", section, group.name);
            }
        }
        Ok(())
    }

    /// Working directory for build, test and post-task commands
    pub fn build_path(&self) -> &Path {
        self.build_path.as_deref().unwrap_or(&self.repository.path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
}
