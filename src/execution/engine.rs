//! Pipeline runner - drives one deploy run through its stages

use crate::{
    core::{
        config::DeployConfig, Branch, DeployError, DeployStage, PipelineResult, RunContext,
    },
    execution::{shell_quote, CommandRunner, CommitStamper, TaskGroupExecutor},
    notify::{NotificationHandle, NotificationPayload, Notifier, ProgressFormatter},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

const SUCCESS_ICON: &str = ":simple_smile:";
const FAILURE_ICON: &str = ":monkey_face:";
const POST_TASKS_PREFIX: &str = "[Post tasks] ";

/// Events that can occur during a deploy run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        branch: Branch,
        stages: Vec<DeployStage>,
    },
    StageStarted {
        stage: DeployStage,
    },
    StageCompleted {
        stage: DeployStage,
    },
    StageFailed {
        stage: DeployStage,
        error: String,
    },
    PostTasksFailed {
        error: String,
    },
    RunCompleted {
        run_id: Uuid,
        success: bool,
        elapsed_secs: i64,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// A fatal stage error, tagged with the stage it happened in
#[derive(Debug)]
struct StageFailure {
    stage: DeployStage,
    error: DeployError,
}

/// Runs the fixed stage sequence for one commit and reports the outcome
pub struct PipelineRunner {
    config: Arc<DeployConfig>,
    commands: Arc<dyn CommandRunner>,
    executor: TaskGroupExecutor,
    env: HashMap<String, String>,
    notifier: Arc<dyn Notifier>,
    formatter: ProgressFormatter,
    event_handlers: Vec<EventHandler>,
}

impl PipelineRunner {
    pub fn new(
        config: Arc<DeployConfig>,
        commands: Arc<dyn CommandRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let env = config.environment.clone();
        let executor = TaskGroupExecutor::new(Arc::clone(&commands), env.clone());
        let formatter = ProgressFormatter::new(config.notify.title.clone());

        Self {
            config,
            commands,
            executor,
            env,
            notifier,
            formatter,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute one full deploy run for `branch`
    pub async fn run(&self, branch: &Branch) -> PipelineResult {
        let mut ctx = RunContext::new(DeployStage::planned(&self.config));

        info!(
            "[deploy] {} - Start processing {} ({})",
            ctx.started_at.to_rfc3339(),
            branch,
            ctx.run_id
        );
        self.emit_event(ExecutionEvent::RunStarted {
            run_id: ctx.run_id,
            branch: branch.clone(),
            stages: ctx.stages().to_vec(),
        });

        let mut result = match self.run_stages(&mut ctx, branch).await {
            Ok(()) => {
                info!(
                    "[deploy] {} - DEPLOYMENT SUCCESS!, commit: {}, {}",
                    chrono::Utc::now().to_rfc3339(),
                    branch.label,
                    branch.commit
                );
                self.report_success(&ctx, branch).await
            }
            Err(failure) => {
                error!(
                    "[deploy] {} - DEPLOYMENT FAILED in {}, commit: {}: {}",
                    chrono::Utc::now().to_rfc3339(),
                    failure.stage,
                    branch.commit,
                    failure.error
                );
                let notification = self.report_failure(&ctx, branch, &failure.error, "").await;
                PipelineResult::failed(notification)
            }
        };

        if result.success && ctx.includes(DeployStage::PostTasks) {
            result.post_tasks_succeeded = Some(self.run_post_tasks(&mut ctx, branch).await);
        }

        self.emit_event(ExecutionEvent::RunCompleted {
            run_id: ctx.run_id,
            success: result.success,
            elapsed_secs: ctx.elapsed_secs(),
        });

        result
    }

    /// Walk the planned stages up to Restart, stopping at the first failure
    async fn run_stages(&self, ctx: &mut RunContext, branch: &Branch) -> Result<(), StageFailure> {
        let stages: Vec<DeployStage> = ctx.main_stages().collect();

        for stage in stages {
            ctx.enter(stage);
            info!("[deploy] {} started", stage);
            self.emit_event(ExecutionEvent::StageStarted { stage });

            if let Err(error) = self.run_stage(stage, branch).await {
                self.emit_event(ExecutionEvent::StageFailed {
                    stage,
                    error: error.to_string(),
                });
                return Err(StageFailure { stage, error });
            }

            info!("[deploy] {} done", stage);
            self.emit_event(ExecutionEvent::StageCompleted { stage });
        }

        Ok(())
    }

    async fn run_stage(&self, stage: DeployStage, branch: &Branch) -> Result<(), DeployError> {
        let config = &self.config;

        match stage {
            DeployStage::Build => {
                let results = self.executor.execute(&config.build, config.build_path()).await?;
                debug!("[deploy] BuildResult: {:?}", results);
            }
            DeployStage::Test => {
                if let Some(test) = &config.test {
                    let results = self.executor.execute(test, config.build_path()).await?;
                    debug!("[deploy] TestResult: {:?}", results);
                }
            }
            DeployStage::Deploy => {
                let command = self.mirror_command();
                let result = self
                    .commands
                    .run(&command, Some(config.repository.path.as_path()), &self.env)
                    .await?;
                debug!("[deploy] DeployResult: {:?}", result);
            }
            DeployStage::PostDeploy => {
                if let Some(tag) = &config.commit_tag {
                    let stamper = CommitStamper::new(tag.clone(), config.commit_tag_exclude.clone());
                    let root = config.deploy_path.clone();
                    let commit = branch.commit.clone();
                    let stamped = tokio::task::spawn_blocking(move || stamper.stamp(&root, &commit))
                        .await
                        .map_err(|e| DeployError::Unexpected(format!("commit stamping did not complete: {}", e)))??;
                    debug!("[deploy] PostDeployResult: {} file(s) stamped", stamped.len());
                }
            }
            DeployStage::Restart => {
                if let Some(restart) = &config.restart {
                    let result = self
                        .commands
                        .run(restart, Some(config.repository.path.as_path()), &self.env)
                        .await?;
                    debug!("[deploy] RestartResult: {:?}", result);
                }
            }
            // Runs after the main result is reported, see `run_post_tasks`.
            DeployStage::PostTasks => {}
        }

        Ok(())
    }

    /// Mirror the build output into the deploy directory
    pub fn mirror_command(&self) -> String {
        let source = format!("{}/", self.config.build_path().display());
        format!(
            "rsync -rtl --delete {} {}",
            shell_quote(&source),
            shell_quote(&self.config.deploy_path.display().to_string())
        )
    }

    async fn run_post_tasks(&self, ctx: &mut RunContext, branch: &Branch) -> bool {
        let Some(post_tasks) = &self.config.post_tasks else {
            return true;
        };

        ctx.enter(DeployStage::PostTasks);
        info!("[deploy] Post Tasks started");
        self.emit_event(ExecutionEvent::StageStarted {
            stage: DeployStage::PostTasks,
        });

        match self.executor.execute(post_tasks, self.config.build_path()).await {
            Ok(_) => {
                info!("[deploy] Post Tasks done");
                self.emit_event(ExecutionEvent::StageCompleted {
                    stage: DeployStage::PostTasks,
                });
                true
            }
            Err(e) => {
                let error = DeployError::from(e);
                error!(
                    "[deploy] {} - POST TASKS FAILED, commit: {}: {}",
                    chrono::Utc::now().to_rfc3339(),
                    branch.commit,
                    error
                );
                self.emit_event(ExecutionEvent::PostTasksFailed {
                    error: error.to_string(),
                });
                self.report_failure(ctx, branch, &error, POST_TASKS_PREFIX).await;
                false
            }
        }
    }

    async fn report_success(&self, ctx: &RunContext, branch: &Branch) -> PipelineResult {
        let notify = &self.config.notify;
        let text = format!("{}\ncommit:{}, {}", notify.success_text, branch.label, branch.commit);
        let stages: Vec<DeployStage> = ctx.main_stages().collect();

        let payload = self
            .formatter
            .format(&text, &stages, ctx.current_stage(), None)
            .with_metadata(notify.channel.clone(), notify.username.clone(), SUCCESS_ICON);

        let notification = if notify.success_text.is_empty() {
            self.log_payload(&payload);
            None
        } else {
            self.dispatch(&payload).await
        };

        PipelineResult::succeeded(notification)
    }

    async fn report_failure(
        &self,
        ctx: &RunContext,
        branch: &Branch,
        error: &DeployError,
        prefix: &str,
    ) -> Option<NotificationHandle> {
        let notify = &self.config.notify;
        let text = format!(
            "{}{}\ncommit:{}, {}",
            prefix, notify.failed_text, branch.label, branch.commit
        );

        let payload = self
            .formatter
            .format(&text, ctx.stages(), ctx.current_stage(), Some(error))
            .with_metadata(notify.channel.clone(), notify.username.clone(), FAILURE_ICON);

        self.dispatch(&payload).await
    }

    /// Send through the notifier, or only log it in debug mode
    async fn dispatch(&self, payload: &NotificationPayload) -> Option<NotificationHandle> {
        if self.config.debug {
            self.log_payload(payload);
            return None;
        }

        match self.notifier.send(payload).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("[deploy] Failed to deliver notification: {}", e);
                None
            }
        }
    }

    fn log_payload(&self, payload: &NotificationPayload) {
        match serde_json::to_string_pretty(payload) {
            Ok(json) => info!("[deploy] Notification message: {}", json),
            Err(e) => error!("[deploy] Failed to encode notification: {}", e),
        }
    }
}
