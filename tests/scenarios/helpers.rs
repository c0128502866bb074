//! Test doubles for the deploy agent's external capabilities

use async_trait::async_trait;
use autodeploy::core::config::DeployConfig;
use autodeploy::core::{Branch, CommandError, GitOperationError, RepoStatus};
use autodeploy::execution::{CommandOutput, CommandRunner, PipelineRunner, PollScheduler};
use autodeploy::git::RepositoryClient;
use autodeploy::notify::{NotificationHandle, NotificationPayload, Notifier, NotifyError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// In-memory repository with scripted failures
pub struct MockRepository {
    branch: Mutex<Branch>,
    target: String,
    behind: AtomicU32,
    failures: Mutex<HashMap<&'static str, u32>>,
    calls: Mutex<Vec<String>>,
}

impl MockRepository {
    pub fn new(behind: u32) -> Self {
        Self {
            branch: Mutex::new(Branch {
                name: "master".to_string(),
                commit: "4e1d2b7c9a0f".to_string(),
                label: "Fix header layout".to_string(),
                is_current: true,
            }),
            target: "master".to_string(),
            behind: AtomicU32::new(behind),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Start out on a different local branch
    pub fn on_branch(self, name: &str) -> Self {
        self.branch.lock().unwrap().name = name.to_string();
        self
    }

    /// Fail `operation` the next `times` calls
    pub fn failing(self, operation: &'static str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(operation, times);
        self
    }

    pub fn set_behind(&self, behind: u32) {
        self.behind.store(behind, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<(), GitOperationError> {
        self.calls.lock().unwrap().push(operation.to_string());
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(GitOperationError::new(operation, "scripted failure"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RepositoryClient for MockRepository {
    async fn current_branch(&self) -> Result<Branch, GitOperationError> {
        self.enter("current_branch")?;
        Ok(self.branch.lock().unwrap().clone())
    }

    async fn checkout(&self, branch: &str) -> Result<(), GitOperationError> {
        self.enter("checkout")?;
        self.branch.lock().unwrap().name = branch.to_string();
        Ok(())
    }

    async fn fetch(&self) -> Result<(), GitOperationError> {
        self.enter("fetch")
    }

    async fn status(&self) -> Result<RepoStatus, GitOperationError> {
        self.enter("status")?;
        Ok(RepoStatus {
            ahead: 0,
            behind: self.behind.load(Ordering::SeqCst),
        })
    }

    async fn reset_hard(&self) -> Result<(), GitOperationError> {
        self.enter("reset_hard")
    }

    async fn clean_untracked(&self) -> Result<(), GitOperationError> {
        self.enter("clean_untracked")
    }

    async fn pull(&self) -> Result<(), GitOperationError> {
        self.enter("pull")?;
        self.behind.store(0, Ordering::SeqCst);
        let mut branch = self.branch.lock().unwrap();
        branch.name = self.target.clone();
        branch.commit = "9b8c7d6e5f4a".to_string();
        branch.label = "Add pricing page".to_string();
        Ok(())
    }
}

/// Command runner that records calls and answers from a script
#[derive(Default)]
pub struct MockCommandRunner {
    calls: Mutex<Vec<(String, Option<String>)>>,
    failures: Mutex<HashMap<String, CommandError>>,
    delays: Mutex<HashMap<String, Duration>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit `command` with `code` and the given stderr
    pub fn fail(self, command: &str, code: i32, stderr: &str) -> Self {
        self.failures.lock().unwrap().insert(
            command.to_string(),
            CommandError::exited(command, code, String::new(), stderr.to_string()),
        );
        self
    }

    pub fn delay(self, command: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(command.to_string(), delay);
        self
    }

    /// Block `command` until the returned handle is notified
    pub fn gate(&self, command: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(command.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Working directory a command was started in
    pub fn cwd_of(&self, command: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| c == command)
            .and_then(|(_, cwd)| cwd.clone())
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        _env: &HashMap<String, String>,
    ) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push((
            command.to_string(),
            cwd.map(|p| p.display().to_string()),
        ));

        let delay = self.delays.lock().unwrap().get(command).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let gate = self.gates.lock().unwrap().get(command).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(error) = self.failures.lock().unwrap().get(command) {
            return Err(error.clone());
        }

        Ok(CommandOutput {
            command: command.to_string(),
            stdout: format!("ran {}", command),
            stderr: String::new(),
        })
    }
}

/// Notifier that keeps every payload it is given
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationPayload>>,
    reject: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record, then answer every send with an HTTP 500
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<NotificationHandle, NotifyError> {
        self.sent.lock().unwrap().push(payload.clone());
        if self.reject {
            return Err(NotifyError::Rejected {
                status: 500,
                body: "internal_error".to_string(),
            });
        }
        Ok(NotificationHandle {
            status: 200,
            body: "ok".to_string(),
        })
    }
}

/// Everything a scenario needs to drive and inspect one agent
pub struct Harness {
    pub repo: Arc<MockRepository>,
    pub commands: Arc<MockCommandRunner>,
    pub notifier: Arc<RecordingNotifier>,
    pub scheduler: PollScheduler,
}

impl Harness {
    pub fn new(
        yaml: &str,
        repo: MockRepository,
        commands: MockCommandRunner,
        notifier: RecordingNotifier,
    ) -> Self {
        let config = Arc::new(DeployConfig::from_yaml(yaml).expect("scenario config is valid"));
        let repo = Arc::new(repo);
        let commands = Arc::new(commands);
        let notifier = Arc::new(notifier);

        let pipeline = PipelineRunner::new(
            Arc::clone(&config),
            commands.clone(),
            notifier.clone(),
        );
        let scheduler = PollScheduler::new(&config, repo.clone(), Arc::new(pipeline));

        Self {
            repo,
            commands,
            notifier,
            scheduler,
        }
    }
}

/// Baseline config: one build group, no optional stages
pub const MINIMAL: &str = r#"
repository:
  path: /srv/app
deploy_path: /var/www/app
build:
  install: npm install
"#;

/// Every stage except PostDeploy, which touches the real file system
pub const FULL: &str = r##"
repository:
  path: /srv/app
build_path: /srv/app/web
deploy_path: /var/www/app
build:
  install: npm ci
  compile: [npm run build:css, npm run build:js]
test:
  unit: npm test
restart: systemctl restart app
post_tasks:
  warm: curl -s http://localhost/
notify:
  channel: "#deploys"
"##;

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
