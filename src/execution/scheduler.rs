//! Poll scheduler - keeps the working tree in sync and triggers deploy runs

use crate::{
    core::{config::DeployConfig, GitOperationError, PipelineResult, RepoStatus, SchedulerExhaustedError},
    execution::PipelineRunner,
    git::RepositoryClient,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Consecutive failed ticks tolerated before the scheduler gives up
pub const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Single-flight lock: at most one deploy run at a time
///
/// Not a queue; callers that fail to acquire simply drop their work.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock if it is free; dropping the guard releases it
    pub fn try_acquire(self: &Arc<Self>) -> Option<FlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        debug!("[deploy] Processing state changed: true");
        Some(FlightGuard {
            flight: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
        debug!("[deploy] Processing state changed: false");
    }
}

/// Proof of holding the single-flight lock
#[derive(Debug)]
pub struct FlightGuard {
    flight: Arc<SingleFlight>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flight.release();
    }
}

/// What a single tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// A deploy run was in flight; nothing was touched
    Skipped,
    /// No new commits
    UpToDate,
    /// A deploy run completed
    Deployed(PipelineResult),
}

/// A deploy spawned by the poll loop
///
/// The flight guard lives here rather than in the task, so the lock is only
/// released once the loop has harvested the task's result.
struct InFlight {
    handle: JoinHandle<Result<PipelineResult, GitOperationError>>,
    _guard: FlightGuard,
}

/// Fires sync-and-maybe-deploy cycles on a fixed interval
#[derive(Clone)]
pub struct PollScheduler {
    repo: Arc<dyn RepositoryClient>,
    pipeline: Arc<PipelineRunner>,
    flight: Arc<SingleFlight>,
    branch: String,
    interval: Duration,
    force: bool,
    max_failures: u32,
}

impl PollScheduler {
    pub fn new(
        config: &DeployConfig,
        repo: Arc<dyn RepositoryClient>,
        pipeline: Arc<PipelineRunner>,
    ) -> Self {
        Self {
            repo,
            pipeline,
            flight: Arc::new(SingleFlight::new()),
            branch: config.repository.branch.clone(),
            interval: config.poll_interval(),
            force: config.debug,
            max_failures: MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Override the poll period (also the retry delay)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Deploy on every tick regardless of new commits
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn flight(&self) -> &Arc<SingleFlight> {
        &self.flight
    }

    /// Bring the local branch in line with the target and fetch the remote
    pub async fn sync(&self) -> Result<RepoStatus, GitOperationError> {
        info!(
            "[git] {} Fetching from remote for branch {}",
            chrono::Local::now().format("%H:%M:%S"),
            self.branch
        );

        let current = self.repo.current_branch().await?;
        if current.name != self.branch {
            info!(
                "[git] Not on correct branch, switching from {} to {}",
                current.name, self.branch
            );
            self.repo.checkout(&self.branch).await?;
        }

        self.repo.fetch().await?;

        let status = self.repo.status().await?;
        info!("[git] Repository is {} commit(s) behind", status.behind);
        Ok(status)
    }

    fn should_deploy(&self, status: RepoStatus) -> bool {
        status.behind > 0 || self.force
    }

    /// Reset, clean, pull and run the pipeline while holding `guard`
    pub async fn deploy(&self, guard: FlightGuard) -> Result<PipelineResult, GitOperationError> {
        let _guard = guard;
        self.pull_and_run().await
    }

    async fn pull_and_run(&self) -> Result<PipelineResult, GitOperationError> {
        self.repo.reset_hard().await?;
        self.repo.clean_untracked().await?;

        info!("[git] Pulling from remote");
        self.repo.pull().await?;

        let branch = self.repo.current_branch().await?;
        Ok(self.pipeline.run(&branch).await)
    }

    /// One complete sync-and-maybe-deploy cycle, run inline
    pub async fn tick(&self) -> Result<TickOutcome, GitOperationError> {
        if self.flight.is_busy() {
            debug!("[deploy] Deploy in progress, skipping tick");
            return Ok(TickOutcome::Skipped);
        }

        let status = self.sync().await?;
        if !self.should_deploy(status) {
            return Ok(TickOutcome::UpToDate);
        }

        let Some(guard) = self.flight.try_acquire() else {
            return Ok(TickOutcome::Skipped);
        };
        self.deploy(guard).await.map(TickOutcome::Deployed)
    }

    /// Poll until the retry budget is exhausted
    pub async fn run(&self) -> Result<(), SchedulerExhaustedError> {
        self.run_until(std::future::pending()).await
    }

    /// Poll until `shutdown` resolves or the retry budget is exhausted
    ///
    /// The first tick fires immediately. Deploy runs are spawned so that
    /// ticks arriving while one is in flight are observed and dropped; the
    /// single-flight lock is held until the loop harvests the run's result.
    /// On shutdown an in-flight run is awaited before returning.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), SchedulerExhaustedError>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut in_flight: Option<InFlight> = None;
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("[deploy] Shutdown requested");
                    if let Some(deploy) = in_flight.take() {
                        info!("[deploy] Waiting for in-flight deploy to finish");
                        if let Err(e) = deploy.handle.await {
                            error!("[deploy] Deploy task did not complete: {}", e);
                        }
                    }
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Some(deploy) = in_flight.take() {
                if !deploy.handle.is_finished() {
                    debug!("[deploy] Deploy in progress, skipping tick");
                    in_flight = Some(deploy);
                    continue;
                }
                // The guard drops at the end of this block, after the result is in.
                match deploy.handle.await {
                    Ok(Ok(result)) => {
                        debug!("[deploy] Deploy finished, success: {}", result.success);
                        failures = 0;
                    }
                    Ok(Err(e)) => self.record_failure(&mut failures, e)?,
                    Err(e) => error!("[deploy] Deploy task did not complete: {}", e),
                }
            }

            if self.flight.is_busy() {
                debug!("[deploy] Deploy in progress, skipping tick");
                continue;
            }

            match self.sync().await {
                Ok(status) if self.should_deploy(status) => {
                    if let Some(guard) = self.flight.try_acquire() {
                        let scheduler = self.clone();
                        in_flight = Some(InFlight {
                            handle: tokio::spawn(async move { scheduler.pull_and_run().await }),
                            _guard: guard,
                        });
                    }
                }
                Ok(_) => failures = 0,
                Err(e) => self.record_failure(&mut failures, e)?,
            }
        }
    }

    fn record_failure(
        &self,
        failures: &mut u32,
        e: GitOperationError,
    ) -> Result<(), SchedulerExhaustedError> {
        *failures += 1;
        if *failures >= self.max_failures {
            error!(
                "[git] Giving up after {} consecutive failures: {}",
                failures, e
            );
            return Err(SchedulerExhaustedError {
                attempts: *failures,
                last_error: e,
            });
        }
        warn!(
            "[git] Sync failed ({}/{}), retrying in {:?}: {}",
            failures, self.max_failures, self.interval, e
        );
        Ok(())
    }
}
