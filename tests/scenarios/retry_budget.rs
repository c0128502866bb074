//! Test: consecutive git failures and the retry budget

use crate::helpers::*;
use autodeploy::execution::MAX_CONSECUTIVE_FAILURES;
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn test_sync_failure_from_tick_is_returned() {
    let repo = MockRepository::new(1).failing("status", 1);
    let h = Harness::new(MINIMAL, repo, MockCommandRunner::new(), RecordingNotifier::new());

    let err = h.scheduler.tick().await.unwrap_err();

    assert_eq!(err.operation, "status");
    assert_eq!(h.repo.count("reset_hard"), 0);
    assert!(h.commands.commands().is_empty());
    assert!(!h.scheduler.flight().is_busy());
}

#[tokio::test]
async fn test_ten_consecutive_failures_exhaust_budget() {
    let repo = MockRepository::new(0).failing("fetch", u32::MAX);
    let h = Harness::new(MINIMAL, repo, MockCommandRunner::new(), RecordingNotifier::new());
    let scheduler = h.scheduler.clone().with_interval(Duration::from_millis(1));

    let err = tokio::time::timeout(Duration::from_secs(5), scheduler.run())
        .await
        .expect("scheduler should give up")
        .unwrap_err();

    assert_eq!(MAX_CONSECUTIVE_FAILURES, 10);
    assert_eq!(err.attempts, 10);
    assert_eq!(err.last_error.operation, "fetch");
    // The eleventh attempt never happens
    assert_eq!(h.repo.count("fetch"), 10);
}

#[tokio::test]
async fn test_recovery_before_budget_keeps_polling() {
    let repo = MockRepository::new(0).failing("fetch", 9);
    let h = Harness::new(MINIMAL, repo, MockCommandRunner::new(), RecordingNotifier::new());

    let (stop, stopped) = oneshot::channel::<()>();
    let scheduler = h.scheduler.clone().with_interval(Duration::from_millis(1));
    let handle = tokio::spawn(async move {
        scheduler
            .run_until(async {
                let _ = stopped.await;
            })
            .await
    });

    wait_until(|| h.repo.count("status") >= 3).await;
    stop.send(()).unwrap();

    assert!(handle.await.unwrap().is_ok());
    assert!(h.repo.count("fetch") > 10);
}

#[tokio::test]
async fn test_deploy_phase_failures_count_against_budget() {
    let repo = MockRepository::new(1).failing("pull", u32::MAX);
    let h = Harness::new(MINIMAL, repo, MockCommandRunner::new(), RecordingNotifier::new());
    let scheduler = h.scheduler.clone().with_interval(Duration::from_millis(1));

    let err = tokio::time::timeout(Duration::from_secs(5), scheduler.run())
        .await
        .expect("scheduler should give up")
        .unwrap_err();

    assert_eq!(err.attempts, 10);
    assert_eq!(err.last_error.operation, "pull");
    assert_eq!(h.repo.count("pull"), 10);
    // The pipeline never started
    assert!(h.commands.commands().is_empty());
    assert!(h.notifier.sent().is_empty());
    assert!(!h.scheduler.flight().is_busy());
}
