//! Test: at most one deploy run at a time, concurrent ticks are dropped

use crate::helpers::*;
use autodeploy::execution::TickOutcome;
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn test_tick_during_deploy_has_no_side_effects() {
    let commands = MockCommandRunner::new();
    let gate = commands.gate("npm install");
    let h = Harness::new(MINIMAL, MockRepository::new(1), commands, RecordingNotifier::new());

    let first = {
        let scheduler = h.scheduler.clone();
        tokio::spawn(async move { scheduler.tick().await })
    };
    wait_until(|| h.commands.commands().contains(&"npm install".to_string())).await;
    assert!(h.scheduler.flight().is_busy());

    // New commits arrive while the first run is blocked in Build
    h.repo.set_behind(3);
    let git_calls = h.repo.calls().len();

    let outcome = h.scheduler.tick().await.unwrap();

    assert!(matches!(outcome, TickOutcome::Skipped));
    assert_eq!(h.repo.calls().len(), git_calls);
    assert_eq!(h.commands.commands().len(), 1);

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, TickOutcome::Deployed(ref r) if r.success));
    assert!(!h.scheduler.flight().is_busy());
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_poll_loop_drops_ticks_while_deploying() {
    let commands = MockCommandRunner::new();
    let gate = commands.gate("npm install");
    let h = Harness::new(MINIMAL, MockRepository::new(1), commands, RecordingNotifier::new());

    let (stop, stopped) = oneshot::channel::<()>();
    let scheduler = h.scheduler.clone().with_interval(Duration::from_millis(10));
    let handle = tokio::spawn(async move {
        scheduler
            .run_until(async {
                let _ = stopped.await;
            })
            .await
    });

    wait_until(|| h.commands.commands().contains(&"npm install".to_string())).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    // Several ticks fired, none of them touched the repository
    assert_eq!(h.repo.count("fetch"), 1);
    assert!(h.scheduler.flight().is_busy());

    gate.notify_one();
    wait_until(|| h.repo.count("fetch") >= 2).await;
    assert!(!h.scheduler.flight().is_busy());

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(h.repo.count("pull"), 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_deploy() {
    let commands = MockCommandRunner::new();
    let gate = commands.gate("npm install");
    let h = Harness::new(MINIMAL, MockRepository::new(1), commands, RecordingNotifier::new());

    let (stop, stopped) = oneshot::channel::<()>();
    let scheduler = h.scheduler.clone().with_interval(Duration::from_millis(10));
    let handle = tokio::spawn(async move {
        scheduler
            .run_until(async {
                let _ = stopped.await;
            })
            .await
    });

    wait_until(|| h.commands.commands().contains(&"npm install".to_string())).await;
    stop.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!handle.is_finished());

    gate.notify_one();
    handle.await.unwrap().unwrap();

    assert!(!h.scheduler.flight().is_busy());
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_lock_held_until_poll_loop_collects_result() {
    let commands = MockCommandRunner::new();
    let gate = commands.gate("npm install");
    let h = Harness::new(MINIMAL, MockRepository::new(1), commands, RecordingNotifier::new());

    let (stop, stopped) = oneshot::channel::<()>();
    let scheduler = h.scheduler.clone().with_interval(Duration::from_secs(3600));
    let handle = tokio::spawn(async move {
        scheduler
            .run_until(async {
                let _ = stopped.await;
            })
            .await
    });

    wait_until(|| h.commands.commands().contains(&"npm install".to_string())).await;
    gate.notify_one();
    wait_until(|| h.notifier.sent().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The run is over but its result has not been collected yet
    assert!(h.scheduler.flight().is_busy());
    h.repo.set_behind(2);
    let outcome = h.scheduler.tick().await.unwrap();
    assert!(matches!(outcome, TickOutcome::Skipped));
    assert_eq!(h.repo.count("fetch"), 1);

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert!(!h.scheduler.flight().is_busy());
    assert_eq!(h.repo.count("pull"), 1);
}
