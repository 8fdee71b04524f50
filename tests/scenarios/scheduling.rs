//! Test: Scheduling - registration, timed triggers and overlap policy

use crate::helpers::*;
use kara_pipeline::{OverlapPolicy, RunState, ScheduleError, ScheduleSpec, Scheduler};
use std::sync::Arc;
use std::time::Duration;

fn scheduler(runner: MockRunner, policy: OverlapPolicy) -> Scheduler<MockRunner> {
    let (supervisor, _events) = recording_supervisor(runner);
    Scheduler::new(Arc::new(supervisor), policy)
}

/// Poll until `check` holds or the deadline passes
async fn eventually(deadline: Duration, check: impl Fn() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

/// An unparseable expression is rejected and nothing ever fires
#[tokio::test]
async fn test_invalid_schedule_never_triggers() {
    let runner = MockRunner::new();
    let scheduler = scheduler(runner.clone(), OverlapPolicy::Skip);

    let result = scheduler.register(
        numbered_pipeline("bad", 2),
        &ScheduleSpec::new("61 * * * * *", "UTC", "bad"),
    );

    assert!(matches!(result, Err(ScheduleError::InvalidExpression { .. })));
    assert!(scheduler.registered().is_empty());

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(runner.invocations().is_empty());
}

/// A bad timezone is rejected too
#[tokio::test]
async fn test_invalid_timezone_rejected() {
    let scheduler = scheduler(MockRunner::new(), OverlapPolicy::Skip);
    let result = scheduler.register(
        numbered_pipeline("tz", 1),
        &ScheduleSpec::new("0 0 * * *", "Mars/Olympus", "tz"),
    );
    assert!(matches!(result, Err(ScheduleError::InvalidTimezone(_))));
}

/// An every-second schedule fires on its own
#[tokio::test]
async fn test_schedule_fires_without_manual_trigger() {
    let runner = MockRunner::new();
    let scheduler = scheduler(runner.clone(), OverlapPolicy::Skip);

    scheduler
        .register(
            numbered_pipeline("ticker", 2),
            &ScheduleSpec::new("* * * * * *", "UTC", "ticker"),
        )
        .unwrap();

    let fired = eventually(Duration::from_secs(3), || runner.count("step2") >= 1).await;
    assert!(fired, "schedule should have fired at least once");

    scheduler.shutdown();
    assert!(scheduler.registered().is_empty());
}

/// Skip policy drops a trigger while the pipeline is still running
#[tokio::test]
async fn test_skip_policy_drops_overlapping_trigger() {
    let runner = MockRunner::new().with_delay(Duration::from_millis(300));
    let scheduler = scheduler(runner.clone(), OverlapPolicy::Skip);
    scheduler
        .register(numbered_pipeline("slow", 1), &ScheduleSpec::daily_utc("slow"))
        .unwrap();

    let first = scheduler.trigger("slow").unwrap();
    let second = scheduler.trigger("slow").unwrap();

    assert!(!first.is_skipped());
    assert!(second.is_skipped());

    let report = first.report().await.unwrap();
    assert!(report.is_success());
    assert_eq!(runner.count("step1"), 1);

    // Once the run ends the pipeline can be triggered again
    let third = scheduler.trigger("slow").unwrap();
    assert!(third.report().await.unwrap().is_success());
    assert_eq!(runner.count("step1"), 2);
}

/// Queue policy runs overlapping triggers back to back
#[tokio::test]
async fn test_queue_policy_serializes_runs() {
    let runner = MockRunner::new().with_delay(Duration::from_millis(100));
    let scheduler = scheduler(runner.clone(), OverlapPolicy::Queue);
    scheduler
        .register(numbered_pipeline("queued", 2), &ScheduleSpec::daily_utc("queued"))
        .unwrap();

    let first = scheduler.trigger("queued").unwrap();
    let second = scheduler.trigger("queued").unwrap();
    assert!(!second.is_skipped());

    assert!(first.report().await.unwrap().is_success());
    assert!(second.report().await.unwrap().is_success());
    assert_eq!(runner.count("step1"), 2);
    assert_eq!(runner.count("step2"), 2);
    assert_eq!(runner.max_concurrent(), 1);
}

/// Different pipelines do not block each other
#[tokio::test]
async fn test_distinct_pipelines_run_concurrently() {
    let runner = MockRunner::new().with_delay(Duration::from_millis(200));
    let scheduler = scheduler(runner.clone(), OverlapPolicy::Skip);
    scheduler
        .register(numbered_pipeline("alpha", 1), &ScheduleSpec::daily_utc("alpha"))
        .unwrap();
    scheduler
        .register(numbered_pipeline("beta", 1), &ScheduleSpec::daily_utc("beta"))
        .unwrap();

    let alpha = scheduler.trigger("alpha").unwrap();
    let beta = scheduler.trigger("beta").unwrap();
    assert!(!alpha.is_skipped());
    assert!(!beta.is_skipped());

    assert!(alpha.report().await.unwrap().is_success());
    assert!(beta.report().await.unwrap().is_success());
    assert_eq!(runner.max_concurrent(), 2);
    assert_eq!(scheduler.registered(), vec!["alpha", "beta"]);
}

/// Shutdown cancels a run that is still in progress
#[tokio::test]
async fn test_shutdown_cancels_active_run() {
    let runner = MockRunner::new().with_delay(Duration::from_secs(30));
    let scheduler = scheduler(runner.clone(), OverlapPolicy::Skip);
    scheduler
        .register(numbered_pipeline("long", 2), &ScheduleSpec::daily_utc("long"))
        .unwrap();

    let dispatch = scheduler.trigger("long").unwrap();
    assert!(eventually(Duration::from_secs(2), || runner.count("step1") == 1).await);
    scheduler.shutdown();

    let report = tokio::time::timeout(Duration::from_secs(5), dispatch.report())
        .await
        .expect("run should stop promptly")
        .unwrap();
    assert_eq!(
        report.state,
        RunState::Cancelled {
            step: "step1".to_string()
        }
    );
    assert_eq!(runner.count("step2"), 0);
}
