//! Test: Failure Handling - first failure aborts the rest of the chain

use crate::helpers::*;
use kara_pipeline::StepStatus;

/// Four steps, the second one fails
#[tokio::test]
async fn test_failure_at_step_two_skips_downstream() {
    let graph = numbered_pipeline("four", 4);
    let runner = MockRunner::new().failing("step2", 1);

    let result = run_pipeline_with_mock(&graph, runner.clone()).await;

    assert_pipeline_failed_at(&result, "step2", Some(1));
    assert_eq!(runner.count("step1"), 1);
    assert_eq!(runner.count("step2"), 1);
    assert_eq!(runner.count("step3"), 0);
    assert_eq!(runner.count("step4"), 0);

    assert_step_status(&result, "step1", StepStatus::Succeeded);
    assert_step_status(&result, "step2", StepStatus::Failed);
    assert_step_status(&result, "step3", StepStatus::Skipped);
    assert_step_status(&result, "step4", StepStatus::Skipped);
}

/// A failing step is invoked exactly once
#[tokio::test]
async fn test_failed_step_is_not_retried() {
    let graph = numbered_pipeline("once", 2);
    let runner = MockRunner::new().failing("step1", 7);

    let result = run_pipeline_with_mock(&graph, runner.clone()).await;

    assert_pipeline_failed_at(&result, "step1", Some(7));
    assert_eq!(runner.invocations(), vec!["step1"]);
    assert_eq!(result.report.step("step1").unwrap().exit_code, Some(7));
}

/// Failure of the final step still fails the run
#[tokio::test]
async fn test_failure_at_last_step() {
    let graph = numbered_pipeline("tail", 3);
    let runner = MockRunner::new().failing("step3", 2);

    let result = run_pipeline_with_mock(&graph, runner.clone()).await;

    assert_pipeline_failed_at(&result, "step3", Some(2));
    assert_eq!(runner.invocations(), vec!["step1", "step2", "step3"]);
    assert!(result.report.steps_with_status(StepStatus::Skipped).is_empty());
}

/// The failure event names the step and carries the exit code
#[tokio::test]
async fn test_failure_event_trace() {
    let graph = numbered_pipeline("trace", 3);
    let runner = MockRunner::new().failing("step2", 5);

    let result = run_pipeline_with_mock(&graph, runner).await;

    assert_eq!(
        step_event_trace(&result.events),
        vec!["start:step1", "finish:step1", "start:step2", "fail:step2"]
    );
    let failed = result.events.iter().find_map(|e| match e {
        kara_pipeline::ExecutionEvent::StepFailed {
            exit_code, error, ..
        } => Some((*exit_code, error.clone())),
        _ => None,
    });
    let (code, error) = failed.expect("StepFailed event");
    assert_eq!(code, Some(5));
    assert!(error.contains("return code 5"));
}

/// Re-running after a failure starts again from the first step
#[tokio::test]
async fn test_rerun_after_failure_starts_from_beginning() {
    let graph = numbered_pipeline("rerun", 3);
    let runner = MockRunner::new().failing("step3", 1);
    let (supervisor, _events) = recording_supervisor(runner.clone());

    let first = supervisor.run(&graph).await;
    let second = supervisor.run(&graph).await;

    assert!(!first.is_success());
    assert!(!second.is_success());
    assert_eq!(runner.count("step1"), 2);
    assert_eq!(runner.count("step2"), 2);
    assert_eq!(runner.count("step3"), 2);
}
