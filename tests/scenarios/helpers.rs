//! Test utilities for kara-pipeline scenarios

use async_trait::async_trait;
use kara_pipeline::core::config::PipelineConfig;
use kara_pipeline::{
    CancelSignal, Command, CommandResult, CommandRunner, ExecutionError, ExecutionEvent,
    PipelineGraph, RunReport, RunState, StepStatus, Supervisor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock runner that records every invocation and fails on demand
///
/// This is useful for:
/// - Counting how often each step command ran
/// - Failing a chosen step with a chosen exit code
/// - Simulating slow steps for overlap and cancellation tests
#[derive(Clone, Default)]
pub struct MockRunner {
    invocations: Arc<Mutex<Vec<String>>>,
    failures: Arc<HashMap<String, i32>>,
    delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `invocation` exit with `code`
    pub fn failing(mut self, invocation: &str, code: i32) -> Self {
        let mut failures = (*self.failures).clone();
        failures.insert(invocation.to_string(), code);
        self.failures = Arc::new(failures);
        self
    }

    /// Add artificial delay to simulate a slow step
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every invocation so far, in call order
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn count(&self, invocation: &str) -> usize {
        self.invocations()
            .iter()
            .filter(|i| i.as_str() == invocation)
            .count()
    }

    /// Highest number of commands that were running at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        command: &Command,
        mut cancel: CancelSignal,
    ) -> Result<CommandResult, ExecutionError> {
        self.invocations
            .lock()
            .unwrap()
            .push(command.invocation().to_string());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let cancelled = match self.delay {
            Some(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = wait_cancelled(&mut cancel) => true,
                }
            }
            None => false,
        };

        self.active.fetch_sub(1, Ordering::SeqCst);

        if cancelled {
            return Err(ExecutionError::Cancelled {
                command: command.to_string(),
            });
        }
        match self.failures.get(command.invocation()) {
            Some(code) => Err(ExecutionError::NonZeroExit {
                command: command.to_string(),
                exit_code: Some(*code),
            }),
            None => Ok(CommandResult::success(vec![])),
        }
    }
}

/// Resolves once the signal flips to `true`; never resolves if it cannot
async fn wait_cancelled(cancel: &mut CancelSignal) {
    let closed = cancel.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Outcome of a scenario run
pub struct PipelineTestResult {
    pub report: RunReport,
    pub events: Vec<ExecutionEvent>,
}

/// Supervisor wired to record its events into the returned buffer
pub fn recording_supervisor(
    runner: MockRunner,
) -> (Supervisor<MockRunner>, Arc<Mutex<Vec<ExecutionEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut supervisor = Supervisor::new(runner);
    supervisor.add_event_handler(move |event| sink.lock().unwrap().push(event));
    (supervisor, events)
}

/// Run a graph once with the given mock runner
pub async fn run_pipeline_with_mock(graph: &PipelineGraph, runner: MockRunner) -> PipelineTestResult {
    let (supervisor, events) = recording_supervisor(runner);
    let report = supervisor.run(graph).await;
    let events = events.lock().unwrap().clone();
    PipelineTestResult { report, events }
}

pub fn pipeline_from_yaml(yaml: &str) -> PipelineGraph {
    PipelineConfig::from_yaml(yaml)
        .expect("Should parse YAML")
        .to_pipeline()
}

/// Linear graph whose step `n` runs the command `stepN`
pub fn numbered_pipeline(name: &str, steps: usize) -> PipelineGraph {
    (1..=steps)
        .fold(PipelineGraph::builder(name), |builder, n| {
            builder.step(kara_pipeline::Step::new(
                format!("step{}", n),
                format!("step{}", n),
            ))
        })
        .build()
        .expect("Should build graph")
}

/// Step events only, rendered as `start:<step>` / `finish:<step>` / `fail:<step>`
pub fn step_event_trace(events: &[ExecutionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::StepStarted { step } => Some(format!("start:{}", step)),
            ExecutionEvent::StepFinished { step } => Some(format!("finish:{}", step)),
            ExecutionEvent::StepFailed { step, .. } => Some(format!("fail:{}", step)),
            _ => None,
        })
        .collect()
}

pub fn assert_pipeline_succeeded(result: &PipelineTestResult) {
    assert_eq!(
        result.report.state,
        RunState::Succeeded,
        "Expected pipeline to succeed, got {:?}",
        result.report.state
    );
}

pub fn assert_pipeline_failed_at(result: &PipelineTestResult, step: &str, exit_code: Option<i32>) {
    match &result.report.state {
        RunState::Failed {
            step: failed,
            exit_code: code,
            ..
        } => {
            assert_eq!(failed, step, "Pipeline failed at the wrong step");
            assert_eq!(*code, exit_code, "Unexpected exit code");
        }
        other => panic!("Expected pipeline to fail at '{}', got {:?}", step, other),
    }
}

pub fn assert_step_status(result: &PipelineTestResult, step: &str, status: StepStatus) {
    let record = result
        .report
        .step(step)
        .unwrap_or_else(|| panic!("Step '{}' not in report", step));
    assert_eq!(
        record.status, status,
        "Step '{}' expected {:?}, got {:?}",
        step, status, record.status
    );
}
