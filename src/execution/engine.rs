//! Main execution engine - walks a pipeline graph step by step

use crate::{
    core::{PipelineGraph, RunReport, RunState, RunToken, StepStatus},
    execution::executor::{StepError, StepExecutor},
    runner::{never_cancelled, CancelSignal, CommandRunner},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: Uuid,
        pipeline: String,
    },
    StepStarted {
        step: String,
    },
    StepFinished {
        step: String,
    },
    StepFailed {
        step: String,
        exit_code: Option<i32>,
        error: String,
    },
    RunFinished {
        execution_id: Uuid,
        state: RunState,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Registered event handlers, called synchronously in registration order
#[derive(Clone, Default)]
pub(crate) struct EventBus {
    handlers: Vec<EventHandler>,
}

impl EventBus {
    pub(crate) fn push<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub(crate) fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }
}

/// Owns the run of a pipeline from first step to terminal state
pub struct Supervisor<R> {
    executor: StepExecutor<R>,
}

impl<R: CommandRunner> Supervisor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: StepExecutor::new(runner),
        }
    }

    pub fn runner(&self) -> &R {
        self.executor.runner()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.executor.events_mut().push(handler);
    }

    /// Run every step of the graph once, in order
    pub async fn run(&self, graph: &PipelineGraph) -> RunReport {
        self.run_with_cancel(graph, never_cancelled()).await
    }

    /// Run the graph, stopping early if `cancel` flips to `true`.
    ///
    /// A step starts only once its predecessor returned a token. The first
    /// failure ends the run; later steps are recorded as skipped.
    pub async fn run_with_cancel(&self, graph: &PipelineGraph, cancel: CancelSignal) -> RunReport {
        let mut report = RunReport::new(graph.name(), graph.execution_order());
        let execution_id = report.execution_id;

        info!(pipeline = %graph.name(), %execution_id, steps = graph.len(), "Starting pipeline run");
        self.executor.events().emit(ExecutionEvent::RunStarted {
            execution_id,
            pipeline: graph.name().to_string(),
        });

        let mut token: Option<RunToken> = None;
        let mut outcome = RunState::Succeeded;

        for step in graph.steps() {
            let cancelled = *cancel.borrow();
            if cancelled {
                warn!(pipeline = %graph.name(), step = %step.name, "Run cancelled before step start");
                if let Some(record) = report.step_mut(&step.name) {
                    record.status = StepStatus::Cancelled;
                }
                outcome = RunState::Cancelled {
                    step: step.name.clone(),
                };
                break;
            }

            report.state = RunState::Running {
                step: step.name.clone(),
            };
            if let Some(record) = report.step_mut(&step.name) {
                record.status = StepStatus::Running;
                record.started_at = Some(Utc::now());
            }

            let result = self
                .executor
                .execute(step, &graph.variables, token.take(), cancel.clone())
                .await;

            let record = report.step_mut(&step.name);
            match result {
                Ok(next) => {
                    if let Some(record) = record {
                        record.status = StepStatus::Succeeded;
                        record.finished_at = Some(Utc::now());
                        record.exit_code = Some(0);
                    }
                    token = Some(next);
                }
                Err(e) if e.is_cancelled() => {
                    warn!(pipeline = %graph.name(), step = %step.name, "Step cancelled");
                    if let Some(record) = record {
                        record.status = StepStatus::Cancelled;
                        record.finished_at = Some(Utc::now());
                    }
                    outcome = RunState::Cancelled {
                        step: step.name.clone(),
                    };
                    break;
                }
                Err(e) => {
                    let exit_code = e.exit_code();
                    error!(
                        pipeline = %graph.name(),
                        step = %step.name,
                        exit_code = ?exit_code,
                        error = %e,
                        "Step failed, aborting downstream steps"
                    );
                    if let Some(record) = record {
                        record.status = StepStatus::Failed;
                        record.finished_at = Some(Utc::now());
                        record.exit_code = exit_code;
                    }
                    outcome = RunState::Failed {
                        step: step.name.clone(),
                        exit_code,
                        error: failure_message(&e),
                    };
                    break;
                }
            }
        }

        report.finish(outcome);

        match &report.state {
            RunState::Succeeded => {
                info!(pipeline = %graph.name(), %execution_id, "Pipeline run succeeded")
            }
            state => {
                info!(pipeline = %graph.name(), %execution_id, stopped_at = ?state.stopped_at(), "Pipeline run did not complete")
            }
        }

        self.executor.events().emit(ExecutionEvent::RunFinished {
            execution_id,
            state: report.state.clone(),
        });

        report
    }
}

fn failure_message(error: &StepError) -> String {
    match error {
        StepError::Execution { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
