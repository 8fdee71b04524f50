//! Step executor - runs individual steps with the command runner

use crate::{
    core::{RunToken, Step},
    execution::engine::{EventBus, ExecutionEvent},
    runner::{CancelSignal, CommandRunner, ExecutionError},
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error returned when a step does not produce a token
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step '{step}' failed: {source}")]
    Execution {
        step: String,
        #[source]
        source: ExecutionError,
    },

    #[error("step '{step}' requires a token from '{predecessor}' but none was given")]
    MissingToken { step: String, predecessor: String },
}

impl StepError {
    pub fn step(&self) -> &str {
        match self {
            StepError::Execution { step, .. } | StepError::MissingToken { step, .. } => step,
        }
    }

    /// Exit code of the failed command, if it ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepError::Execution { source, .. } => source.exit_code(),
            StepError::MissingToken { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Execution { source, .. } if source.is_cancelled())
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
    events: EventBus,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            events: EventBus::default(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Execute a step and return a token for its successor.
    ///
    /// The command runs exactly once; a failure is returned as-is and
    /// never retried.
    pub async fn execute(
        &self,
        step: &Step,
        variables: &HashMap<String, String>,
        predecessor: Option<RunToken>,
        cancel: CancelSignal,
    ) -> Result<RunToken, StepError> {
        if let Some(required) = &step.depends_on {
            if predecessor.is_none() {
                warn!(step = %step.name, predecessor = %required, "step invoked without a token");
                return Err(StepError::MissingToken {
                    step: step.name.clone(),
                    predecessor: required.clone(),
                });
            }
        }

        let command = step.to_command(variables);
        info!(step = %step.name, "Executing step");
        debug!(step = %step.name, command = %command, "rendered step command");
        self.events.emit(ExecutionEvent::StepStarted {
            step: step.name.clone(),
        });

        match self.runner.run(&command, cancel).await {
            Ok(result) => {
                debug!(step = %step.name, captured_lines = result.output.len(), "step output captured");
                info!(step = %step.name, "Step completed");
                self.events.emit(ExecutionEvent::StepFinished {
                    step: step.name.clone(),
                });
                Ok(RunToken::witness())
            }
            Err(source) => {
                self.events.emit(ExecutionEvent::StepFailed {
                    step: step.name.clone(),
                    exit_code: source.exit_code(),
                    error: source.to_string(),
                });
                Err(StepError::Execution {
                    step: step.name.clone(),
                    source,
                })
            }
        }
    }
}
