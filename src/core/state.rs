//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Run has been triggered but no step started yet
    Pending,
    /// The named step is executing
    Running { step: String },
    /// Every step returned a token
    Succeeded,
    /// The named step failed; later steps never ran
    Failed {
        step: String,
        exit_code: Option<i32>,
        error: String,
    },
    /// The run was cancelled while the named step was active or about to start
    Cancelled { step: String },
}

impl RunState {
    /// Check if the run is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed { .. } | RunState::Cancelled { .. }
        )
    }

    /// Name of the step a failed or cancelled run stopped at
    pub fn stopped_at(&self) -> Option<&str> {
        match self {
            RunState::Failed { step, .. } | RunState::Cancelled { step } => Some(step),
            _ => None,
        }
    }
}

/// Status of a single step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Never invoked because an earlier step failed or the run was cancelled
    Skipped,
    Cancelled,
}

/// Per-step entry in a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
}

impl StepRecord {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            exit_code: None,
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique execution ID
    pub execution_id: Uuid,

    pub pipeline: String,

    pub state: RunState,

    pub started_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,

    /// One record per step, in execution order
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Create a pending report for the given step names
    pub fn new<'a>(pipeline: &str, step_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline: pipeline.to_string(),
            state: RunState::Pending,
            started_at: Utc::now(),
            finished_at: None,
            steps: step_names.into_iter().map(StepRecord::pending).collect(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Succeeded
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub(crate) fn step_mut(&mut self, name: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    /// Names of the steps with the given status, in execution order
    pub fn steps_with_status(&self, status: StepStatus) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Move to a terminal state; untouched steps become `Skipped`
    pub(crate) fn finish(&mut self, state: RunState) {
        for step in &mut self.steps {
            if step.status == StepStatus::Pending {
                step.status = StepStatus::Skipped;
            }
        }
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, if finished
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.finished_at
            .and_then(|end| end.signed_duration_since(self.started_at).to_std().ok())
    }
}
