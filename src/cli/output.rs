//! CLI output formatting

use crate::{
    core::{PipelineGraph, RunReport, RunState, StepStatus},
    execution::ExecutionEvent,
};
use console::Emoji;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static CLOCK: Emoji<'_, '_> = Emoji("🕛 ", "@ ");

/// Turns execution events into terminal lines with `[n/total]` step headers
#[derive(Debug)]
pub struct EventPrinter {
    total_steps: usize,
    step_number: AtomicUsize,
}

impl EventPrinter {
    pub fn new(total_steps: usize) -> Self {
        Self {
            total_steps,
            step_number: AtomicUsize::new(0),
        }
    }

    /// Format an execution event for display
    pub fn format(&self, event: &ExecutionEvent) -> String {
        match event {
            ExecutionEvent::RunStarted {
                execution_id,
                pipeline,
            } => {
                self.step_number.store(0, Ordering::SeqCst);
                format!(
                    "{} Starting pipeline {} ({})",
                    ROCKET,
                    style(pipeline).bold(),
                    style(short_id(execution_id)).dim()
                )
            }
            ExecutionEvent::StepStarted { step } => {
                let n = self.step_number.fetch_add(1, Ordering::SeqCst) + 1;
                format!(
                    "{}\n{} {} {}",
                    separator(),
                    style(format!("[{}/{}]", n, self.total_steps)).dim(),
                    SPINNER,
                    style(step).cyan().bold()
                )
            }
            ExecutionEvent::StepFinished { step } => {
                format!("{} {}", CHECK, style(step).green())
            }
            ExecutionEvent::StepFailed { step, error, .. } => {
                format!("{} {}: {}", CROSS, style(step).red(), style(error).dim())
            }
            ExecutionEvent::RunFinished {
                execution_id,
                state,
            } => format!(
                "{}\n{} Pipeline ({}) {}",
                separator(),
                INFO,
                style(short_id(execution_id)).dim(),
                format_run_state(state)
            ),
        }
    }
}

fn separator() -> String {
    style("─".repeat(60)).dim().to_string()
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a run state for display
pub fn format_run_state(state: &RunState) -> String {
    match state {
        RunState::Pending => style("PENDING").dim().to_string(),
        RunState::Running { step } => style(format!("RUNNING ({})", step)).yellow().to_string(),
        RunState::Succeeded => style("SUCCEEDED").green().to_string(),
        RunState::Failed { step, exit_code, .. } => {
            let code = exit_code
                .map(|c| format!(", exit code {}", c))
                .unwrap_or_default();
            style(format!("FAILED at {}{}", step, code)).red().to_string()
        }
        RunState::Cancelled { step } => style(format!("CANCELLED at {}", step)).yellow().to_string(),
    }
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
        StepStatus::Skipped => style("SKIPPED").dim().to_string(),
        StepStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Per-step summary table printed after a run
pub fn format_report(report: &RunReport) -> String {
    let width = report
        .steps
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::with_capacity(report.steps.len() + 1);
    for step in &report.steps {
        let duration = match (step.started_at, step.finished_at) {
            (Some(start), Some(end)) => end
                .signed_duration_since(start)
                .to_std()
                .map(format_duration)
                .unwrap_or_default(),
            _ => String::new(),
        };
        lines.push(format!(
            "  {:width$}  {}  {}",
            step.name,
            format_step_status(step.status),
            style(duration).dim(),
            width = width
        ));
    }
    if let Some(total) = report.duration() {
        lines.push(format!("  Total: {}", style(format_duration(total)).dim()));
    }
    lines.join("\n")
}

/// Ordered, rendered commands of a graph
pub fn format_plan(graph: &PipelineGraph) -> String {
    graph
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let mut entry = format!("  {} {}", style(format!("{}.", i + 1)).dim(), style(&step.name).bold());
            if let Some(description) = &step.description {
                entry.push_str(&format!(" {}", style(format!("- {}", description)).dim()));
            }
            entry.push_str(&format!("\n      {}", style(step.to_command(&graph.variables)).cyan()));
            entry
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
