//! kara-pipeline - a scheduled linear pipeline of shell steps

pub mod cli;
pub mod core;
pub mod execution;
pub mod runner;

// Re-export commonly used types
pub use core::config::{ConfigError, PipelineConfig, RunnerConfig};
pub use core::{
    Command, CommandResult, OverlapPolicy, PipelineGraph, RunReport, RunState, RunToken,
    ScheduleError, ScheduleSpec, Step, StepStatus,
};
pub use execution::{Dispatch, ExecutionEvent, Scheduler, StepError, StepExecutor, Supervisor};
pub use runner::{
    never_cancelled, CancelSignal, CommandRunner, ExecutionError, InProcessRunner, OutputSink,
    ShellCommandRunner,
};
