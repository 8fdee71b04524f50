//! Pipeline execution: step executor, run supervisor and scheduler

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEvent, Supervisor};
pub use executor::{StepError, StepExecutor};
pub use scheduler::{Dispatch, Scheduler};
