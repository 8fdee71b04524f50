//! Command runners
//!
//! A runner takes one [`Command`] and drives it to completion. The
//! pipeline core only talks to the [`CommandRunner`] trait, so the
//! shell-backed runner can be swapped for an in-process one in tests.

pub mod error;
pub mod output;
pub mod subprocess;

pub use error::ExecutionError;
pub use output::{NoopSink, OutputSink, TerminalSink};
pub use subprocess::ShellCommandRunner;

use crate::core::{Command, CommandResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal shared by a run and the commands it starts.
///
/// The run is cancelled once the channel value becomes `true`.
pub type CancelSignal = watch::Receiver<bool>;

/// A signal that never fires
pub fn never_cancelled() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Trait for executing a single command
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion.
    ///
    /// Returns `Ok` only if the process exited with status zero. A command
    /// is never retried here.
    async fn run(
        &self,
        command: &Command,
        cancel: CancelSignal,
    ) -> Result<CommandResult, ExecutionError>;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    async fn run(
        &self,
        command: &Command,
        cancel: CancelSignal,
    ) -> Result<CommandResult, ExecutionError> {
        (**self).run(command, cancel).await
    }
}

/// Checks every runner performs before starting a command
pub(crate) fn preflight(command: &Command) -> Result<(), ExecutionError> {
    if command.invocation().trim().is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    if let Some(dir) = command.working_dir() {
        if !dir.is_dir() {
            return Err(ExecutionError::MissingWorkingDir(dir.to_path_buf()));
        }
    }
    Ok(())
}

/// Runner that answers every command with a closure instead of a process
pub struct InProcessRunner<F> {
    handler: F,
}

impl<F> InProcessRunner<F>
where
    F: Fn(&Command) -> Result<CommandResult, ExecutionError> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> CommandRunner for InProcessRunner<F>
where
    F: Fn(&Command) -> Result<CommandResult, ExecutionError> + Send + Sync,
{
    async fn run(
        &self,
        command: &Command,
        cancel: CancelSignal,
    ) -> Result<CommandResult, ExecutionError> {
        if command.invocation().trim().is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }
        if *cancel.borrow() {
            return Err(ExecutionError::Cancelled {
                command: command.to_string(),
            });
        }
        (self.handler)(command)
    }
}
