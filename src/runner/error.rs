//! Runner error types

use std::path::PathBuf;
use thiserror::Error;

/// Error types for command execution
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("working directory does not exist: {}", .0.display())]
    MissingWorkingDir(PathBuf),

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed with return code {}: {command}", describe_code(.exit_code))]
    NonZeroExit {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("command cancelled: {command}")]
    Cancelled { command: String },
}

impl ExecutionError {
    /// Exit code of the process, when it ran and exited on its own
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::NonZeroExit { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled { .. })
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}
