//! Command and command result models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single external invocation handed to a command runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    invocation: String,
    working_dir: Option<PathBuf>,
}

impl Command {
    /// Create a command from a shell invocation string
    pub fn new(invocation: impl Into<String>) -> Self {
        Self {
            invocation: invocation.into(),
            working_dir: None,
        }
    }

    /// Run the command from the given directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The invocation string passed to the shell
    pub fn invocation(&self) -> &str {
        &self.invocation
    }

    /// Directory the command runs from, if any
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.working_dir {
            Some(dir) => write!(f, "cd {} && {}", dir.display(), self.invocation),
            None => f.write_str(&self.invocation),
        }
    }
}

/// Which standard stream a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of child process output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            text: text.into(),
        }
    }
}

/// Outcome of one successful runner invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status of the process (always 0 for a returned result)
    pub exit_code: i32,

    /// Tail of the interleaved stdout/stderr stream
    pub output: Vec<OutputLine>,
}

impl CommandResult {
    pub fn success(output: Vec<OutputLine>) -> Self {
        Self {
            exit_code: 0,
            output,
        }
    }

    /// Captured output joined into one string
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
