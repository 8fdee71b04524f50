//! Step domain model

use crate::core::command::Command;
use std::collections::HashMap;
use std::path::PathBuf;

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Shell command template, may contain `{{ variable }}` placeholders
    pub command_template: String,

    /// Directory the command runs from
    pub working_dir: Option<PathBuf>,

    /// Human-readable summary shown by `plan`
    pub description: Option<String>,

    /// Name of the immediately preceding step (None for the first step)
    pub depends_on: Option<String>,
}

/// Opaque witness that the predecessor step succeeded.
///
/// Only the step executor can mint one, so holding a token proves a
/// step in this run exited cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken {
    _private: (),
}

impl RunToken {
    pub(crate) fn witness() -> Self {
        Self { _private: () }
    }
}

impl Step {
    pub fn new(name: impl Into<String>, command_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command_template: command_template.into(),
            working_dir: None,
            description: None,
            depends_on: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this step must receive a token before it may run
    pub fn requires_token(&self) -> bool {
        self.depends_on.is_some()
    }

    /// Render the command with variable substitution
    pub fn render_command(&self, variables: &HashMap<String, String>) -> String {
        let mut command = self.command_template.clone();

        // Replace variables in the form {{ variable_name }}
        for (key, value) in variables {
            let placeholder = format!("{{{{ {} }}}}", key);
            command = command.replace(&placeholder, value);
        }

        command
    }

    /// Build the runnable command for this step
    pub fn to_command(&self, variables: &HashMap<String, String>) -> Command {
        let command = Command::new(self.render_command(variables));
        match &self.working_dir {
            Some(dir) => command.with_working_dir(dir.clone()),
            None => command,
        }
    }
}
