//! Pipeline graph domain model
//!
//! A pipeline is a fixed linear chain: every step but the first depends
//! on exactly the step before it. There is no way to add edges after
//! construction, so the chain is acyclic by construction.

use crate::core::{
    config::{ConfigError, PipelineConfig},
    step::Step,
};
use std::collections::{HashMap, HashSet};

/// A pipeline definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineGraph {
    name: String,

    description: Option<String>,

    /// Variables available to every step's command template
    pub variables: HashMap<String, String>,

    steps: Vec<Step>,
}

impl PipelineGraph {
    /// Create a pipeline graph from a validated configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut previous: Option<String> = None;
        let steps = config
            .steps
            .iter()
            .map(|step_config| {
                let step = Step {
                    name: step_config.name.clone(),
                    command_template: step_config.command.clone(),
                    working_dir: step_config.working_dir.clone(),
                    description: step_config.description.clone(),
                    depends_on: previous.take(),
                };
                previous = Some(step.name.clone());
                step
            })
            .collect();

        PipelineGraph {
            name: config.name.clone(),
            description: config.description.clone(),
            variables: config.variables.clone(),
            steps,
        }
    }

    /// Start building a graph in code
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            description: None,
            variables: HashMap::new(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Override or add template variables
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }
}

/// Append-only builder; each appended step depends on the one before it
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    description: Option<String>,
    variables: HashMap<String, String>,
    steps: Vec<Step>,
}

impl PipelineBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Append a step to the end of the chain
    pub fn step(mut self, mut step: Step) -> Self {
        step.depends_on = self.steps.last().map(|prev| prev.name.clone());
        self.steps.push(step);
        self
    }

    pub fn build(self) -> Result<PipelineGraph, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "pipeline '{}' has no steps",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(ConfigError::Invalid("step name must not be empty".to_string()));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate step name: {}", step.name)));
            }
            if step.command_template.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "step '{}' has an empty command",
                    step.name
                )));
            }
        }

        Ok(PipelineGraph {
            name: self.name,
            description: self.description,
            variables: self.variables,
            steps: self.steps,
        })
    }
}
