//! Pipeline configuration from YAML

use crate::core::{
    pipeline::PipelineGraph,
    schedule::{OverlapPolicy, ScheduleError, ScheduleSpec},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating a pipeline file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid pipeline: {0}")]
    Invalid(String),

    #[error("environment variable(s) not set: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Variables substituted into step commands
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// How step commands are launched
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Pipeline steps, in execution order
    pub steps: Vec<StepConfig>,

    /// Recurring trigger, if the pipeline runs on a schedule
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Shell command template
    pub command: String,

    /// Directory to run the command from
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Optional explicit predecessor; must name the previous step
    #[serde(default)]
    pub depends_on: Option<String>,
}

/// Settings for launching step processes.
///
/// This is the only place step commands get their environment from:
/// values may reference the orchestrator's environment as `${VAR}`, and
/// those references are resolved once when the file is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Shell used to interpret step commands (`<shell> -c <command>`)
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Extra environment variables for every step
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Whether children inherit the orchestrator's environment
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,

    /// Number of trailing output lines kept in each command result
    #[serde(default = "default_capture_lines")]
    pub capture_lines: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            environment: BTreeMap::new(),
            inherit_env: default_inherit_env(),
            capture_lines: default_capture_lines(),
        }
    }
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

fn default_inherit_env() -> bool {
    true
}

fn default_capture_lines() -> usize {
    200
}

/// Schedule section of a pipeline file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression
    pub cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub overlap: OverlapPolicy,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

const ENV_PLACEHOLDER: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

impl RunnerConfig {
    /// Replace `${VAR}` references using `lookup`; every missing variable is reported
    pub fn resolve_environment<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let placeholder =
            Regex::new(ENV_PLACEHOLDER).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let mut missing = Vec::new();

        for value in self.environment.values_mut() {
            let resolved = placeholder.replace_all(value.as_str(), |caps: &regex::Captures| {
                let name = &caps[1];
                lookup(name).unwrap_or_else(|| {
                    missing.push(name.to_string());
                    String::new()
                })
            });
            *value = resolved.into_owned();
        }

        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            missing.dedup();
            Err(ConfigError::MissingEnv(missing))
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration, resolving `${VAR}` from the process environment
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_yaml_with_env(yaml, |key| std::env::var(key).ok())
    }

    /// Parse pipeline configuration with an explicit environment lookup
    pub fn from_yaml_with_env<F>(yaml: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.runner.resolve_environment(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "pipeline '{}' has no steps",
                self.name
            )));
        }
        if self.runner.shell.trim().is_empty() {
            return Err(ConfigError::Invalid("runner shell must not be empty".to_string()));
        }

        // Check that all step names are unique
        let mut seen_names = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(ConfigError::Invalid("step name must not be empty".to_string()));
            }
            if !seen_names.insert(&step.name) {
                return Err(ConfigError::Invalid(format!("duplicate step name: {}", step.name)));
            }
            if step.command.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "step '{}' has an empty command",
                    step.name
                )));
            }
        }

        // The chain is linear: an explicit depends_on may only name the previous step
        let mut previous: Option<&str> = None;
        for step in &self.steps {
            match (step.depends_on.as_deref(), previous) {
                (None, _) => {}
                (Some(dep), Some(prev)) if dep == prev => {}
                (Some(dep), None) => {
                    return Err(ConfigError::Invalid(format!(
                        "first step '{}' cannot depend on '{}'",
                        step.name, dep
                    )));
                }
                (Some(dep), Some(prev)) => {
                    return Err(ConfigError::Invalid(format!(
                        "step '{}' depends on '{}', but steps run in file order and its predecessor is '{}'",
                        step.name, dep, prev
                    )));
                }
            }
            previous = Some(&step.name);
        }

        // Fail fast on a bad schedule, before anything can run
        if let Some(spec) = self.schedule_spec() {
            spec.compile()?;
        }

        Ok(())
    }

    /// Schedule spec for this pipeline, if one is configured
    pub fn schedule_spec(&self) -> Option<ScheduleSpec> {
        self.schedule
            .as_ref()
            .map(|s| ScheduleSpec::new(s.cron.clone(), s.timezone.clone(), self.name.clone()))
    }

    /// Convert config to a pipeline graph
    pub fn to_pipeline(&self) -> PipelineGraph {
        PipelineGraph::from_config(self)
    }
}
