//! Schedule specification and cron compilation

use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while registering or compiling a schedule
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("invalid timezone '{0}' (expected UTC or a fixed offset like +03:00)")]
    InvalidTimezone(String),

    #[error("schedule targets pipeline '{expected}' but was registered with '{actual}'")]
    PipelineMismatch { expected: String, actual: String },

    #[error("pipeline '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("no pipeline named '{0}' is registered")]
    UnknownPipeline(String),

    #[error("scheduler has been shut down")]
    ShutDown,
}

/// What to do with a trigger that fires while the same pipeline is still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new trigger
    #[default]
    Skip,
    /// Wait for the active run to finish, then start
    Queue,
}

/// Time-based trigger configuration bound to one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    /// Cron expression (5, 6 or 7 fields, or an `@daily` style macro)
    pub expression: String,

    /// `UTC` or a fixed offset such as `+03:00`
    pub timezone: String,

    /// Name of the pipeline this schedule fires
    pub pipeline: String,
}

impl ScheduleSpec {
    pub fn new(
        expression: impl Into<String>,
        timezone: impl Into<String>,
        pipeline: impl Into<String>,
    ) -> Self {
        Self {
            expression: expression.into(),
            timezone: timezone.into(),
            pipeline: pipeline.into(),
        }
    }

    /// Every day at midnight UTC
    pub fn daily_utc(pipeline: impl Into<String>) -> Self {
        Self::new("0 0 * * *", "UTC", pipeline)
    }

    /// Parse the expression and timezone
    pub fn compile(&self) -> Result<CompiledSchedule, ScheduleError> {
        let normalized = normalize_expression(&self.expression)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| {
            ScheduleError::InvalidExpression {
                expression: self.expression.clone(),
                reason: e.to_string(),
            }
        })?;
        let offset = parse_timezone(&self.timezone)?;

        Ok(CompiledSchedule { schedule, offset })
    }
}

/// A validated schedule ready to compute fire times
#[derive(Debug, Clone)]
pub struct CompiledSchedule {
    schedule: Schedule,
    offset: FixedOffset,
}

impl CompiledSchedule {
    /// First fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.offset);
        self.schedule
            .after(&local)
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// The next `count` fire times after `after`
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let local = after.with_timezone(&self.offset);
        self.schedule
            .after(&local)
            .take(count)
            .map(|dt| dt.with_timezone(&Utc))
            .collect()
    }
}

/// The cron crate wants a leading seconds field; accept classic 5-field input too
fn normalize_expression(expression: &str) -> Result<String, ScheduleError> {
    let trimmed = expression.trim();
    if trimmed.starts_with('@') {
        return Ok(trimmed.to_string());
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(ScheduleError::InvalidExpression {
            expression: expression.to_string(),
            reason: format!("expected 5, 6 or 7 fields, found {}", n),
        }),
    }
}

fn parse_timezone(timezone: &str) -> Result<FixedOffset, ScheduleError> {
    let invalid = || ScheduleError::InvalidTimezone(timezone.to_string());
    let trimmed = timezone.trim();

    if matches!(trimmed, "UTC" | "utc" | "Z" | "GMT" | "Etc/UTC") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "00"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
