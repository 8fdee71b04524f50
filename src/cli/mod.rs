//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{PlanCommand, RunCommand, ScheduleCommand, ValidateCommand};
use std::ffi::OsString;

/// Scrape, load, transform and enrich pipeline runner
#[derive(Debug, Parser, Clone)]
#[command(name = "kara-pipeline")]
#[command(version)]
#[command(about = "Runs a linear pipeline of shell steps, ad hoc or on a schedule", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline once
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Run a pipeline on its configured schedule until interrupted
    Schedule(ScheduleCommand),

    /// Show the resolved commands without running them
    Plan(PlanCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
