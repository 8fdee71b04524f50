//! Core domain models for the pipeline
//!
//! This module defines the data structures that describe a pipeline:
//! commands, steps, the linear step graph, schedules and run state.

pub mod command;
pub mod config;
pub mod pipeline;
pub mod schedule;
pub mod state;
pub mod step;

pub use command::*;
pub use pipeline::*;
pub use schedule::*;
pub use state::*;
pub use step::*;
