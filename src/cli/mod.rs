//! CLI module
//!
//! Command-line interface for running pipelines.
//!
//! # Commands
//!
//! - `run` - Fetch every source and emit nodes and derived fields
//! - `validate` - Parse and resolve a pipeline definition
//! - `sanitize` - Show how keys are sanitized

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
