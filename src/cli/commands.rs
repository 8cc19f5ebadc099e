//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fetch an HTTP API and normalize it into nodes
#[derive(Parser, Debug)]
#[command(name = "apinode")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output (debug logging and key rename diagnostics)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every configured source and emit its nodes
    Run {
        /// Pipeline definition file (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Development mode (enables refresh ids)
        #[arg(long)]
        dev: bool,

        /// Treat the refresh endpoint as enabled
        #[arg(long)]
        refresh_endpoint: bool,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// Write output to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a pipeline definition
    Validate {
        /// Pipeline definition file (YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the sanitized form of each key
    Sanitize {
        /// Keys to sanitize
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// One pretty-printed document
    Pretty,
}
