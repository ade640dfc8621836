//! CLI interface for Wayfind
//!
//! Command-line interface using clap's derive API: run one goal, run a batch
//! file, inspect stored outcome statistics and show the configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::outcomes::EntityKind;

/// Wayfind goal execution engine
///
/// Drives a page-control service towards natural-language goals, one
/// supervised step at a time, and keeps per-entity outcome statistics.
#[derive(Parser, Debug)]
#[command(name = "wayfind")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute one goal now
    Run {
        /// The goal, e.g. "find Ada Lovelace in Wikipedia and then find images of her"
        goal: String,

        /// Step budget per sub-goal
        #[arg(long)]
        max_steps: Option<usize>,

        /// Enable only these context strategies (repeatable)
        #[arg(long = "strategy", value_name = "NAME")]
        strategies: Vec<String>,

        /// Pre-resolved focus entity
        #[arg(long)]
        focus: Option<String>,

        /// Do not judge the run or update outcome statistics
        #[arg(long)]
        no_feedback: bool,
    },

    /// Execute a batch request file ({goals, defaults, maxConsecutiveFailures})
    Batch {
        /// Path to the JSON request
        file: PathBuf,

        /// Do not judge the runs or update outcome statistics
        #[arg(long)]
        no_feedback: bool,
    },

    /// Show stored outcome statistics
    Outcomes {
        /// Entity kind: subject, organization or platform
        #[arg(long, default_value = "subject", value_parser = parse_entity_kind)]
        kind: EntityKind,

        /// Only show this key
        #[arg(long)]
        key: Option<String>,
    },

    /// List context strategies in priority order
    Strategies,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,
}

fn parse_entity_kind(value: &str) -> Result<EntityKind, String> {
    value.parse()
}
