// src/cli.rs

//! CLI argument parsing using `clap`.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::parse_duration;
use crate::types::FailurePolicy;

/// Command-line arguments for `action-graph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "action-graph",
    version,
    about = "Run a graph of shell commands in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the graph file (TOML).
    #[arg(long, value_name = "PATH", default_value = "ActionGraph.toml")]
    pub graph: String,

    /// Maximum number of actions running at once (0 = unbounded).
    ///
    /// Overrides `[run].max_parallelism`.
    #[arg(long, value_name = "N")]
    pub max_parallelism: Option<usize>,

    /// What to do after a failure: `fail-fast` or `continue`.
    ///
    /// Overrides `[run].on_failure`.
    #[arg(long, value_name = "POLICY")]
    pub on_failure: Option<FailurePolicy>,

    /// Wall-clock limit for the whole run, e.g. `30s` or `2m`.
    ///
    /// Overrides `[run].timeout`.
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout_arg)]
    pub timeout: Option<Duration>,

    /// Treat dependencies that declined to run as satisfied.
    #[arg(long)]
    pub lenient: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ACTION_GRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_timeout_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
