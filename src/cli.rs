// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;
use crate::types::RunMode;

/// Command-line arguments for `taskdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskdag",
    version,
    about = "Validate a task dependency graph and run it with bounded parallelism.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task file (TOML).
    ///
    /// Default: `Taskdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Maximum number of tasks running at once; overrides `[run].concurrency`.
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Failure handling; overrides `[run].mode`.
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<ModeArg>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the execution plan, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the task graph in Graphviz DOT format and exit.
    #[arg(long)]
    pub dot: bool,
}

/// Run mode as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    BestEffort,
    FailFast,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::BestEffort => RunMode::BestEffort,
            ModeArg::FailFast => RunMode::FailFast,
        }
    }
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = CliArgs::parse_from(["taskdag", "--config", "x.toml", "-j", "4", "--mode", "fail-fast"]);
        assert_eq!(args.config, PathBuf::from("x.toml"));
        assert_eq!(args.concurrency, Some(4));
        assert_eq!(args.mode.map(RunMode::from), Some(RunMode::FailFast));
        assert!(!args.dry_run);
    }

    #[test]
    fn config_defaults_to_taskdag_toml() {
        let args = CliArgs::parse_from(["taskdag"]);
        assert_eq!(args.config, default_config_path());
        assert_eq!(args.config, PathBuf::from("Taskdag.toml"));
        assert!(args.mode.is_none());
    }
}
