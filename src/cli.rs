// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `baksnap-runner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "baksnap-runner",
    version,
    about = "Replicate snapshot deltas to every configured backup target.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `baksnap.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "baksnap.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BAKSNAP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the planned tasks, but don't run any transfer.
    #[arg(long)]
    pub dry_run: bool,

    /// Power the machine off once the backup completed (not after a stop).
    #[arg(long)]
    pub shutdown_after: bool,

    /// Override the lock file location from the config.
    #[arg(long, value_name = "PATH")]
    pub lock_file: Option<String>,
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
