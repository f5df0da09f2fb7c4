// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `launchgate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "launchgate",
    version,
    about = "Gate a desktop shell on connectivity, supervise its backend, and tear it down cleanly.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Launchgate.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Launchgate.toml")]
    pub config: String,

    /// Backend executable; overrides `[backend].path`.
    ///
    /// With this flag the config file may be absent.
    #[arg(long, value_name = "PATH")]
    pub backend: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LAUNCHGATE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the config, print it, and exit without probing or
    /// spawning anything.
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
