// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `tapdriver`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tapdriver",
    version,
    about = "Drive an installed extractor tap: probe connectivity or run a sync.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the driver file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Tapdriver.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TAPDRIVER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Run the tap with `--discover` and fail on any diagnostic output.
    Probe,

    /// Run the tap and print every decoded message to stdout as JSON.
    Sync {
        /// State override: inline JSON or a path to a state file.
        #[arg(long, value_name = "JSON|PATH", default_value = "")]
        state: String,
    },
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

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
