//! CLI argument parsing using clap derive API
//!
//! This module is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use logroute_core::types::LogLevel;

/// logroute -- structured log delivery toolkit.
///
/// Use `logroute <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logroute", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logroute.toml configuration file.
    #[arg(short, long, default_value = "logroute.toml")]
    pub config: PathBuf,

    /// Override diagnostic log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write one log event through the router.
    Emit(EmitArgs),

    /// Show the route and path a flag resolves to without writing.
    Route(RouteArgs),

    /// Decrypt the encrypted fields of every entry in an NDJSON log file.
    Decrypt(DecryptArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- emit ----

/// Write one log event.
#[derive(Args, Debug)]
pub struct EmitArgs {
    /// Event flag (routing key).
    pub flag: String,

    /// Action name.
    #[arg(short, long, default_value = "cli")]
    pub action: String,

    /// Message text.
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Structured data as a JSON object.
    #[arg(short, long)]
    pub data: Option<String>,

    /// Event level (debug, info, warn, error, critical).
    #[arg(short, long, default_value = "info")]
    pub level: LogLevel,

    /// Treat the event as critical regardless of its route.
    #[arg(long)]
    pub critical: bool,

    /// Additional data fields to encrypt (repeatable).
    #[arg(long = "encrypt", value_name = "FIELD")]
    pub encrypt_fields: Vec<String>,

    /// Encrypt every data field.
    #[arg(long, conflicts_with = "encrypt_fields")]
    pub encrypt_all: bool,
}

// ---- route ----

/// Preview route resolution and path expansion.
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Event flag (routing key).
    pub flag: String,

    /// Structured data used for path placeholders, as a JSON object.
    #[arg(short, long)]
    pub data: Option<String>,
}

// ---- decrypt ----

/// Decrypt an NDJSON log file.
#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Log file to read.
    pub file: PathBuf,
}

// ---- config ----

/// Manage logroute configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, logging, encryption, slack).
        #[arg(long)]
        section: Option<String>,
    },
}
