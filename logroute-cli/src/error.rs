//! CLI-specific error types and exit code mapping

use logroute_core::error::LogrouteError;
use logroute_pipeline::DeliveryError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid command-line input (bad JSON, unknown section, ...).
    #[error("invalid input: {0}")]
    Input(String),

    /// The router rejected or failed to persist an event.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logroute-core.
    #[error("{0}")]
    Core(#[from] LogrouteError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 0    | Success                  |
    /// | 1    | General error            |
    /// | 2    | Configuration error      |
    /// | 3    | Delivery failure         |
    /// | 10   | IO error                 |
    /// | 64   | Invalid input            |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(LogrouteError::Config(_)) => 2,
            Self::Delivery(_) => 3,
            Self::Input(_) => 64,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Core(_) => 1,
        }
    }
}

impl From<DeliveryError> for CliError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::Config { .. } => Self::Config(e.to_string()),
            e if e.is_caller_error() => Self::Input(e.to_string()),
            e => Self::Delivery(e.to_string()),
        }
    }
}
