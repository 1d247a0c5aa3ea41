//! Error types for the contacts CLI.

use std::fmt;

use contacts_config::ConfigError;
use contacts_messaging::MessagingError;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug)]
pub enum CliError {
    /// IO error (reading message files, etc.)
    Io(std::io::Error),

    /// Configuration could not be loaded or is invalid
    Config(ConfigError),

    /// Broker or envelope failure
    Messaging(MessagingError),

    /// Invalid argument
    InvalidArgument(String),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Messaging(e) if e.is_fatal() => 3,
            CliError::Messaging(MessagingError::Malformed(_))
            | CliError::Config(_)
            | CliError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Messaging(e) => write!(f, "{}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<MessagingError> for CliError {
    fn from(e: MessagingError) -> Self {
        CliError::Messaging(e)
    }
}
