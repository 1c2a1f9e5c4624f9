//! CLI error type.

use std::fmt;

use netinstall::config::ConfigError;
use netinstall::logging::LoggingError;
use netinstall::{ErrorKind, InstallError};

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be loaded.
    Config(ConfigError),
    /// Logging could not be initialized.
    Logging(LoggingError),
    /// Interactive prompt failed.
    Prompt(String),
    /// Ctrl-C handler could not be installed.
    SignalHandler(String),
    /// The session stopped without reporting an outcome.
    SessionLost,
    /// Resolution, download or the installer itself failed.
    Install(InstallError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Install(e) if e.kind() == ErrorKind::Cancelled => 130,
            CliError::Install(InstallError::InstallFailed { code: Some(code) }) => *code,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
            CliError::SignalHandler(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::SessionLost => write!(f, "The installer session ended unexpectedly"),
            CliError::Install(e) => write!(f, "{}", e.user_message()),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Install(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<InstallError> for CliError {
    fn from(e: InstallError) -> Self {
        CliError::Install(e)
    }
}
