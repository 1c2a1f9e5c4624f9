//! CLI command implementations.

pub mod install;
pub mod resolve;
pub mod version;

use std::path::PathBuf;

use clap::Args;
use netinstall::logging::{self, LoggingConfig, LoggingGuard};
use netinstall::InstallerConfig;

use crate::error::CliError;

/// Options shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run in update mode (tags mirror and telemetry requests)
    #[arg(long)]
    pub update: bool,
}

impl CommonArgs {
    /// Load the configuration file and apply command-line overrides.
    pub fn load_config(&self) -> Result<InstallerConfig, CliError> {
        let mut config = match self.config.clone().or_else(InstallerConfig::default_path) {
            Some(path) => InstallerConfig::load(&path)?,
            None => InstallerConfig::default().with_env_overrides(),
        };
        if self.update {
            config = config.with_update_mode(true);
        }
        Ok(config)
    }
}

/// Install the tracing subscriber writing to the log file and the
/// in-memory buffer.
pub fn init_logging() -> Result<LoggingGuard, CliError> {
    let guard = logging::init(LoggingConfig::default())?;
    if let Some(path) = guard.log_file() {
        tracing::info!(path = %path.display(), version = netinstall::VERSION, "netinstall started");
    }
    Ok(guard)
}
