//! netinstall - network bootstrap installer
//!
//! This library resolves the latest setup executable, downloads it with
//! progress reporting and retries, falls back to a signed mirror or the
//! public release listing when the primary source fails, and runs the
//! downloaded installer to completion.
//!
//! Front-ends start a session with [`Installer::start`] and render the
//! [`InstallEvent`]s it produces.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod orchestrator;
pub mod resolver;
pub mod telemetry;
pub mod transport;

pub use config::InstallerConfig;
pub use error::{ErrorKind, InstallError, InstallResult};
pub use orchestrator::{InstallEvent, InstallHandle, InstallOutcome, Installer, SessionState};
pub use transport::ProgressEvent;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
