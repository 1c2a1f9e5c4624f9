//! Error types for the installer.
//!
//! Every failure inside the transport, resolver and orchestrator is carried
//! as an [`InstallError`] value. Callers that only need the coarse category
//! use [`InstallError::kind`]; front-ends show [`InstallError::user_message`]
//! and log the full `Display` output.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for installer operations.
pub type InstallResult<T> = Result<T, InstallError>;

/// Coarse failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect, DNS, timeout or truncated body.
    NetworkError,
    /// Non-2xx response after retries were exhausted.
    ServerError,
    /// The response body did not have the expected shape.
    MalformedResponse,
    /// The downloaded file is missing or empty.
    VerificationFailed,
    /// The downloaded artifact could not be started.
    LaunchFailed,
    /// The artifact ran and exited unsuccessfully.
    InstallFailed,
    /// The session was cancelled.
    Cancelled,
    /// A local filesystem operation failed.
    Io,
    /// Another install session is already running.
    SessionActive,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetworkError => "network error",
            Self::ServerError => "server error",
            Self::MalformedResponse => "malformed response",
            Self::VerificationFailed => "verification failed",
            Self::LaunchFailed => "launch failed",
            Self::InstallFailed => "install failed",
            Self::Cancelled => "cancelled",
            Self::Io => "I/O error",
            Self::SessionActive => "session active",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while resolving, downloading or running an installer.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The request never produced a usable response.
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Server { url: String, status: u16 },

    /// The response could not be interpreted.
    #[error("unexpected response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// Post-download verification failed.
    #[error("verification of {} failed: {reason}", path.display())]
    VerificationFailed { path: PathBuf, reason: String },

    /// The child process could not be spawned.
    #[error("failed to launch {}: {source}", path.display())]
    LaunchFailed { path: PathBuf, source: io::Error },

    /// The child process exited unsuccessfully.
    #[error("installer exited with {}", describe_exit(*code))]
    InstallFailed { code: Option<i32> },

    /// The session was cancelled by the caller.
    #[error("installation cancelled")]
    Cancelled,

    /// A local file or directory operation failed.
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// A second session was started while one is in flight.
    #[error("an installation is already in progress")]
    SessionActive,

    /// Both the primary and the fallback source failed.
    #[error("all download sources failed (primary: {primary}; fallback: {fallback})")]
    SourcesExhausted {
        primary: Box<InstallError>,
        fallback: Box<InstallError>,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl InstallError {
    /// Build a network error from a reqwest failure.
    pub(crate) fn network(url: &str, err: &reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("timed out ({})", err)
        } else {
            err.to_string()
        };
        Self::Network {
            url: url.to_string(),
            reason,
        }
    }

    /// The coarse category of this error.
    ///
    /// `SourcesExhausted` reports the kind of the fallback failure, which is
    /// the last thing that went wrong.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::NetworkError,
            Self::Server { .. } => ErrorKind::ServerError,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::VerificationFailed { .. } => ErrorKind::VerificationFailed,
            Self::LaunchFailed { .. } => ErrorKind::LaunchFailed,
            Self::InstallFailed { .. } => ErrorKind::InstallFailed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io { .. } => ErrorKind::Io,
            Self::SessionActive => ErrorKind::SessionActive,
            Self::SourcesExhausted { fallback, .. } => fallback.kind(),
        }
    }

    /// Whether a retry of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Server { status, .. } if *status >= 500)
    }

    /// Whether this is a failure to obtain a response from the remote side.
    fn is_download_outage(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NetworkError | ErrorKind::ServerError | ErrorKind::MalformedResponse
        )
    }

    /// Short message suitable for the front-end.
    ///
    /// Download outages, corrupt artifacts and launch problems get distinct
    /// wording so they can be told apart without reading the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::SourcesExhausted { fallback, .. } if !fallback.is_download_outage() => {
                fallback.user_message()
            }
            Self::SourcesExhausted { .. }
            | Self::Network { .. }
            | Self::Server { .. }
            | Self::MalformedResponse { .. } => {
                "Download failed. Please try again later.".to_string()
            }
            Self::VerificationFailed { .. } => {
                "The downloaded installer is empty or missing.".to_string()
            }
            Self::LaunchFailed { .. } => "The installer could not be started.".to_string(),
            Self::InstallFailed { code } => {
                format!("The installer exited unsuccessfully ({}).", describe_exit(*code))
            }
            Self::Cancelled => "Installation cancelled.".to_string(),
            Self::Io { .. } => "Could not write the installer to disk.".to_string(),
            Self::SessionActive => "An installation is already in progress.".to_string(),
        }
    }
}
