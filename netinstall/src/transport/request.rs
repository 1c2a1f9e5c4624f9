//! Download request and outcome types.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, InstallError};

/// A single download attempt.
///
/// Built once per attempt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    destination: PathBuf,
    headers: HashMap<String, String>,
}

impl DownloadRequest {
    /// Create a request with no extra headers.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            headers: HashMap::new(),
        }
    }

    /// Attach extra headers. Later values replace earlier ones.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Result of a [`DownloadRequest`]. Exactly one is produced per request.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The body was written completely.
    Success { path: PathBuf, bytes_written: u64 },
    /// The download failed; any partial file has been removed.
    Failure(InstallError),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error kind of a failed outcome.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(err) => Some(err.kind()),
        }
    }

    /// Convert into a `Result`, yielding the written path and byte count.
    pub fn into_result(self) -> Result<(PathBuf, u64), InstallError> {
        match self {
            Self::Success {
                path,
                bytes_written,
            } => Ok((path, bytes_written)),
            Self::Failure(err) => Err(err),
        }
    }
}
