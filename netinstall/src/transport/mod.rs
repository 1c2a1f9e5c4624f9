//! Single-file HTTP transport for the setup executable.
//!
//! This module provides:
//! - The request/outcome data types (`request`)
//! - Progress normalization (`progress`)
//! - Retry policy with exponential backoff (`retry`)
//! - The streaming reqwest-based transport (`http`)
//!
//! # Architecture
//!
//! ```text
//! Transport (trait)
//!     │
//!     └── HttpTransport
//!             ├── RetryPolicy      (5xx only, exponential backoff)
//!             ├── ProgressTracker  (bytes → ProgressEvent)
//!             └── BufWriter (1 MiB) → destination file
//! ```
//!
//! # Example
//!
//! ```ignore
//! use netinstall::transport::{DownloadRequest, HttpTransport, Transport};
//! use tokio_util::sync::CancellationToken;
//!
//! let transport = HttpTransport::new()?;
//! let request = DownloadRequest::new("https://example.com/Setup.exe", "/tmp/Setup.exe");
//! let outcome = transport.fetch(&request, &mut |event| println!("{:?}", event), &CancellationToken::new());
//! ```

mod http;
mod progress;
mod request;
mod retry;

pub use http::{HttpTransport, Transport, BUFFER_SIZE, DEFAULT_USER_AGENT};
pub use progress::{ProgressEvent, ProgressTracker};
pub use request::{DownloadOutcome, DownloadRequest};
pub use retry::RetryPolicy;
