//! Streaming HTTP transport with retry on server errors.
//!
//! This module provides the core download functionality:
//! - Streamed GET with bounded connect/read timeouts
//! - Exponential backoff retries on 5xx responses
//! - Progress callbacks per written chunk
//! - Removal of partially written files on failure

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{ProgressEvent, ProgressTracker};
use super::request::{DownloadOutcome, DownloadRequest};
use super::retry::RetryPolicy;
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{InstallError, InstallResult};

/// Buffer size for reading/writing during downloads (1 MiB).
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// User agent sent with every request. Some release hosts reject requests
/// without a browser-like agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Granularity of cancellation checks while backing off.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Performs one download request to completion.
///
/// Implementations never panic on network or disk failures; every failure
/// is reported through [`DownloadOutcome::Failure`].
pub trait Transport: Send + Sync {
    /// Download `request` to its destination, reporting progress as it goes.
    fn fetch(
        &self,
        request: &DownloadRequest,
        on_progress: &mut dyn FnMut(ProgressEvent),
        cancel: &CancellationToken,
    ) -> DownloadOutcome;
}

/// reqwest-based transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Create a transport with a 30s timeout and the default retry policy.
    pub fn new() -> InstallResult<Self> {
        Self::with_settings(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            RetryPolicy::default(),
        )
    }

    /// Create a transport with a custom timeout and retry policy.
    pub fn with_settings(timeout: Duration, retry: RetryPolicy) -> InstallResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| InstallError::Network {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            retry,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn download(
        &self,
        request: &DownloadRequest,
        on_progress: &mut dyn FnMut(ProgressEvent),
        cancel: &CancellationToken,
    ) -> InstallResult<u64> {
        let dest = request.destination();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| InstallError::Io {
                action: "create directory",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(InstallError::Cancelled);
            }
            attempt += 1;
            debug!(url = request.url(), attempt, "Sending request");

            match self.send(request) {
                Ok(response) => return self.stream_to_file(response, request, on_progress, cancel),
                Err(err) if err.is_transient() => match self.retry.delay_for_attempt(attempt) {
                    Some(delay) => {
                        warn!(
                            url = request.url(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Server error, retrying"
                        );
                        if sleep_unless_cancelled(delay, cancel) {
                            return Err(InstallError::Cancelled);
                        }
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    fn send(&self, request: &DownloadRequest) -> InstallResult<Response> {
        let url = request.url();
        let mut builder = self.client.get(url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(|e| InstallError::network(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::Server {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Stream the response body to the destination file.
    fn stream_to_file(
        &self,
        mut response: Response,
        request: &DownloadRequest,
        on_progress: &mut dyn FnMut(ProgressEvent),
        cancel: &CancellationToken,
    ) -> InstallResult<u64> {
        let url = request.url();
        let dest = request.destination();
        let mut tracker = ProgressTracker::new(response.content_length());

        let file = File::create(dest).map_err(|e| write_error(dest, e))?;
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);

        match tracker.total() {
            None => {
                on_progress(ProgressEvent::Indeterminate);
                let body = response
                    .bytes()
                    .map_err(|e| InstallError::network(url, &e))?;
                if cancel.is_cancelled() {
                    return Err(InstallError::Cancelled);
                }
                writer.write_all(&body).map_err(|e| write_error(dest, e))?;
                tracker.advance(body.len() as u64);
            }
            Some(total) => {
                let mut buffer = vec![0u8; BUFFER_SIZE];
                loop {
                    if cancel.is_cancelled() {
                        return Err(InstallError::Cancelled);
                    }
                    let bytes_read = response.read(&mut buffer).map_err(|e| {
                        InstallError::Network {
                            url: url.to_string(),
                            reason: format!("read error: {}", e),
                        }
                    })?;
                    if bytes_read == 0 {
                        break;
                    }
                    writer
                        .write_all(&buffer[..bytes_read])
                        .map_err(|e| write_error(dest, e))?;
                    on_progress(tracker.advance(bytes_read as u64));
                }

                if tracker.written() < total {
                    return Err(InstallError::Network {
                        url: url.to_string(),
                        reason: format!(
                            "body ended after {} of {} bytes",
                            tracker.written(),
                            total
                        ),
                    });
                }
            }
        }

        writer.flush().map_err(|e| write_error(dest, e))?;
        Ok(tracker.written())
    }
}

impl Transport for HttpTransport {
    fn fetch(
        &self,
        request: &DownloadRequest,
        on_progress: &mut dyn FnMut(ProgressEvent),
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        let dest = request.destination();
        info!(url = request.url(), dest = %dest.display(), "Downloading");

        match self.download(request, on_progress, cancel) {
            Ok(bytes_written) => {
                info!(url = request.url(), bytes_written, "Download completed");
                DownloadOutcome::Success {
                    path: dest.to_path_buf(),
                    bytes_written,
                }
            }
            Err(err) => {
                warn!(url = request.url(), error = %err, "Download failed");
                remove_partial(dest);
                DownloadOutcome::Failure(err)
            }
        }
    }
}

fn write_error(path: &Path, source: std::io::Error) -> InstallError {
    InstallError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    }
}

/// Best-effort removal of a partially written file.
fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "Could not remove partial download");
        }
    }
}

/// Sleep for `delay`, waking early on cancellation. Returns true if cancelled.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancellationToken) -> bool {
    let mut remaining = delay;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return true;
        }
        let step = remaining.min(CANCEL_POLL_INTERVAL);
        thread::sleep(step);
        remaining -= step;
    }
    cancel.is_cancelled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockito::Matcher;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader};
    use std::net::{TcpListener, TcpStream};

    fn fast_transport() -> HttpTransport {
        HttpTransport::with_settings(
            Duration::from_secs(5),
            RetryPolicy::exponential(4, Duration::from_millis(5)),
        )
        .unwrap()
    }

    fn collect_fetch(
        transport: &HttpTransport,
        request: &DownloadRequest,
    ) -> (DownloadOutcome, Vec<ProgressEvent>) {
        let mut events = Vec::new();
        let outcome = transport.fetch(
            request,
            &mut |event| events.push(event),
            &CancellationToken::new(),
        );
        (outcome, events)
    }

    #[test]
    fn test_http_transport_defaults() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(transport.retry_policy().max_retries(), 3);
    }

    #[test]
    fn test_progress_reaches_one_with_content_length() {
        let mut server = mockito::Server::new();
        let body: Vec<u8> = (0..(3 * BUFFER_SIZE + 17)).map(|i| (i % 251) as u8).collect();
        let mock = server
            .mock("GET", "/setup.exe")
            .with_status(200)
            .with_body(body.clone())
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let request = DownloadRequest::new(format!("{}/setup.exe", server.url()), &dest);

        let (outcome, events) = collect_fetch(&fast_transport(), &request);

        mock.assert();
        match outcome {
            DownloadOutcome::Success {
                path,
                bytes_written,
            } => {
                assert_eq!(path, dest);
                assert_eq!(bytes_written, body.len() as u64);
            }
            DownloadOutcome::Failure(e) => panic!("unexpected failure: {}", e),
        }
        assert_eq!(fs::read(&dest).unwrap(), body);

        let fractions: Vec<f64> = events.iter().filter_map(|e| e.fraction()).collect();
        assert!(!fractions.is_empty());
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*fractions.last().unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_length_is_indeterminate() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/setup.exe")
            .with_status(200)
            .with_chunked_body(|w| w.write_all(b"chunked installer body"))
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let request = DownloadRequest::new(format!("{}/setup.exe", server.url()), &dest);

        let (outcome, events) = collect_fetch(&fast_transport(), &request);

        assert!(outcome.is_success());
        assert_eq!(events, vec![ProgressEvent::Indeterminate]);
        assert_eq!(fs::read(&dest).unwrap(), b"chunked installer body");
    }

    #[test]
    fn test_retries_three_server_errors_then_succeeds() {
        let mut server = mockito::Server::new();
        let failing = server
            .mock("GET", "/setup.exe")
            .with_status(500)
            .expect(3)
            .create();
        let ok = server
            .mock("GET", "/setup.exe")
            .with_status(200)
            .with_body("installer")
            .expect(1)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(
            format!("{}/setup.exe", server.url()),
            dir.path().join("setup.exe"),
        );

        let (outcome, _) = collect_fetch(&fast_transport(), &request);

        failing.assert();
        ok.assert();
        assert!(outcome.is_success());
    }

    #[test]
    fn test_gives_up_after_three_retries() {
        let mut server = mockito::Server::new();
        let failing = server
            .mock("GET", "/setup.exe")
            .with_status(503)
            .expect(4)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let request = DownloadRequest::new(format!("{}/setup.exe", server.url()), &dest);

        let (outcome, events) = collect_fetch(&fast_transport(), &request);

        failing.assert();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ServerError));
        assert!(events.is_empty());
        assert!(!dest.exists());
    }

    #[test]
    fn test_not_found_fails_without_retry() {
        let mut server = mockito::Server::new();
        let missing = server
            .mock("GET", "/setup.exe")
            .with_status(404)
            .expect(1)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let request = DownloadRequest::new(format!("{}/setup.exe", server.url()), &dest);

        let (outcome, _) = collect_fetch(&fast_transport(), &request);

        missing.assert();
        match outcome {
            DownloadOutcome::Failure(InstallError::Server { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected 404 failure, got {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let request =
            DownloadRequest::new("http://127.0.0.1:1/setup.exe", dir.path().join("setup.exe"));

        let (outcome, _) = collect_fetch(&fast_transport(), &request);

        assert_eq!(outcome.error_kind(), Some(ErrorKind::NetworkError));
    }

    #[test]
    fn test_sends_default_and_custom_headers() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/download")
            .match_header("user-agent", Matcher::Regex("Mozilla/5.0".to_string()))
            .match_header("accept", "*/*")
            .match_header("x-installer-id", "abc")
            .with_status(200)
            .with_body("ok")
            .create();

        let mut headers = HashMap::new();
        headers.insert("X-Installer-ID".to_string(), "abc".to_string());
        let dir = tempfile::tempdir().unwrap();
        let request = DownloadRequest::new(
            format!("{}/download", server.url()),
            dir.path().join("setup.exe"),
        )
        .with_headers(headers);

        let (outcome, _) = collect_fetch(&fast_transport(), &request);

        mock.assert();
        assert!(outcome.is_success());
    }

    #[test]
    fn test_creates_parent_directories() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/setup.exe")
            .with_status(200)
            .with_body("x")
            .create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("deeper").join("setup.exe");
        let request = DownloadRequest::new(format!("{}/setup.exe", server.url()), &dest);

        let (outcome, _) = collect_fetch(&fast_transport(), &request);

        assert!(outcome.is_success());
        assert!(dest.exists());
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/setup.exe").expect(0).create();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let request = DownloadRequest::new(format!("{}/setup.exe", server.url()), &dest);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = fast_transport().fetch(&request, &mut |_| {}, &cancel);

        mock.assert();
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Cancelled));
        assert!(!dest.exists());
    }

    /// Accept one connection on a local port, consume the request head and
    /// hand the stream to `respond`. Returns the URL to request.
    fn serve_once(respond: impl FnOnce(TcpStream) + Send + 'static) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap_or(0) > 0 && line != "\r\n" {
                    line.clear();
                }
                respond(stream);
            }
        });
        format!("http://{}/setup.exe", addr)
    }

    #[test]
    fn test_truncated_body_is_network_error_and_removes_file() {
        let url = serve_once(|mut stream| {
            let head = "HTTP/1.1 200 OK\r\nContent-Length: 100000\r\nConnection: close\r\n\r\n";
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&[7u8; 50_000]);
            let _ = stream.flush();
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let request = DownloadRequest::new(url, &dest);

        let (outcome, events) = collect_fetch(&fast_transport(), &request);

        assert_eq!(outcome.error_kind(), Some(ErrorKind::NetworkError));
        assert!(events
            .iter()
            .any(|e| matches!(e.fraction(), Some(p) if p > 0.0 && p < 1.0)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_cancel_between_chunks_removes_file() {
        let url = serve_once(|mut stream| {
            let head = "HTTP/1.1 200 OK\r\nContent-Length: 300000\r\nConnection: close\r\n\r\n";
            if stream.write_all(head.as_bytes()).is_err() {
                return;
            }
            for _ in 0..30 {
                if stream.write_all(&[3u8; 10_000]).is_err() || stream.flush().is_err() {
                    return;
                }
                thread::sleep(Duration::from_millis(50));
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("setup.exe");
        let request = DownloadRequest::new(url, &dest);
        let cancel = CancellationToken::new();

        let mut seen = 0;
        let outcome = fast_transport().fetch(
            &request,
            &mut |_| {
                seen += 1;
                if seen == 3 {
                    cancel.cancel();
                }
            },
            &cancel,
        );

        assert_eq!(outcome.error_kind(), Some(ErrorKind::Cancelled));
        assert_eq!(seen, 3);
        assert!(!dest.exists());
    }

    #[test]
    fn test_sleep_unless_cancelled() {
        let cancel = CancellationToken::new();
        assert!(!sleep_unless_cancelled(Duration::from_millis(1), &cancel));
        cancel.cancel();
        assert!(sleep_unless_cancelled(Duration::from_secs(10), &cancel));
    }
}
