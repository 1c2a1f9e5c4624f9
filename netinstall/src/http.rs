//! HTTP client abstraction for small JSON requests.
//!
//! The resolver and telemetry ping only need "GET this URL and give me the
//! status and body". Putting that behind a trait lets them be tested with
//! canned responses instead of a server.

use std::time::Duration;

use reqwest::header::ACCEPT;

use crate::config::DEFAULT_RESOLVE_TIMEOUT_SECS;
use crate::error::{InstallError, InstallResult};
use crate::transport::DEFAULT_USER_AGENT;

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for HTTP client operations.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request expecting a JSON body.
    ///
    /// Transport-level failures (connect, DNS, timeout) are errors; any HTTP
    /// status, including 4xx/5xx, is returned as a response.
    fn get_json(&self, url: &str) -> InstallResult<HttpResponse>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the default resolver timeout.
    pub fn new() -> InstallResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_RESOLVE_TIMEOUT_SECS))
    }

    /// Creates a client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> InstallResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| InstallError::Network {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get_json(&self, url: &str) -> InstallResult<HttpResponse> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| InstallError::network(url, &e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| InstallError::network(url, &e))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Mock HTTP client returning canned responses per URL.
    ///
    /// Unknown URLs fail with a network error.
    #[derive(Default)]
    pub struct MockHttpClient {
        responses: HashMap<String, HttpResponse>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(mut self, url: &str, status: u16, body: &str) -> Self {
            self.responses
                .insert(url.to_string(), HttpResponse::new(status, body.as_bytes()));
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get_json(&self, url: &str) -> InstallResult<HttpResponse> {
            self.requests.lock().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| InstallError::Network {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                })
        }
    }

    #[test]
    fn test_mock_client_success() {
        let mock = MockHttpClient::new().with_response("http://example.com", 200, "{}");

        let response = mock.get_json("http://example.com").unwrap();
        assert!(response.is_success());
        assert_eq!(response.body, b"{}".to_vec());
        assert_eq!(mock.requested(), vec!["http://example.com".to_string()]);
    }

    #[test]
    fn test_mock_client_error() {
        let mock = MockHttpClient::new();
        assert!(mock.get_json("http://example.com").is_err());
    }

    #[test]
    fn test_reqwest_client_returns_error_statuses() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/version")
            .match_header("accept", "application/json")
            .with_status(503)
            .with_body("busy")
            .create();

        let client = ReqwestClient::new().unwrap();
        let response = client
            .get_json(&format!("{}/version", server.url()))
            .unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert_eq!(response.body, b"busy".to_vec());
    }

    #[test]
    fn test_reqwest_client_connection_refused() {
        let client = ReqwestClient::with_timeout(Duration::from_secs(2)).unwrap();
        let err = client.get_json("http://127.0.0.1:1/version").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NetworkError);
    }
}
