//! Fire-and-forget download counter.
//!
//! When a session starts, a short-lived thread pings the configured counter
//! endpoint. The ping has a strict timeout, is never retried and its result
//! never reaches the install session.
//!
//! ```text
//! Installer::start ──► TelemetryPinger::ping ──► thread ──► GET {telemetry_url}[?update=1]
//!        │                                                     (2s timeout, errors logged)
//!        └──► session worker (does not wait)
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::http::{HttpClient, ReqwestClient};
use crate::resolver::with_update_flag;

/// Timeout applied to the telemetry request.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends the download-count ping.
#[derive(Clone)]
pub struct TelemetryPinger {
    url: String,
    client: Arc<dyn HttpClient>,
}

impl TelemetryPinger {
    /// Pinger using a reqwest client with [`PING_TIMEOUT`].
    ///
    /// Returns `None` when the client cannot be built; telemetry is then
    /// silently disabled.
    pub fn new(url: impl Into<String>) -> Option<Self> {
        match ReqwestClient::with_timeout(PING_TIMEOUT) {
            Ok(client) => Some(Self::with_client(url, Arc::new(client))),
            Err(e) => {
                debug!(error = %e, "Telemetry disabled");
                None
            }
        }
    }

    /// Pinger using the given client.
    pub fn with_client(url: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ping on a background thread.
    ///
    /// The handle is returned for tests; callers normally drop it.
    pub fn ping(&self, update_mode: bool) -> Option<JoinHandle<()>> {
        let url = with_update_flag(&self.url, update_mode);
        let client = Arc::clone(&self.client);

        thread::Builder::new()
            .name("telemetry-ping".to_string())
            .spawn(move || match client.get_json(&url) {
                Ok(response) => debug!(url = %url, status = response.status, "Telemetry ping sent"),
                Err(e) => debug!(url = %url, error = %e, "Telemetry ping failed"),
            })
            .map_err(|e| debug!(error = %e, "Could not spawn telemetry thread"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockHttpClient;

    #[test]
    fn test_ping_appends_update_flag() {
        let client = Arc::new(MockHttpClient::new().with_response(
            "http://count.test/inc?update=1",
            200,
            "{}",
        ));
        let pinger = TelemetryPinger::with_client("http://count.test/inc", client.clone());

        pinger.ping(true).unwrap().join().unwrap();

        assert_eq!(client.requested(), vec!["http://count.test/inc?update=1"]);
    }

    #[test]
    fn test_ping_failure_is_swallowed() {
        let client = Arc::new(MockHttpClient::new());
        let pinger = TelemetryPinger::with_client("http://count.test/inc", client.clone());

        assert!(pinger.ping(false).unwrap().join().is_ok());
        assert_eq!(client.requested(), vec!["http://count.test/inc"]);
    }

    #[test]
    fn test_ping_is_not_retried() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/count")
            .with_status(500)
            .expect(1)
            .create();

        let pinger = TelemetryPinger::new(format!("{}/count", server.url())).unwrap();
        pinger.ping(false).unwrap().join().unwrap();

        mock.assert();
    }
}
