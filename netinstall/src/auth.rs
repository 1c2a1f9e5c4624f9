//! Signed request headers for the private distribution mirror.
//!
//! Each request carries the current Unix time, the client ID and an
//! HMAC-SHA256 signature over `"{timestamp}:{client_id}"`. The mirror rejects
//! timestamps outside its acceptance window, so headers are rebuilt for every
//! request and never cached.

use std::collections::HashMap;
use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Unix timestamp the signature was computed for.
pub const TIMESTAMP_HEADER: &str = "X-Installer-Timestamp";

/// Header carrying the hex-encoded signature.
pub const SIGNATURE_HEADER: &str = "X-Installer-Signature";

/// Header carrying the client ID.
pub const CLIENT_ID_HEADER: &str = "X-Installer-ID";

/// Signing material for a single request.
#[derive(Clone)]
pub struct AuthContext {
    client_id: Uuid,
    secret: Vec<u8>,
    timestamp: u64,
}

impl AuthContext {
    pub fn new(client_id: Uuid, secret: &[u8], timestamp: u64) -> Self {
        Self {
            client_id,
            secret: secret.to_vec(),
            timestamp,
        }
    }

    /// Context stamped with the current time.
    pub fn now(client_id: Uuid, secret: &[u8]) -> Self {
        Self::new(client_id, secret, unix_now())
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn message(&self) -> String {
        format!("{}:{}", self.timestamp, self.client_id)
    }

    fn mac(&self) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(self.message().as_bytes());
        mac
    }

    /// Lowercase hex HMAC-SHA256 signature.
    pub fn signature(&self) -> String {
        hex::encode(self.mac().finalize().into_bytes())
    }

    /// Check a hex signature against this context in constant time.
    pub fn verify(&self, signature: &str) -> bool {
        match hex::decode(signature) {
            Ok(bytes) => self.mac().verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// The three request headers.
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::with_capacity(3);
        headers.insert(TIMESTAMP_HEADER.to_string(), self.timestamp.to_string());
        headers.insert(SIGNATURE_HEADER.to_string(), self.signature());
        headers.insert(CLIENT_ID_HEADER.to_string(), self.client_id.to_string());
        headers
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("client_id", &self.client_id)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Produces fresh auth headers for every request.
#[derive(Clone)]
pub struct AuthHeaderGenerator {
    client_id: Uuid,
    secret: Vec<u8>,
}

impl AuthHeaderGenerator {
    pub fn new(client_id: Uuid, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            client_id,
            secret: secret.into(),
        }
    }

    /// A context stamped with the current time.
    pub fn context(&self) -> AuthContext {
        AuthContext::now(self.client_id, &self.secret)
    }

    /// Headers for a request sent now.
    pub fn headers(&self) -> HashMap<String, String> {
        self.context().headers()
    }
}

impl fmt::Debug for AuthHeaderGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeaderGenerator")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
