//! HTTP transport: `POST {base_url}/rpc` with a MessagePack body.

use super::{Transport, TransportError, CONTENT_TYPE};
use async_trait::async_trait;
use std::time::Duration;

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionFailed(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::ReceiveFailed(e.to_string())
        } else {
            TransportError::SendFailed(e.to_string())
        }
    }
}

/// Transport that talks to a relay over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    rpc_url: String,
}

impl HttpTransport {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a transport for the relay at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Create a transport with an explicit per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            rpc_url: rpc_url(base_url),
        })
    }

    /// The endpoint requests are posted to.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

fn rpc_url(base_url: &str) -> String {
    format!("{}/rpc", base_url.trim_end_matches('/'))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let response = self
            .http
            .post(&self.rpc_url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(data.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}
