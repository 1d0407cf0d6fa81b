//! Transport abstraction for cardset-sync.
//!
//! This module provides a pluggable transport layer that abstracts
//! how encoded requests reach the relay (HTTP, mock for testing, or an
//! in-process relay in integration tests).
//!
//! # Design
//!
//! The transport is a byte-level request/response channel: one encoded
//! [`Request`] in, one encoded [`Response`] out. Encoding and decoding stay
//! in the session, so every transport carries the same MessagePack frames.
//!
//! [`Request`]: cardset_sync_types::Request
//! [`Response`]: cardset_sync_types::Response
//!
//! # Example
//!
//! ```ignore
//! let transport = HttpTransport::new("http://localhost:8080")?;
//! let response = transport.request(&request.to_bytes()?).await?;
//! ```

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::MockTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Content type of encoded requests and responses.
pub const CONTENT_TYPE: &str = "application/msgpack";

/// Transport errors.
///
/// All of these are transient from the session's point of view: the round
/// fails and the queued updates are resubmitted on the next poll.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the relay.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed before a response arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The relay answered with a non-success HTTP status.
    #[error("relay returned status {0}")]
    Status(u16),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,
}

/// Transport trait for exchanging sync protocol messages with the relay.
///
/// Implementations handle the underlying connection mechanism
/// (HTTP, in-process, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one encoded request and wait for its encoded response.
    async fn request(&self, data: &[u8]) -> Result<Vec<u8>, TransportError>;
}
