//! Mock transport for testing.
//!
//! Allows queueing responses and capturing sent requests for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use cardset_sync_types::{CardSetState, Request, Response};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock transport for testing.
///
/// Allows queueing responses and capturing sent requests for verification.
/// Clones share the same queue, so a test can keep a handle while a session
/// owns another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    sent_messages: Vec<Vec<u8>>,
    response_queue: VecDeque<Vec<u8>>,
    fail_next_request: Option<String>,
    delay: Option<Duration>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by the next `request()` call.
    pub fn queue_response(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.response_queue.push_back(data);
    }

    /// Queue a successful snapshot response.
    pub fn queue_snapshot(&self, state: CardSetState) {
        let bytes = Response::snapshot(state).to_bytes().unwrap();
        self.queue_response(bytes);
    }

    /// Get all requests that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Get the last request that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.last().cloned()
    }

    /// Decode every request that was sent.
    pub fn sent_requests(&self) -> Vec<Request> {
        self.sent_messages()
            .iter()
            .map(|bytes| Request::from_bytes(bytes).unwrap())
            .collect()
    }

    /// Cause the next request() to fail with the given error.
    pub fn fail_next_request(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_request = Some(error.to_string());
    }

    /// Hold every response for `delay` before answering.
    ///
    /// The request is recorded as sent straight away; the queued response is
    /// taken once the delay is over.
    pub fn set_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.delay = Some(delay);
    }

    /// Clear all state (messages, queue, pending failures, delay).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();

            // Check for forced failure
            if let Some(error) = inner.fail_next_request.take() {
                return Err(TransportError::SendFailed(error));
            }

            inner.sent_messages.push(data.to_vec());
            inner.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner
            .response_queue
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)
    }
}
