//! CardSetSession - one client's view of one card set.
//!
//! This module provides [`CardSetSession`], which applies local edits
//! optimistically and reconciles them with the store in sync rounds.
//!
//! # Architecture
//!
//! ```text
//! Application → CardSetSession → Transport → Relay
//!                     ↓
//!        sync-core (reducer, log, diff, merge)
//! ```
//!
//! The session keeps two snapshots. `base` is the branchpoint: the last
//! snapshot the session and the store agreed on. `working` is `base` with
//! every unacknowledged update of the log replayed on top, and is what the
//! application renders.
//!
//! # Example
//!
//! ```ignore
//! use cardset_sync_client::{CardSetEditor, CardSetSession, HttpTransport, SessionConfig};
//!
//! let config = SessionConfig::new("http://localhost:8080", "my-set");
//! let transport = HttpTransport::new(config.relay_url())?;
//! let session = CardSetSession::new(config, transport);
//!
//! session.submit_new_card().await?;
//! let snapshot = session.sync_round().await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use cardset_sync_core::{apply, apply_in_place, merge, validate, LogError, ReduceError, UpdateLog};
use cardset_sync_types::{
    CardId, CardSetState, CardSetSummary, CollectionId, Request, Response, StateUpdate, Status,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::editor::{CardSetEditor, EditBuilder};
use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The relay refused the request.
    #[error("relay rejected request: {0}")]
    Rejected(String),

    /// The update log is full.
    #[error("{0}")]
    Log(#[from] LogError),

    /// The edit does not apply to the current snapshot.
    #[error("edit refused: {0}")]
    Reduce(#[from] ReduceError),

    /// The card is not a live Original.
    #[error("unknown original card: {0}")]
    UnknownCard(CardId),

    /// There is no card to draw.
    #[error("deck is empty")]
    EmptyDeck,

    /// A merge produced an invalid state; the session stopped syncing.
    #[error("session halted: {0}")]
    Halted(String),

    /// The session task is gone.
    #[error("session closed")]
    SessionClosed,
}

/// Configuration for a [`CardSetSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    relay_url: String,
    collection: CollectionId,
    poll_interval: Duration,
    debounce: Duration,
    log_capacity: usize,
    max_batch: usize,
}

impl SessionConfig {
    /// Default time between polls of the store.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
    /// Default quiet period after an edit before a round starts.
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
    /// Default bound on unacknowledged updates.
    pub const DEFAULT_LOG_CAPACITY: usize = 10_000;
    /// Default number of updates submitted per round, matching the relay's
    /// default batch limit.
    pub const DEFAULT_MAX_BATCH: usize = 1_000;

    /// Create a configuration for one collection on one relay.
    pub fn new(relay_url: &str, collection: impl Into<CollectionId>) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            collection: collection.into(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            debounce: Self::DEFAULT_DEBOUNCE,
            log_capacity: Self::DEFAULT_LOG_CAPACITY,
            max_batch: Self::DEFAULT_MAX_BATCH,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the debounce delay.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the update log capacity.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Set the most updates submitted in one round.
    ///
    /// Keep it at or below the relay's `max_batch_size`; a longer backlog
    /// drains over several rounds.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Base URL of the relay.
    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// Collection the session syncs.
    pub fn collection(&self) -> &CollectionId {
        &self.collection
    }

    /// Time between polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Debounce delay.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Update log capacity.
    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Most updates submitted in one round.
    pub fn max_batch(&self) -> usize {
        self.max_batch
    }
}

#[derive(Debug)]
struct SessionInner {
    base: CardSetState,
    working: CardSetState,
    log: UpdateLog,
    halted: Option<String>,
}

impl SessionInner {
    fn ensure_running(&self) -> Result<(), ClientError> {
        match &self.halted {
            Some(reason) => Err(ClientError::Halted(reason.clone())),
            None => Ok(()),
        }
    }

    /// Check an update against the working snapshot, then log and apply it.
    fn queue(&mut self, update: StateUpdate) -> Result<CardSetState, ClientError> {
        self.ensure_running()?;
        apply(self.working.clone(), &update)?;
        debug!(update = %update.id, op = update.op.kind(), "queued update");
        self.log.append(update)?;

        let working = rederive(&self.base, self.log.updates());
        self.working = working.clone();
        Ok(working)
    }
}

/// A client session on one card set.
///
/// Edits are applied to the working snapshot immediately and queued in the
/// update log; [`sync_round`](Self::sync_round) submits the queue and merges
/// the store's answer.
pub struct CardSetSession<T: Transport> {
    config: SessionConfig,
    transport: T,
    inner: Mutex<SessionInner>,
}

impl<T: Transport> CardSetSession<T> {
    /// Create a session starting from an empty card set.
    ///
    /// The first round pulls the stored snapshot; until then the working
    /// snapshot is the default empty set every replica starts from.
    pub fn new(config: SessionConfig, transport: T) -> Self {
        let base = CardSetState::new(config.collection.clone());
        info!(collection = %config.collection, "session created");
        Self {
            inner: Mutex::new(SessionInner {
                working: base.clone(),
                base,
                log: UpdateLog::new(config.log_capacity),
                halted: None,
            }),
            config,
            transport,
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The snapshot the application should render.
    pub async fn working(&self) -> CardSetState {
        self.inner.lock().await.working.clone()
    }

    /// The last snapshot agreed with the store.
    pub async fn base(&self) -> CardSetState {
        self.inner.lock().await.base.clone()
    }

    /// Number of updates not yet acknowledged by the store.
    pub async fn pending_updates(&self) -> usize {
        self.inner.lock().await.log.len()
    }

    /// Why the session halted, if it did.
    pub async fn halted(&self) -> Option<String> {
        self.inner.lock().await.halted.clone()
    }

    /// Apply an update locally and queue it for the store.
    ///
    /// The update is checked against the working snapshot first; an update
    /// that does not apply is refused and never queued.
    pub async fn submit(&self, update: StateUpdate) -> Result<CardSetState, ClientError> {
        self.inner.lock().await.queue(update)
    }

    /// Build an update from the working snapshot and queue it.
    ///
    /// `build` runs under the same lock that applies its update, so no other
    /// edit lands between reading the snapshot and applying the result. An
    /// error from `build` queues nothing.
    pub async fn submit_with(&self, build: EditBuilder) -> Result<CardSetState, ClientError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_running()?;
        let update = build(&inner.working)?;
        inner.queue(update)
    }

    /// Run one sync round.
    ///
    /// Submits the oldest unacknowledged updates, at most
    /// [`SessionConfig::max_batch`] of them (an empty batch is a plain
    /// fetch), merges the store's snapshot with the local side and returns
    /// the new working snapshot. Updates past the batch limit stay queued for
    /// the next round. A transport failure returns the batch to the queue; an
    /// invalid merge halts the session.
    pub async fn sync_round(&self) -> Result<CardSetState, ClientError> {
        let batch = {
            let mut inner = self.inner.lock().await;
            inner.ensure_running()?;
            inner.log.begin_round(self.config.max_batch)
        };
        debug!(
            collection = %self.config.collection,
            updates = batch.len(),
            "starting sync round"
        );

        let request = Request::Submit {
            collection: self.config.collection.clone(),
            updates: batch.clone(),
        };
        let remote = match self.exchange(&request).await.and_then(expect_snapshot) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "sync round failed, updates requeued");
                self.inner.lock().await.log.nack_all();
                return Err(e);
            }
        };

        let mut inner = self.inner.lock().await;
        inner.log.ack(batch.iter().map(|update| &update.id));

        if let Err(e) = validate(&remote) {
            return Err(halt(&mut inner, format!("store snapshot is invalid: {e}")));
        }

        let local = rederive(&inner.base, batch.iter());
        let merged = match merge(&inner.base, &remote, &local) {
            Ok(merged) => merged,
            Err(e) => return Err(halt(&mut inner, e.to_string())),
        };

        let working = rederive(&merged, inner.log.updates());
        inner.base = merged;
        inner.working = working.clone();
        debug!(
            cards = working.cards.len(),
            pending = inner.log.len(),
            "sync round merged"
        );
        Ok(working)
    }

    /// List every card set the store holds.
    pub async fn list_card_sets(&self) -> Result<Vec<CardSetSummary>, ClientError> {
        match self.exchange(&Request::ListCardSets).await? {
            Response::CardSets { sets } => Ok(sets),
            Response::Error { message, .. } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::Protocol(
                "unexpected response to list request".into(),
            )),
        }
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn exchange(&self, request: &Request) -> Result<Response, ClientError> {
        let bytes = request
            .to_bytes()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        let response_bytes = self.transport.request(&bytes).await?;
        Response::from_bytes(&response_bytes).map_err(|e| ClientError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl<T: Transport> CardSetEditor for CardSetSession<T> {
    async fn submit(&self, update: StateUpdate) -> Result<CardSetState, ClientError> {
        CardSetSession::submit(self, update).await
    }

    async fn submit_with(&self, build: EditBuilder) -> Result<CardSetState, ClientError> {
        CardSetSession::submit_with(self, build).await
    }

    async fn snapshot(&self) -> CardSetState {
        self.working().await
    }
}

fn expect_snapshot(response: Response) -> Result<CardSetState, ClientError> {
    match response {
        Response::Snapshot {
            status: Status::Ok,
            snapshot: Some(state),
        } => Ok(state),
        Response::Snapshot { .. } => Err(ClientError::Protocol(
            "snapshot response without a snapshot".into(),
        )),
        Response::Error { message, .. } => Err(ClientError::Rejected(message)),
        Response::CardSets { .. } => Err(ClientError::Protocol(
            "unexpected response to submit".into(),
        )),
    }
}

fn halt(inner: &mut SessionInner, reason: String) -> ClientError {
    error!(reason = %reason, "session halted");
    inner.halted = Some(reason.clone());
    ClientError::Halted(reason)
}

/// Replay updates over `base`, skipping any that no longer apply.
///
/// A queued update can stop applying once the branchpoint moves (its target
/// hand was deleted remotely, say). It stays queued; the store decides.
fn rederive<'a>(
    base: &CardSetState,
    updates: impl IntoIterator<Item = &'a StateUpdate>,
) -> CardSetState {
    let mut state = base.clone();
    for update in updates {
        if let Err(e) = apply_in_place(&mut state, update) {
            debug!(update = %update.id, error = %e, "queued update no longer applies");
        }
    }
    state
}
