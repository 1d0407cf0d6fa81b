//! Main CardSetRelay coordination.
//!
//! CardSetRelay owns the document store and answers client requests:
//! submits are applied through the applied-update ledger, fetches read the
//! stored snapshot, and listings summarize every card set.
//!
//! Read-modify-write of one card set is serialized by a per-collection async
//! lock; different card sets proceed in parallel. A lock lives in the map only
//! while some submit holds or waits for it.

use crate::config::Config;
use crate::error::{ProtocolError, RelayError};
use crate::storage::{DocumentStore, StoredDocument};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sync_core::validate;
use sync_types::{CardSetState, CardSetSummary, CollectionId, Request, Response, StateUpdate};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Incrementing takes no lock.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total submit requests handled successfully.
    pub submits_total: AtomicU64,
    /// Total fetch requests handled successfully.
    pub fetches_total: AtomicU64,
    /// Total list requests handled successfully.
    pub lists_total: AtomicU64,
    /// Updates applied to a card set.
    pub updates_applied: AtomicU64,
    /// Updates skipped because their id was already applied.
    pub updates_skipped: AtomicU64,
    /// Updates the reducer refused.
    pub updates_rejected: AtomicU64,
    /// Total failed requests (undecodable, over limit, storage errors).
    pub errors_total: AtomicU64,
}

/// Main relay server.
pub struct CardSetRelay {
    config: Config,
    store: Arc<dyn DocumentStore>,
    /// Operational metrics (counters, gauges).
    metrics: RelayMetrics,
    /// Write lock per card set with a submit in progress.
    locks: DashMap<CollectionId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for CardSetRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardSetRelay")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("active_collections", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl CardSetRelay {
    /// Create a new CardSetRelay with the given config and store.
    pub fn new(config: Config, store: impl DocumentStore + 'static) -> Self {
        Self {
            config,
            store: Arc::new(store),
            metrics: RelayMetrics::default(),
            locks: DashMap::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Get the document store.
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Number of card sets with a submit in progress.
    pub fn active_collections(&self) -> usize {
        self.locks.len()
    }

    /// Decode a request, handle it, and encode the response.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let request = match Request::from_bytes(bytes) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "undecodable request");
                return Err(e.into());
            }
        };
        let response = self.handle(request).await;
        Ok(response.to_bytes()?)
    }

    /// Handle one request. Failures become [`Response::Error`].
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Submit {
                collection,
                updates,
            } => match self.submit(&collection, &updates).await {
                Ok(state) => {
                    self.metrics.submits_total.fetch_add(1, Ordering::Relaxed);
                    Response::snapshot(state)
                }
                Err(e) => self.failure(e),
            },
            Request::Fetch { collection } => match self.fetch(&collection).await {
                Ok(state) => {
                    self.metrics.fetches_total.fetch_add(1, Ordering::Relaxed);
                    Response::snapshot(state)
                }
                Err(e) => self.failure(e),
            },
            Request::ListCardSets => match self.list().await {
                Ok(sets) => {
                    self.metrics.lists_total.fetch_add(1, Ordering::Relaxed);
                    Response::CardSets { sets }
                }
                Err(e) => self.failure(e),
            },
        }
    }

    /// Apply a batch to a card set and return the stored snapshot.
    ///
    /// Updates whose id was already applied are skipped; updates the reducer
    /// refuses are recorded as seen and skipped. The card set is created
    /// on first reference.
    pub async fn submit(
        &self,
        collection: &CollectionId,
        updates: &[StateUpdate],
    ) -> Result<CardSetState, RelayError> {
        check_collection(collection)?;
        let limit = self.config.limits.max_batch_size;
        if updates.len() > limit {
            return Err(ProtocolError::BatchTooLarge {
                size: updates.len(),
                limit,
            }
            .into());
        }

        let lock = self.lock_for(collection);
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(collection, updates).await
        };
        drop(lock);
        self.release(collection);
        result
    }

    async fn apply_locked(
        &self,
        collection: &CollectionId,
        updates: &[StateUpdate],
    ) -> Result<CardSetState, RelayError> {
        let (mut document, created) = match self.store.find(collection).await? {
            Some(document) => (document, false),
            None => {
                info!(collection = %collection, "creating card set");
                let capacity = self.config.storage.ledger_capacity;
                (StoredDocument::new(collection.clone(), capacity), true)
            }
        };

        let mut state = document.state.clone();
        let outcome = document.applied.apply_batch(&mut state, updates);
        for (id, error) in &outcome.rejected {
            warn!(collection = %collection, update = %id, error = %error, "update refused");
        }
        validate(&state)?;

        self.metrics
            .updates_applied
            .fetch_add(outcome.applied as u64, Ordering::Relaxed);
        self.metrics
            .updates_skipped
            .fetch_add(outcome.skipped as u64, Ordering::Relaxed);
        self.metrics
            .updates_rejected
            .fetch_add(outcome.rejected.len() as u64, Ordering::Relaxed);

        if created || outcome.applied > 0 || !outcome.rejected.is_empty() {
            document.state = state;
            self.store.upsert(&document).await?;
        }

        debug!(
            collection = %collection,
            applied = outcome.applied,
            skipped = outcome.skipped,
            rejected = outcome.rejected.len(),
            "batch handled"
        );
        Ok(document.state)
    }

    /// The stored snapshot, or the default empty set if none exists yet.
    ///
    /// Never writes.
    pub async fn fetch(&self, collection: &CollectionId) -> Result<CardSetState, RelayError> {
        check_collection(collection)?;
        let state = match self.store.find(collection).await? {
            Some(document) => document.state,
            None => CardSetState::new(collection.clone()),
        };
        Ok(state)
    }

    /// Summaries of every stored card set.
    pub async fn list(&self) -> Result<Vec<CardSetSummary>, RelayError> {
        Ok(self.store.list().await?)
    }

    fn lock_for(&self, collection: &CollectionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(collection.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the collection's lock unless another submit still holds a clone.
    fn release(&self, collection: &CollectionId) {
        self.locks
            .remove_if(collection, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn failure(&self, error: RelayError) -> Response {
        self.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "request failed");
        Response::error(error.to_string())
    }
}

fn check_collection(collection: &CollectionId) -> Result<(), ProtocolError> {
    if collection.as_str().trim().is_empty() {
        return Err(ProtocolError::InvalidCollection {
            reason: "collection id is empty".into(),
        });
    }
    Ok(())
}
