//! Storage layer for sync-relay.
//!
//! One document per card set, looked up and replaced by collection id.
//! Writes replace the whole document (last write wins at document level);
//! the service serializes writers per collection.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StorageError;
use async_trait::async_trait;
use sync_core::AppliedLedger;
use sync_types::{CardSetState, CardSetSummary, CollectionId};

/// Version of the document layout written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// A stored card set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Key of the document.
    pub collection: CollectionId,
    /// Layout version of `state` and `applied`.
    pub schema_version: u32,
    /// The authoritative snapshot.
    pub state: CardSetState,
    /// Ids of recently applied updates.
    pub applied: AppliedLedger,
}

impl StoredDocument {
    /// A fresh document holding the default empty card set.
    pub fn new(collection: CollectionId, ledger_capacity: usize) -> Self {
        Self {
            state: CardSetState::new(collection.clone()),
            collection,
            schema_version: SCHEMA_VERSION,
            applied: AppliedLedger::new(ledger_capacity),
        }
    }
}

/// Trait for document storage backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the document for a card set.
    ///
    /// Returns `None` if the card set was never written.
    async fn find(&self, collection: &CollectionId) -> Result<Option<StoredDocument>, StorageError>;

    /// Insert or replace the document for its card set.
    async fn upsert(&self, document: &StoredDocument) -> Result<(), StorageError>;

    /// `{id, name}` of every stored card set, ordered by id.
    async fn list(&self) -> Result<Vec<CardSetSummary>, StorageError>;
}
