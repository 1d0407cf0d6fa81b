//! # sync-relay
//!
//! Reference store for cardset-sync.
//!
//! This crate implements the remote store that client sessions sync with:
//! - Keeps one authoritative document per card set (SQLite)
//! - Applies submitted batches exactly once per update id
//! - Serializes writers per card set
//! - Returns the stored snapshot after every submit or fetch
//!
//! ## Architecture
//!
//! ```text
//! Session A ──┐                     ┌── Session B
//!             │   POST /rpc         │
//!             ├────────────────────►│
//!             │                     │
//!         ┌───┴─────────────────────┴───┐
//!         │         sync-relay          │
//!         │  ┌───────────────────────┐  │
//!         │  │ SQLite (card sets +   │  │
//!         │  │ applied-update ids)   │  │
//!         │  └───────────────────────┘  │
//!         └─────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! Each request is one MessagePack frame:
//! - SUBMIT → SNAPSHOT (apply batch, return stored state)
//! - FETCH → SNAPSHOT (read only)
//! - LIST_CARD_SETS → CARD_SETS

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{ProtocolError, RelayError, StorageError};
pub use server::{CardSetRelay, RelayMetrics};
pub use storage::{DocumentStore, SqliteStore, StoredDocument, SCHEMA_VERSION};
