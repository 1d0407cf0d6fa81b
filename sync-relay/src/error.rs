//! Error types for sync-relay.

use std::path::PathBuf;

/// Main error type for sync-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A batch left the card set in an invalid state; nothing was written.
    #[error("batch rejected: {0}")]
    Invariant(#[from] sync_core::InvariantError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document (de)serialization failed.
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Stored document was written by an unknown schema.
    #[error("unsupported schema version {version} for card set {collection}")]
    UnsupportedSchema {
        /// The card set.
        collection: String,
        /// Version found in the row.
        version: i64,
    },

    /// Stored document breaks the card set invariant.
    #[error("stored card set {collection} is corrupt: {reason}")]
    Corrupt {
        /// The card set.
        collection: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Protocol layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Request or response could not be (de)coded.
    #[error("codec error: {0}")]
    Codec(#[from] sync_types::SyncError),

    /// Submit carries more updates than allowed.
    #[error("batch too large: {size} updates (limit: {limit})")]
    BatchTooLarge {
        /// Number of updates submitted.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The request names no usable card set.
    #[error("invalid collection id: {reason}")]
    InvalidCollection {
        /// Why the id is refused.
        reason: String,
    },
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
