//! SQLite storage backend for sync-relay.

use super::{DocumentStore, StoredDocument, SCHEMA_VERSION};
use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use sync_core::validate;
use sync_types::{CardSetSummary, CollectionId};

/// SQLite-based document storage.
///
/// Uses WAL mode for concurrent reads/writes. Snapshots and ledgers are
/// stored as JSON text.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // Every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS card_sets (
                collection TEXT PRIMARY KEY,
                schema_version INTEGER NOT NULL,
                name TEXT NOT NULL,
                state TEXT NOT NULL,
                applied TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(
        &self,
        collection: &CollectionId,
    ) -> Result<Option<StoredDocument>, StorageError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT collection, schema_version, state, applied
            FROM card_sets
            WHERE collection = ?1
            "#,
        )
        .bind(collection.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, document: &StoredDocument) -> Result<(), StorageError> {
        let state = serde_json::to_string(&document.state)?;
        let applied = serde_json::to_string(&document.applied)?;

        sqlx::query(
            r#"
            INSERT INTO card_sets (collection, schema_version, name, state, applied)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(collection) DO UPDATE SET
                schema_version = excluded.schema_version,
                name = excluded.name,
                state = excluded.state,
                applied = excluded.applied,
                updated_at = strftime('%s', 'now')
            "#,
        )
        .bind(document.collection.as_str())
        .bind(i64::from(document.schema_version))
        .bind(&document.state.name)
        .bind(state)
        .bind(applied)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<CardSetSummary>, StorageError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT collection, name FROM card_sets ORDER BY collection ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| CardSetSummary {
                id: CollectionId::from(row.collection),
                name: row.name,
            })
            .collect())
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    collection: String,
    schema_version: i64,
    state: String,
    applied: String,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    collection: String,
    name: String,
}

impl TryFrom<DocumentRow> for StoredDocument {
    type Error = StorageError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        if row.schema_version != i64::from(SCHEMA_VERSION) {
            return Err(StorageError::UnsupportedSchema {
                collection: row.collection,
                version: row.schema_version,
            });
        }

        let state: sync_types::CardSetState = serde_json::from_str(&row.state)?;
        let applied = serde_json::from_str(&row.applied)?;

        if state.id.as_str() != row.collection {
            return Err(StorageError::Corrupt {
                reason: format!("snapshot belongs to {}", state.id),
                collection: row.collection,
            });
        }
        if let Err(e) = validate(&state) {
            return Err(StorageError::Corrupt {
                collection: row.collection,
                reason: e.to_string(),
            });
        }

        Ok(StoredDocument {
            collection: state.id.clone(),
            schema_version: SCHEMA_VERSION,
            state,
            applied,
        })
    }
}
