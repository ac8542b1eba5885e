// Keyed-document persistence - isolates all database side effects
use async_trait::async_trait;
use rusqlite::params;
use thiserror::Error;

use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Whole-document reads and writes under a well-known key.
///
/// The post collection and the cover-image mapping are each one document.
/// A write fully replaces the document or fails without touching it; there
/// is no partial update at this layer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, DocumentError>;
    async fn write(&self, key: &str, value: &str) -> Result<(), DocumentError>;
}

/// SQLite implementation
pub struct SqliteDocumentStore {
    pool: DbPool,
}

impl SqliteDocumentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn read(&self, key: &str) -> Result<Option<String>, DocumentError> {
        let conn = self.pool.get()?;

        let result: Result<String, rusqlite::Error> = conn.query_row(
            "SELECT value FROM documents WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), DocumentError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO documents (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value],
        )?;

        Ok(())
    }
}
