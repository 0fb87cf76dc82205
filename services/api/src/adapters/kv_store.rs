//! services/api/src/adapters/kv_store.rs
//!
//! Concrete implementations of the `KeyValueStore` port: a SQLite-backed
//! table for durable storage, and an in-process map for tests and for running
//! without a database file.

use async_trait::async_trait;
use chrono::Utc;
use progress_journal_core::ports::{KeyValueStore, PortError, PortResult};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::RwLock;

//=========================================================================================
// SQLite Adapter
//=========================================================================================

/// A key-value adapter over the `kv_store` table.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Creates a new `SqliteKvStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

//=========================================================================================
// In-Memory Adapter
//=========================================================================================

/// Keeps values for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryKvStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.values.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_store() -> SqliteKvStore {
        // One connection, otherwise every connection sees its own empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteKvStore::new(pool);
        store.run_migrations().await.unwrap();
        store
    }

    async fn exercise(store: &dyn KeyValueStore) {
        assert_eq!(store.get("photos").await.unwrap(), None);

        store.set("photos", "[1]").await.unwrap();
        assert_eq!(store.get("photos").await.unwrap().as_deref(), Some("[1]"));

        store.set("photos", "[1,2]").await.unwrap();
        assert_eq!(store.get("photos").await.unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(store.get("other").await.unwrap(), None);

        store.remove("photos").await.unwrap();
        assert_eq!(store.get("photos").await.unwrap(), None);
        store.remove("photos").await.unwrap();
    }

    #[tokio::test]
    async fn sqlite_store_overwrites_and_removes() {
        let store = sqlite_store().await;
        exercise(&store).await;
    }

    #[tokio::test]
    async fn memory_store_overwrites_and_removes() {
        exercise(&MemoryKvStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_migrations_are_idempotent() {
        let store = sqlite_store().await;
        store.run_migrations().await.unwrap();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
