//! Whitelist repository
//!
//! A whitelist collection is a named set of [`WhitelistEntry`] documents.
//! Every write is an upsert keyed by the whole entry, so writing a range that
//! is already present is a no-op and concurrent writers converge.

use crate::db::DatabasePool;
use crate::models::WhitelistEntry;
use async_trait::async_trait;
use greyspf_common::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Whitelist repository trait
#[async_trait]
pub trait WhitelistStore: Send + Sync {
    /// Every entry of the collection, in store order
    async fn scan(&self, collection: &str) -> Result<Vec<WhitelistEntry>>;

    /// Insert the entry unless an identical one exists
    async fn upsert(&self, collection: &str, entry: &WhitelistEntry) -> Result<()>;

    /// Delete the entry with the same key, if any
    async fn delete(&self, collection: &str, entry: &WhitelistEntry) -> Result<()>;

    /// Make sure the store rejects duplicate entries in the collection
    async fn ensure_unique(&self, collection: &str) -> Result<()>;
}

/// Database whitelist repository
pub struct DbWhitelistRepository {
    pool: DatabasePool,
}

impl DbWhitelistRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WhitelistStore for DbWhitelistRepository {
    async fn scan(&self, collection: &str) -> Result<Vec<WhitelistEntry>> {
        sqlx::query_as::<_, WhitelistEntry>(
            "SELECT family, network, prefix_len FROM whitelist_ranges WHERE collection = $1 ORDER BY id ASC",
        )
        .bind(collection)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn upsert(&self, collection: &str, entry: &WhitelistEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO whitelist_ranges (collection, family, network, prefix_len)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, family, network, prefix_len) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(entry.family)
        .bind(&entry.network)
        .bind(entry.prefix_len)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, collection: &str, entry: &WhitelistEntry) -> Result<()> {
        sqlx::query(
            "DELETE FROM whitelist_ranges WHERE collection = $1 AND family = $2 AND network = $3 AND prefix_len = $4",
        )
        .bind(collection)
        .bind(entry.family)
        .bind(&entry.network)
        .bind(entry.prefix_len)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn ensure_unique(&self, collection: &str) -> Result<()> {
        // One index covers every collection; it is keyed on the collection name.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS whitelist_ranges_key ON whitelist_ranges (collection, family, network, prefix_len)",
        )
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!(collection, "Whitelist uniqueness constraint in place");
        Ok(())
    }
}

/// In-process whitelist store.
///
/// Keeps collections in memory with the same upsert/delete semantics as the
/// database repository. Used for tests and for running without a database.
#[derive(Default)]
pub struct InMemoryWhitelistStore {
    collections: RwLock<HashMap<String, Vec<WhitelistEntry>>>,
}

impl InMemoryWhitelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl WhitelistStore for InMemoryWhitelistStore {
    async fn scan(&self, collection: &str) -> Result<Vec<WhitelistEntry>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert(&self, collection: &str, entry: &WhitelistEntry) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        if !entries.contains(entry) {
            entries.push(entry.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, entry: &WhitelistEntry) -> Result<()> {
        if let Some(entries) = self.collections.write().await.get_mut(collection) {
            entries.retain(|e| e != entry);
        }
        Ok(())
    }

    async fn ensure_unique(&self, _collection: &str) -> Result<()> {
        Ok(())
    }
}
