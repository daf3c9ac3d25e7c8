//! Store-backed list of network ranges
//!
//! The store is the source of truth. The list keeps a cached copy that is
//! filled on first access and replaced by a fresh scan after every write, so
//! what callers read is always what the store held after the last write.

use greyspf_common::{Error, NetworkRange, Result};
use greyspf_storage::{WhitelistEntry, WhitelistStore};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

enum CacheState {
    Unloaded,
    Loaded(Vec<NetworkRange>),
}

/// Ordered, mutable list of network ranges persisted in one store collection.
///
/// Every operation takes `&mut self` because any of them may load the cache.
/// Mutations write every cached range to the store, delete the range they
/// dropped, then rescan. On first load, default ranges missing from the store
/// are written once; later reloads never seed again.
pub struct NetworkRangeList {
    store: Arc<dyn WhitelistStore>,
    collection: String,
    defaults: Option<Vec<NetworkRange>>,
    cache: CacheState,
}

impl NetworkRangeList {
    /// Create an unloaded list. Nothing touches the store until first access.
    pub fn new(
        store: Arc<dyn WhitelistStore>,
        collection: impl Into<String>,
        defaults: Option<Vec<NetworkRange>>,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            defaults,
            cache: CacheState::Unloaded,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cache, CacheState::Loaded(_))
    }

    pub async fn len(&mut self) -> Result<usize> {
        Ok(self.ensure_loaded().await?.len())
    }

    pub async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.ensure_loaded().await?.is_empty())
    }

    pub async fn get(&mut self, index: usize) -> Result<Option<NetworkRange>> {
        Ok(self.ensure_loaded().await?.get(index).copied())
    }

    pub async fn contains(&mut self, range: &NetworkRange) -> Result<bool> {
        Ok(self.ensure_loaded().await?.contains(range))
    }

    /// Whether any range in the list covers `addr`
    pub async fn matches(&mut self, addr: &IpAddr) -> Result<bool> {
        Ok(self
            .ensure_loaded()
            .await?
            .iter()
            .any(|range| range.contains(addr)))
    }

    /// Cached ranges in store order
    pub async fn ranges(&mut self) -> Result<&[NetworkRange]> {
        Ok(self.ensure_loaded().await?.as_slice())
    }

    pub async fn iter(&mut self) -> Result<std::slice::Iter<'_, NetworkRange>> {
        Ok(self.ensure_loaded().await?.iter())
    }

    /// Replace the range at `index`, returning the previous one
    pub async fn set(&mut self, index: usize, range: NetworkRange) -> Result<NetworkRange> {
        let ranges = self.ensure_loaded().await?;
        let len = ranges.len();
        let slot = ranges
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        let previous = std::mem::replace(slot, range);
        let stale = (!ranges.contains(&previous)).then_some(previous);

        self.write_through(stale).await?;
        Ok(previous)
    }

    /// Insert a range before `index`; `index == len` appends
    pub async fn insert(&mut self, index: usize, range: NetworkRange) -> Result<()> {
        let ranges = self.ensure_loaded().await?;
        let len = ranges.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        ranges.insert(index, range);

        self.write_through(None).await
    }

    pub async fn push(&mut self, range: NetworkRange) -> Result<()> {
        let len = self.len().await?;
        self.insert(len, range).await
    }

    /// Remove the range at `index`, deleting it from the store
    pub async fn remove(&mut self, index: usize) -> Result<NetworkRange> {
        let ranges = self.ensure_loaded().await?;
        let len = ranges.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let removed = ranges.remove(index);
        let stale = (!ranges.contains(&removed)).then_some(removed);

        self.write_through(stale).await?;
        Ok(removed)
    }

    /// Remove a range by value. Returns whether it was present.
    pub async fn remove_range(&mut self, range: &NetworkRange) -> Result<bool> {
        let position = self.ensure_loaded().await?.iter().position(|r| r == range);
        match position {
            Some(index) => {
                self.remove(index).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace the cache with a fresh scan of the store.
    ///
    /// Before the first load this performs the first load, default seeding
    /// included. Afterwards it never seeds.
    pub async fn reload(&mut self) -> Result<()> {
        if self.is_loaded() {
            self.rescan().await
        } else {
            self.load().await
        }
    }

    /// Bracketed, comma-separated rendering of the current ranges
    pub async fn render(&mut self) -> Result<String> {
        self.ensure_loaded().await?;
        Ok(self.to_string())
    }

    async fn ensure_loaded(&mut self) -> Result<&mut Vec<NetworkRange>> {
        if !self.is_loaded() {
            self.load().await?;
        }
        match &mut self.cache {
            CacheState::Loaded(ranges) => Ok(ranges),
            CacheState::Unloaded => Err(Error::Internal(format!(
                "whitelist {} failed to load",
                self.collection
            ))),
        }
    }

    /// First load: scan, then write any missing defaults and scan again
    async fn load(&mut self) -> Result<()> {
        self.rescan().await?;
        if let Err(e) = self.seed_defaults().await {
            self.cache = CacheState::Unloaded;
            return Err(e);
        }
        Ok(())
    }

    async fn seed_defaults(&mut self) -> Result<()> {
        let Some(defaults) = &self.defaults else {
            return Ok(());
        };
        let CacheState::Loaded(cached) = &self.cache else {
            return Ok(());
        };

        let mut missing: Vec<NetworkRange> = Vec::new();
        for range in defaults {
            if !cached.contains(range) && !missing.contains(range) {
                missing.push(*range);
            }
        }

        if !missing.is_empty() {
            for range in &missing {
                self.store
                    .upsert(&self.collection, &WhitelistEntry::from(range))
                    .await?;
            }
            info!(
                collection = %self.collection,
                seeded = missing.len(),
                "Seeded default whitelist ranges"
            );
            self.rescan().await?;
        }

        self.defaults = None;
        Ok(())
    }

    async fn rescan(&mut self) -> Result<()> {
        let entries = self.store.scan(&self.collection).await?;
        let ranges = entries
            .iter()
            .map(WhitelistEntry::to_range)
            .collect::<Result<Vec<_>>>()?;

        debug!(collection = %self.collection, count = ranges.len(), "Loaded whitelist");
        self.cache = CacheState::Loaded(ranges);
        Ok(())
    }

    /// Persist the cache, drop `stale` from the store, then rescan.
    ///
    /// On failure the cache is discarded so the next access rescans instead
    /// of serving a list the store never accepted.
    async fn write_through(&mut self, stale: Option<NetworkRange>) -> Result<()> {
        let result = self.persist(stale).await;
        if let Err(e) = &result {
            warn!(collection = %self.collection, error = %e, "Whitelist write failed");
            self.cache = CacheState::Unloaded;
            return result;
        }
        self.rescan().await
    }

    async fn persist(&self, stale: Option<NetworkRange>) -> Result<()> {
        let CacheState::Loaded(ranges) = &self.cache else {
            return Ok(());
        };

        for range in ranges {
            self.store
                .upsert(&self.collection, &WhitelistEntry::from(range))
                .await?;
        }
        if let Some(range) = stale {
            self.store
                .delete(&self.collection, &WhitelistEntry::from(&range))
                .await?;
        }
        Ok(())
    }
}

impl fmt::Display for NetworkRangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cache {
            CacheState::Unloaded => write!(f, "[<not loaded>]"),
            CacheState::Loaded(ranges) => {
                let joined: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", joined.join(", "))
            }
        }
    }
}

impl fmt::Debug for NetworkRangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkRangeList")
            .field("collection", &self.collection)
            .field("ranges", &self.to_string())
            .finish()
    }
}
