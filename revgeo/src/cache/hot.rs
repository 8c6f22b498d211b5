//! In-memory hot tier using moka.
//!
//! moka bounds the entry count and evicts on its own time-to-live. Expiry
//! is also checked against the entry's `stored_at` on every read, so an
//! entry is never served past its TTL even before moka's maintenance runs.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use moka::ops::compute::Op;

use super::types::CacheEntry;
use crate::coord::CoordinateKey;
use crate::extract::AddressResult;

pub struct HotTier {
    cache: MokaCache<CoordinateKey, Arc<CacheEntry>>,
    ttl: Duration,
}

impl HotTier {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the live entry for `key`, dropping it if expired.
    pub async fn get(&self, key: &CoordinateKey) -> Option<Arc<CacheEntry>> {
        let entry = self.cache.get(key).await?;
        if entry.is_expired() {
            self.remove_if_current(key, &entry).await;
            return None;
        }
        Some(entry)
    }

    /// Removes `key` only while it still maps to `stale`; a replacement
    /// inserted in the meantime is kept.
    async fn remove_if_current(&self, key: &CoordinateKey, stale: &Arc<CacheEntry>) {
        let _ = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if Arc::ptr_eq(entry.value(), stale) => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
    }

    /// Stores a fresh entry, replacing any previous one.
    pub async fn insert(&self, key: CoordinateKey, value: Arc<AddressResult>, dirty: bool) {
        let entry = Arc::new(CacheEntry::new(key.clone(), value, self.ttl, dirty));
        self.cache.insert(key, entry).await;
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
