//! Two-tier cache store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::durable::DurableTier;
use super::hot::HotTier;
use super::store::{DurableStore, RecordMap};
use super::types::{CacheConfig, CacheError, CacheStats, FlushOutcome};
use crate::coord::CoordinateKey;
use crate::extract::AddressResult;

/// Hot tier in front of a durable tier.
///
/// Reads try the hot tier, then the durable map (promoting hits). Writes go
/// to both at once; the backend only sees them on the next flush.
///
/// # Example
///
/// ```
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// use std::sync::Arc;
/// use revgeo::cache::{CacheConfig, CacheStore, FlushOutcome, MemoryStore};
/// use revgeo::coord::CoordinateKey;
/// use revgeo::extract::AddressResult;
///
/// let backend = Arc::new(MemoryStore::new());
/// let store = CacheStore::new(CacheConfig::default(), backend.clone());
///
/// let key = CoordinateKey::new(10.762622, 106.660172).unwrap();
/// store.put(key.clone(), Arc::new(AddressResult::default())).await;
/// assert!(store.get(&key).await.is_some());
/// assert!(matches!(store.flush().await.unwrap(), FlushOutcome::Written { records: 1 }));
/// # });
/// ```
pub struct CacheStore {
    hot: HotTier,
    durable: DurableTier,
    hot_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
}

impl CacheStore {
    pub fn new(config: CacheConfig, backend: Arc<dyn DurableStore>) -> Self {
        Self {
            hot: HotTier::new(config.hot_capacity, config.hot_ttl),
            durable: DurableTier::new(backend),
            hot_hits: AtomicU64::new(0),
            durable_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
        }
    }

    /// Loads the durable map from the backend.
    pub async fn load(&self) -> Result<usize, CacheError> {
        let records = self.durable.load().await?;
        info!(
            backend = self.durable.backend_name(),
            records, "Cache loaded"
        );
        Ok(records)
    }

    pub async fn get(&self, key: &CoordinateKey) -> Option<Arc<AddressResult>> {
        self.lookup(key, true).await
    }

    /// Same as [`get`](Self::get) without touching the hit/miss counters.
    pub async fn peek(&self, key: &CoordinateKey) -> Option<Arc<AddressResult>> {
        self.lookup(key, false).await
    }

    async fn lookup(&self, key: &CoordinateKey, counted: bool) -> Option<Arc<AddressResult>> {
        let count = |counter: &AtomicU64| {
            if counted {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        };

        if let Some(entry) = self.hot.get(key).await {
            count(&self.hot_hits);
            trace!(key = %key, "Hot tier hit");
            return Some(Arc::clone(&entry.value));
        }

        match self.durable.get(key) {
            Some(result) => {
                count(&self.durable_hits);
                let value = Arc::new(result);
                // Promotion builds a fresh entry, restarting the hot TTL
                self.hot.insert(key.clone(), Arc::clone(&value), false).await;
                debug!(key = %key, "Durable tier hit, promoted");
                Some(value)
            }
            None => {
                count(&self.misses);
                trace!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Stores a result in both tiers and marks the store dirty.
    pub async fn put(&self, key: CoordinateKey, value: Arc<AddressResult>) {
        self.durable.put(&key, &value);
        self.hot.insert(key, value, true).await;
    }

    /// Persists the durable map if it changed.
    ///
    /// A failure leaves the store dirty and every cached entry in place.
    pub async fn flush(&self) -> Result<FlushOutcome, CacheError> {
        match self.durable.flush().await {
            Ok(outcome) => {
                if let FlushOutcome::Written { records } = outcome {
                    self.flushes.fetch_add(1, Ordering::Relaxed);
                    info!(
                        backend = self.durable.backend_name(),
                        records, "Cache flushed"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                self.flush_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    backend = self.durable.backend_name(),
                    error = %e,
                    "Cache flush failed, will retry"
                );
                Err(e.into())
            }
        }
    }

    /// Writes the whole durable map even when nothing changed.
    ///
    /// Rewriting after [`load`](Self::load) drops records the load skipped
    /// from the backend.
    pub async fn rewrite(&self) -> Result<FlushOutcome, CacheError> {
        self.durable.mark_dirty();
        self.flush().await
    }

    /// Copy of the durable map.
    pub fn snapshot(&self) -> RecordMap {
        self.durable.snapshot()
    }

    pub fn is_dirty(&self) -> bool {
        self.durable.is_dirty()
    }

    pub fn len(&self) -> usize {
        self.durable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durable.is_empty()
    }

    pub fn backend_name(&self) -> &str {
        self.durable.backend_name()
    }

    /// Drops every hot entry; the durable map is kept.
    pub async fn clear_hot(&self) {
        self.hot.clear().await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hot_hits: self.hot_hits.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            records: self.durable.len(),
            dirty: self.durable.is_dirty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use crate::cache::CacheRecord;
    use chrono::Utc;
    use std::time::Duration;

    fn key() -> CoordinateKey {
        CoordinateKey::new(10.762622, 106.660172).unwrap()
    }

    fn value(name: &str) -> Arc<AddressResult> {
        Arc::new(AddressResult {
            display_name: Some(name.to_string()),
            ..Default::default()
        })
    }

    fn store_with(backend: Arc<MemoryStore>, ttl: Duration) -> CacheStore {
        CacheStore::new(
            CacheConfig {
                hot_ttl: ttl,
                hot_capacity: 1_000,
            },
            backend,
        )
    }

    #[tokio::test]
    async fn test_put_then_get_returns_same_value() {
        let store = store_with(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let v = value("268 Ly Thuong Kiet");
        store.put(key(), Arc::clone(&v)).await;

        let got = store.get(&key()).await.unwrap();
        assert!(Arc::ptr_eq(&got, &v));
        assert_eq!(store.stats().hot_hits, 1);
        assert!(store.is_dirty());
    }

    #[tokio::test]
    async fn test_miss_counts() {
        let store = store_with(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        assert!(store.get(&key()).await.is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_peek_is_uncounted() {
        let store = store_with(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        assert!(store.peek(&key()).await.is_none());
        store.put(key(), value("a")).await;
        assert!(store.peek(&key()).await.is_some());

        let stats = store.stats();
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hot_hits, 0);
    }

    #[tokio::test]
    async fn test_expired_hot_entry_served_from_durable() {
        let store = store_with(Arc::new(MemoryStore::new()), Duration::from_millis(50));
        store.put(key(), value("a")).await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        let got = store.get(&key()).await.unwrap();
        assert_eq!(got.display_name.as_deref(), Some("a"));
        assert_eq!(store.stats().durable_hits, 1);

        // Promoted: next read is a hot hit
        store.get(&key()).await.unwrap();
        assert_eq!(store.stats().hot_hits, 1);
    }

    #[tokio::test]
    async fn test_flushed_entry_outlives_hot_ttl_across_restart() {
        let backend = Arc::new(MemoryStore::new());
        let first = store_with(backend.clone(), Duration::from_millis(50));
        first.put(key(), value("a")).await;
        first.flush().await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(first.get(&key()).await.unwrap().display_name.as_deref(), Some("a"));
        assert_eq!(first.stats().durable_hits, 1);
        drop(first);

        let second = store_with(backend, Duration::from_millis(50));
        assert_eq!(second.load().await.unwrap(), 1);
        second.get(&key()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let got = second.get(&key()).await.unwrap();
        assert_eq!(got.display_name.as_deref(), Some("a"));
        assert_eq!(second.stats().durable_hits, 2);
    }

    #[tokio::test]
    async fn test_failed_load_then_flush_keeps_persisted_records() {
        let persisted: RecordMap = (1..=3)
            .map(|n| {
                let k = CoordinateKey::new(n as f64, n as f64).unwrap();
                (
                    k.as_str().to_string(),
                    CacheRecord::from_result(&value("old"), Utc::now()),
                )
            })
            .collect();
        let backend = Arc::new(MemoryStore::with_records(persisted));
        let store = store_with(backend.clone(), Duration::from_secs(60));

        backend.set_available(false);
        assert!(store.load().await.is_err());
        store.put(key(), value("new")).await;
        // Still down: the flush must not write the partial map
        assert!(store.flush().await.is_err());
        assert_eq!(backend.write_count(), 0);

        backend.set_available(true);
        assert_eq!(
            store.flush().await.unwrap(),
            FlushOutcome::Written { records: 4 }
        );
        assert_eq!(backend.records().len(), 4);
        assert!(store
            .get(&CoordinateKey::new(2.0, 2.0).unwrap())
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_load_then_promote() {
        let persisted = RecordMap::from([(
            key().as_str().to_string(),
            CacheRecord::from_result(&value("persisted"), Utc::now()),
        )]);
        let store = store_with(
            Arc::new(MemoryStore::with_records(persisted)),
            Duration::from_secs(60),
        );

        assert_eq!(store.load().await.unwrap(), 1);
        assert!(!store.is_dirty());
        let got = store.get(&key()).await.unwrap();
        assert_eq!(got.display_name.as_deref(), Some("persisted"));
        assert_eq!(store.stats().durable_hits, 1);
    }

    #[tokio::test]
    async fn test_outage_keeps_serving_and_stays_dirty() {
        let backend = Arc::new(MemoryStore::new());
        let store = store_with(backend.clone(), Duration::from_secs(60));
        backend.set_available(false);

        store.put(key(), value("a")).await;
        assert!(matches!(
            store.flush().await,
            Err(CacheError::DurableUnavailable(_))
        ));
        assert!(store.is_dirty());
        assert!(store.get(&key()).await.is_some());

        let other = CoordinateKey::new(1.0, 1.0).unwrap();
        store.put(other.clone(), value("b")).await;
        assert!(store.get(&other).await.is_some());

        backend.set_available(true);
        assert_eq!(
            store.flush().await.unwrap(),
            FlushOutcome::Written { records: 2 }
        );
        assert!(!store.is_dirty());

        let stats = store.stats();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.flush_failures, 1);
    }

    #[tokio::test]
    async fn test_second_flush_is_clean() {
        let backend = Arc::new(MemoryStore::new());
        let store = store_with(backend.clone(), Duration::from_secs(60));
        store.put(key(), value("a")).await;

        store.flush().await.unwrap();
        assert_eq!(store.flush().await.unwrap(), FlushOutcome::Clean);
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_hot_keeps_durable() {
        let store = store_with(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        store.put(key(), value("a")).await;
        store.clear_hot().await;

        assert!(store.get(&key()).await.is_some());
        assert_eq!(store.stats().durable_hits, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_drops_malformed_records() {
        let mut persisted = RecordMap::new();
        persisted.insert(
            key().as_str().to_string(),
            CacheRecord::from_result(&value("a"), Utc::now()),
        );
        persisted.insert(
            "somewhere".to_string(),
            CacheRecord::from_result(&value("junk"), Utc::now()),
        );
        let backend = Arc::new(MemoryStore::with_records(persisted));
        let store = store_with(backend.clone(), Duration::from_secs(60));

        assert_eq!(store.load().await.unwrap(), 1);
        assert_eq!(store.flush().await.unwrap(), FlushOutcome::Clean);
        assert_eq!(
            store.rewrite().await.unwrap(),
            FlushOutcome::Written { records: 1 }
        );
        assert!(!backend.records().contains_key("somewhere"));
    }
}
