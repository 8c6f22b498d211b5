//! Authoritative record map mirrored to a durable backend.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::{DurableStore, RecordMap, StoreError};
use super::types::{CacheRecord, FlushOutcome};
use crate::coord::CoordinateKey;
use crate::extract::AddressResult;

/// Durable tier.
///
/// The record map is the source of truth inside the process; the backend
/// only sees it as a whole on [`load`](Self::load) and [`flush`](Self::flush).
/// The map lock is synchronous and never held across an await.
///
/// A flush never writes a map that has not been merged with the backend's
/// current contents: until a read succeeds (no load yet, a failed load, or
/// a write conflict) the flush reads and merges first, local records
/// winning.
pub struct DurableTier {
    records: RwLock<HashMap<String, CacheRecord>>,
    dirty: AtomicBool,
    synced: AtomicBool,
    flush_lock: Mutex<()>,
    backend: Arc<dyn DurableStore>,
}

impl DurableTier {
    pub fn new(backend: Arc<dyn DurableStore>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
            backend,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Merges the backend's contents into the map; returns the record count.
    ///
    /// Records whose key does not parse are skipped. Entries put before the
    /// load finished win over loaded ones.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let loaded = self.backend.read_all().await?;
        let count = self.merge(loaded);
        self.synced.store(true, Ordering::SeqCst);
        Ok(count)
    }

    fn merge(&self, loaded: RecordMap) -> usize {
        let mut records = self.records.write();
        for (key, record) in loaded {
            if CoordinateKey::from_str(&key).is_err() {
                warn!(key = %key, "Skipping persisted record with malformed key");
                continue;
            }
            records.entry(key).or_insert(record);
        }
        records.len()
    }

    /// True once the map has been merged with the backend.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &CoordinateKey) -> Option<AddressResult> {
        self.records.read().get(key.as_str()).map(CacheRecord::to_result)
    }

    /// Adds or replaces a record and marks the tier dirty.
    pub fn put(&self, key: &CoordinateKey, value: &AddressResult) {
        let record = CacheRecord::from_result(value, Utc::now());
        self.records.write().insert(key.as_str().to_string(), record);
        // Set after the insert so a concurrent flush that clears the flag
        // has either seen the record or leaves the flag set.
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Forces the next flush to write.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn snapshot(&self) -> RecordMap {
        self.records.read().clone()
    }

    /// Writes the full map if anything changed since the last write.
    ///
    /// Only one flush runs at a time. On failure the dirty flag is restored
    /// so the next flush retries.
    pub async fn flush(&self) -> Result<FlushOutcome, StoreError> {
        let _guard = self.flush_lock.lock().await;

        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(FlushOutcome::Clean);
        }

        if !self.is_synced() {
            debug!(backend = self.backend_name(), "Merging backend contents before write");
            if let Err(e) = self.load().await {
                self.dirty.store(true, Ordering::SeqCst);
                return Err(e);
            }
        }

        let snapshot = self.snapshot();
        match self.backend.write_all(&snapshot).await {
            Ok(()) => Ok(FlushOutcome::Written {
                records: snapshot.len(),
            }),
            Err(e) => {
                if matches!(e, StoreError::Conflict(_)) {
                    // Someone else wrote; pick up their records next time
                    self.synced.store(false, Ordering::SeqCst);
                }
                self.dirty.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}
