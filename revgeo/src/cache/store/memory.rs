//! In-process durable backend.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{DurableStore, RecordMap, StoreError};
use crate::provider::BoxFuture;

/// Keeps the "persisted" map in memory.
///
/// Can be switched unavailable to simulate a backend outage.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<RecordMap>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `records`.
    pub fn with_records(records: RecordMap) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Copy of the currently persisted map.
    pub fn records(&self) -> RecordMap {
        self.records.lock().clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unreachable("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl DurableStore for MemoryStore {
    fn read_all(&self) -> BoxFuture<'_, Result<RecordMap, StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.records.lock().clone())
        })
    }

    fn write_all<'a>(&'a self, records: &'a RecordMap) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_available()?;
            *self.records.lock() = records.clone();
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
