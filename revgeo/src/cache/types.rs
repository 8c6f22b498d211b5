//! Cache entries, persisted records, outcomes and errors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::store::StoreError;
use crate::coord::{CoordinateKey, PlusCode};
use crate::extract::AddressResult;

/// Default hot-tier time-to-live (24 hours).
pub const DEFAULT_HOT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default hot-tier entry bound.
pub const DEFAULT_HOT_CAPACITY: u64 = 100_000;

/// Default interval between background flushes (5 minutes).
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// One hot-tier entry.
///
/// Never edited in place: promotion and overwrite build a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CoordinateKey,
    pub value: Arc<AddressResult>,
    pub stored_at: Instant,
    pub ttl: Duration,
    /// True when created by a write that is not yet persisted.
    pub dirty: bool,
}

impl CacheEntry {
    pub fn new(key: CoordinateKey, value: Arc<AddressResult>, ttl: Duration, dirty: bool) -> Self {
        Self {
            key,
            value,
            stored_at: Instant::now(),
            ttl,
            dirty,
        }
    }

    /// True once `now` is past `stored_at + ttl`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Persisted form of a cached result.
///
/// The durable file is a JSON object mapping `"<lat>,<lng>"` to one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub display_name: Option<String>,
    #[serde(default)]
    pub address_components: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plus_code: Option<PlusCode>,
    pub stored_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn from_result(result: &AddressResult, stored_at: DateTime<Utc>) -> Self {
        Self {
            display_name: result.display_name.clone(),
            address_components: result.address_components.clone(),
            plus_code: result.plus_code.clone(),
            stored_at,
        }
    }

    pub fn to_result(&self) -> AddressResult {
        AddressResult {
            display_name: self.display_name.clone(),
            address_components: self.address_components.clone(),
            plus_code: self.plus_code.clone(),
        }
    }
}

/// Result of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing changed since the last successful write.
    Clean,
    /// The full record map was written.
    Written { records: usize },
}

impl fmt::Display for FlushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushOutcome::Clean => write!(f, "nothing to flush"),
            FlushOutcome::Written { records } => write!(f, "wrote {} records", records),
        }
    }
}

/// Cache errors. None of these ever fail a live lookup.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The durable backend could not be read or written.
    #[error("Durable tier unavailable: {0}")]
    DurableUnavailable(#[from] StoreError),
}

/// Hot/durable tier sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub hot_ttl: Duration,
    pub hot_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_ttl: DEFAULT_HOT_TTL,
            hot_capacity: DEFAULT_HOT_CAPACITY,
        }
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hot_hits: u64,
    /// Durable hits, each of which was promoted into the hot tier.
    pub durable_hits: u64,
    pub misses: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    /// Records in the durable map.
    pub records: usize,
    pub dirty: bool,
}

impl CacheStats {
    /// Fraction of lookups answered by either tier.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hot_hits + self.durable_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, hot hits {}, durable hits {}, misses {} ({:.1}% hit rate), {} flushes, {} failed{}",
            self.records,
            self.hot_hits,
            self.durable_hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.flushes,
            self.flush_failures,
            if self.dirty { ", unflushed changes" } else { "" }
        )
    }
}
