//! Two-tier result cache.
//!
//! ```text
//! get ──► HotTier (moka, TTL) ──hit──► result
//!             │ miss
//!             ▼
//!         DurableTier (record map) ──hit──► promote to hot ──► result
//!             │ miss
//!             ▼
//!           None
//!
//! put ──► HotTier + DurableTier, dirty = true
//! flush ─► DurableStore::write_all (periodic via FlushDaemon, final at shutdown)
//! ```
//!
//! The hot tier is bounded and volatile. The durable tier holds every
//! record and is persisted through a [`DurableStore`] backend.

mod durable;
mod flusher;
mod hot;
mod service;
pub mod store;
mod types;

pub use flusher::FlushDaemon;
pub use service::CacheStore;
pub use store::{
    DurableStore, GithubConfig, GithubStore, JsonFileStore, MemoryStore, RecordMap, StoreError,
};
pub use types::{
    CacheConfig, CacheEntry, CacheError, CacheRecord, CacheStats, FlushOutcome,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_HOT_CAPACITY, DEFAULT_HOT_TTL,
};
