//! Durable cache backends.
//!
//! A backend stores the whole record map as one unit: [`DurableStore::read_all`]
//! at startup and [`DurableStore::write_all`] at flush time. The format is
//! the same JSON object everywhere, so data can move between backends.
//!
//! | Backend | Where | Use |
//! |---------|-------|-----|
//! | [`MemoryStore`] | process memory | tests, `--no-persist` |
//! | [`JsonFileStore`] | local JSON file | single host |
//! | [`GithubStore`] | file in a GitHub repository | stateless hosting |

mod file;
mod github;
mod memory;

pub use file::JsonFileStore;
pub use github::{GithubConfig, GithubStore, GITHUB_API_URL};
pub use memory::MemoryStore;

use std::collections::HashMap;

use thiserror::Error;

use super::types::CacheRecord;
use crate::provider::BoxFuture;

/// Persisted record map keyed by `"<lat>,<lng>"`.
pub type RecordMap = HashMap<String, CacheRecord>;

/// Errors from durable backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("Invalid cache data: {0}")]
    Format(String),

    /// Backend could not be reached.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// Backend refused the write because the stored version moved on.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Backend is misconfigured (missing token, bad path).
    #[error("Backend misconfigured: {0}")]
    Config(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Format(e.to_string())
    }
}

/// Whole-map persistence backend.
///
/// Uses `Pin<Box<dyn Future>>` so backends can be held as
/// `Arc<dyn DurableStore>` and swapped by configuration.
pub trait DurableStore: Send + Sync {
    /// Reads every persisted record. An absent store reads as empty.
    fn read_all(&self) -> BoxFuture<'_, Result<RecordMap, StoreError>>;

    /// Replaces the persisted map with `records`.
    fn write_all<'a>(&'a self, records: &'a RecordMap) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Serializes a record map with sorted keys for stable diffs.
pub(crate) fn encode_records(records: &RecordMap) -> Result<Vec<u8>, StoreError> {
    let sorted: std::collections::BTreeMap<&String, &CacheRecord> = records.iter().collect();
    Ok(serde_json::to_vec_pretty(&sorted)?)
}

pub(crate) fn decode_records(bytes: &[u8]) -> Result<RecordMap, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RecordMap::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}
