//! Address lookup coordination.
//!
//! [`LookupCoordinator`] is the entry point for callers: it validates the
//! coordinate, consults the [`CacheStore`](crate::cache::CacheStore) and
//! collapses concurrent misses for the same key into one provider call.
//!
//! Only three failures ever reach a caller: [`LookupError::InvalidInput`],
//! [`LookupError::ProviderUnavailable`] and [`LookupError::Timeout`].

pub mod coalesce;
mod coordinator;

pub use coalesce::{CoalescerStats, RequestCoalescer};
pub use coordinator::LookupCoordinator;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::coord::{CoordError, DEFAULT_KEY_PRECISION};
use crate::extract::AddressResult;
use crate::provider::ProviderError;

/// Default overall deadline for one lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(20);

/// User-visible lookup failures.
///
/// Messages are safe to return to clients: they never contain provider
/// response bodies or request URLs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("Invalid coordinates: {0}")]
    InvalidInput(#[from] CoordError),

    #[error("Address provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl LookupError {
    /// Summarizes a provider failure without leaking its details.
    pub fn from_provider(error: &ProviderError) -> Self {
        let summary = match error {
            ProviderError::Unavailable { attempts, .. } => {
                format!("provider unreachable after {} attempts", attempts)
            }
            ProviderError::Transport(_) => "provider unreachable".to_string(),
            ProviderError::Throttled(_) => "provider is throttling requests".to_string(),
            ProviderError::Rejected { status, .. } => {
                format!("provider rejected the request (HTTP {})", status)
            }
            ProviderError::Extraction(_) => "provider returned an unreadable response".to_string(),
            ProviderError::Config(_) => "provider is misconfigured".to_string(),
        };
        LookupError::ProviderUnavailable(summary)
    }
}

/// Where a lookup result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Cache,
    Provider,
}

impl LookupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupSource::Cache => "cache",
            LookupSource::Provider => "provider",
        }
    }
}

impl fmt::Display for LookupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved address and its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub result: Arc<AddressResult>,
    pub source: LookupSource,
}

/// Lookup behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    /// Deadline for one `resolve` call, waiting included.
    pub timeout: Duration,
    /// Decimal places kept when normalizing coordinates.
    pub key_precision: u8,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            key_precision: DEFAULT_KEY_PRECISION,
        }
    }
}

impl LookupConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_key_precision(mut self, precision: u8) -> Self {
        self.key_precision = precision;
        self
    }
}
