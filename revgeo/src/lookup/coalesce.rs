//! Request coalescing for address lookups.
//!
//! When several callers miss the cache for the same coordinate at once,
//! only the first starts a provider call. The others subscribe to its
//! result.
//!
//! ```text
//! resolve A ─┐
//!            │                               detached
//! resolve B ─┼──► RequestCoalescer ────────► fetch task
//!            │         │                        │
//! resolve C ─┘         ▼                        ▼
//!               [A, B, C receive ◄──────── complete(key, result)
//!                the same result]
//! ```
//!
//! The registry is a sharded [`DashMap`] so unrelated keys never contend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use super::{LookupError, LookupOutcome};
use crate::coord::CoordinateKey;

/// Value delivered to every waiter of one in-flight lookup.
pub type CoalescedResult = Result<LookupOutcome, LookupError>;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoalescerStats {
    /// Total requests registered
    pub total_requests: u64,
    /// Requests that joined an in-flight lookup
    pub coalesced_requests: u64,
    /// Requests that started a new lookup
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Outcome of [`RequestCoalescer::register`].
pub enum Registration {
    /// First caller for the key: start the fetch, then wait on the receiver.
    Leader(broadcast::Receiver<CoalescedResult>),
    /// A fetch is already running: just wait.
    Joined(broadcast::Receiver<CoalescedResult>),
}

/// Registry of in-flight lookups (the pending requests), one per key.
#[derive(Default)]
pub struct RequestCoalescer {
    in_flight: DashMap<CoordinateKey, broadcast::Sender<CoalescedResult>>,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `key`.
    ///
    /// The receiver is subscribed before this returns, so a leader cannot
    /// miss a result published by the fetch it is about to start.
    pub fn register(&self, key: &CoordinateKey) -> Registration {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let coalesced = self.coalesced_requests.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    key = %key,
                    coalesced,
                    "Coalescing request - waiting for in-flight lookup"
                );
                Registration::Joined(entry.get().subscribe())
            }
            Entry::Vacant(entry) => {
                // A single message is ever sent per channel
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx);
                self.new_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "New request - starting lookup");
                Registration::Leader(rx)
            }
        }
    }

    /// Publishes the result for `key` and removes the pending entry.
    ///
    /// Returns the number of waiters that were still listening.
    pub fn complete(&self, key: &CoordinateKey, result: CoalescedResult) -> usize {
        let Some((_, tx)) = self.in_flight.remove(key) else {
            return 0;
        };
        let waiters = tx.receiver_count();
        // Waiters that timed out have dropped their receivers
        let _ = tx.send(result);
        if waiters > 1 {
            debug!(key = %key, waiters, "Broadcast result to coalesced waiters");
        }
        waiters
    }

    /// Drops the pending entry without a result; waiters see a closed channel.
    pub fn abandon(&self, key: &CoordinateKey) {
        self.in_flight.remove(key);
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, key: &CoordinateKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
        }
    }
}

/// Abandons the pending entry if the fetch task ends without completing,
/// e.g. by panicking, so waiters are released instead of hanging.
pub(crate) struct PendingGuard {
    coalescer: Arc<RequestCoalescer>,
    key: Option<CoordinateKey>,
}

impl PendingGuard {
    pub(crate) fn new(coalescer: Arc<RequestCoalescer>, key: CoordinateKey) -> Self {
        Self {
            coalescer,
            key: Some(key),
        }
    }

    pub(crate) fn complete(mut self, result: CoalescedResult) -> usize {
        match self.key.take() {
            Some(key) => self.coalescer.complete(&key, result),
            None => 0,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.coalescer.abandon(&key);
        }
    }
}
