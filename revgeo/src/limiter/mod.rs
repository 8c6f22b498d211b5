//! Outbound call scheduling for rate-limited providers.
//!
//! [`RateLimiter`] admits one provider call at a time, spaces call starts
//! by a minimum interval and hides throttling from callers by backing off
//! and retrying. Waiting callers are admitted in arrival order.
//!
//! ```text
//! caller ──► admission slot (FIFO) ──► wait for spacing ──► task()
//!                 ▲                                          │
//!                 │        Throttled: sleep backoff, retry ◄─┤
//!                 │        Transport: retry up to N        ◄─┤
//!                 └───────────── release on Ok / terminal ◄──┘
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use crate::provider::ProviderError;

/// Default minimum spacing between call starts.
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(1000);

/// Default wait after a throttling signal.
pub const DEFAULT_THROTTLE_BACKOFF: Duration = Duration::from_millis(3000);

/// Default number of retries for transport failures.
pub const DEFAULT_MAX_TRANSPORT_RETRIES: u32 = 3;

/// Limiter tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Minimum time between two call starts.
    pub min_spacing: Duration,
    /// Wait applied after a throttling signal before retrying.
    pub throttle_backoff: Duration,
    /// Retries allowed after transport failures before giving up.
    pub max_transport_retries: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_spacing: DEFAULT_MIN_SPACING,
            throttle_backoff: DEFAULT_THROTTLE_BACKOFF,
            max_transport_retries: DEFAULT_MAX_TRANSPORT_RETRIES,
        }
    }
}

impl RateLimiterConfig {
    pub fn with_min_spacing(mut self, spacing: Duration) -> Self {
        self.min_spacing = spacing;
        self
    }

    pub fn with_throttle_backoff(mut self, backoff: Duration) -> Self {
        self.throttle_backoff = backoff;
        self
    }

    pub fn with_max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }
}

/// Snapshot of limiter counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimiterStats {
    /// Task invocations, retries included.
    pub calls_started: u64,
    /// Backoff waits caused by throttling.
    pub throttle_backoffs: u64,
    /// Retries caused by transport failures.
    pub transport_retries: u64,
}

/// Single-slot scheduler for provider calls.
///
/// The admission slot is a fair [`tokio::sync::Mutex`] guarding the start
/// time of the previous call. It is held for the whole call including any
/// backoff, so a throttled provider sees no traffic until the retry.
pub struct RateLimiter {
    config: RateLimiterConfig,
    last_start: Mutex<Option<Instant>>,
    calls_started: AtomicU64,
    throttle_backoffs: AtomicU64,
    transport_retries: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            last_start: Mutex::new(None),
            calls_started: AtomicU64::new(0),
            throttle_backoffs: AtomicU64::new(0),
            transport_retries: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Runs `task` once admitted, retrying as the error kind dictates.
    ///
    /// `task` may be invoked several times. Throttling is retried without
    /// limit; transport failures up to `max_transport_retries` times, after
    /// which [`ProviderError::Unavailable`] is returned. Any other error is
    /// returned as is.
    pub async fn schedule<T, F, Fut>(&self, mut task: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_start = self.last_start.lock().await;
        let mut throttles: u32 = 0;
        let mut transport_failures: u32 = 0;

        loop {
            if let Some(previous) = *last_start {
                let ready_at = previous + self.config.min_spacing;
                if ready_at > Instant::now() {
                    sleep_until(ready_at).await;
                }
            }

            *last_start = Some(Instant::now());
            self.calls_started.fetch_add(1, Ordering::Relaxed);

            let error = match task().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if error.is_throttle() {
                throttles += 1;
                self.throttle_backoffs.fetch_add(1, Ordering::Relaxed);
                warn!(
                    attempt = throttles,
                    backoff_ms = self.config.throttle_backoff.as_millis() as u64,
                    error = %error,
                    "Provider throttled, backing off"
                );
                sleep(self.config.throttle_backoff).await;
            } else if error.is_transient() {
                transport_failures += 1;
                if transport_failures > self.config.max_transport_retries {
                    warn!(
                        attempts = transport_failures,
                        error = %error,
                        "Transport retries exhausted"
                    );
                    return Err(ProviderError::Unavailable {
                        attempts: transport_failures,
                        last_error: error.to_string(),
                    });
                }
                self.transport_retries.fetch_add(1, Ordering::Relaxed);
                debug!(
                    attempt = transport_failures,
                    max_retries = self.config.max_transport_retries,
                    error = %error,
                    "Transport failure, retrying"
                );
            } else {
                return Err(error);
            }
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            calls_started: self.calls_started.load(Ordering::Relaxed),
            throttle_backoffs: self.throttle_backoffs.load(Ordering::Relaxed),
            transport_retries: self.transport_retries.load(Ordering::Relaxed),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    fn limiter(spacing_ms: u64) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            RateLimiterConfig::default().with_min_spacing(Duration::from_millis(spacing_ms)),
        ))
    }

    /// Task whose results come from a script; records each start time.
    struct Scripted {
        results: SyncMutex<VecDeque<Result<u32, ProviderError>>>,
        starts: SyncMutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<u32, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                results: SyncMutex::new(results.into()),
                starts: SyncMutex::new(Vec::new()),
            })
        }

        async fn call(&self) -> Result<u32, ProviderError> {
            self.starts.lock().push(Instant::now());
            self.results.lock().pop_front().unwrap_or(Ok(0))
        }
    }

    fn transport() -> ProviderError {
        ProviderError::Transport("connection reset".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_runs_immediately() {
        let limiter = limiter(1000);
        let start = Instant::now();
        let value = limiter.schedule(|| async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(value.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_are_spaced() {
        let limiter = limiter(1000);
        let task = Scripted::new(vec![]);

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let task = Arc::clone(&task);
                tokio::spawn(async move { limiter.schedule(|| task.call()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let starts = task.starts.lock().clone();
        assert_eq!(starts.len(), 5);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_measured_between_starts() {
        let limiter = limiter(1000);
        let origin = Instant::now();

        // A slow call longer than the spacing does not delay the next start further
        limiter
            .schedule(|| async {
                sleep(Duration::from_millis(1500)).await;
                Ok::<_, ProviderError>(())
            })
            .await
            .unwrap();
        limiter
            .schedule(|| async { Ok::<_, ProviderError>(()) })
            .await
            .unwrap();

        let elapsed = origin.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_backs_off_once_then_succeeds() {
        let limiter = limiter(0);
        let task = Scripted::new(vec![
            Err(ProviderError::Throttled("429".to_string())),
            Ok(42),
        ]);

        let result = limiter.schedule(|| task.call()).await;
        assert_eq!(result.unwrap(), 42);

        let starts = task.starts.lock().clone();
        assert_eq!(starts.len(), 2);
        assert!(starts[1] - starts[0] >= DEFAULT_THROTTLE_BACKOFF);
        assert_eq!(limiter.stats().throttle_backoffs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_retries_are_unbounded() {
        let limiter = limiter(0);
        let mut script: Vec<_> = (0..10)
            .map(|_| Err(ProviderError::Throttled("429".to_string())))
            .collect();
        script.push(Ok(1));
        let task = Scripted::new(script);

        assert_eq!(limiter.schedule(|| task.call()).await.unwrap(), 1);
        assert_eq!(limiter.stats().throttle_backoffs, 10);
        assert_eq!(limiter.stats().calls_started, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_holds_admission_slot() {
        let limiter = limiter(0);
        let throttled = Scripted::new(vec![Err(ProviderError::Throttled("429".to_string()))]);
        let other = Scripted::new(vec![]);
        let origin = Instant::now();

        let first = {
            let limiter = Arc::clone(&limiter);
            let throttled = Arc::clone(&throttled);
            tokio::spawn(async move { limiter.schedule(|| throttled.call()).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let limiter = Arc::clone(&limiter);
            let other = Arc::clone(&other);
            tokio::spawn(async move { limiter.schedule(|| other.call()).await })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // Nobody reached the provider during the backoff window
        let other_start = other.starts.lock()[0];
        assert!(other_start - origin >= DEFAULT_THROTTLE_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_retries_exhausted() {
        let limiter = limiter(0);
        let task = Scripted::new((0..10).map(|_| Err(transport())).collect());

        let result = limiter.schedule(|| task.call()).await;
        match result {
            Err(ProviderError::Unavailable { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected Unavailable, got {:?}", other),
        }
        assert_eq!(task.starts.lock().len(), 4);
        assert_eq!(limiter.stats().transport_retries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_recovers() {
        let limiter = limiter(0);
        let task = Scripted::new(vec![Err(transport()), Err(transport()), Ok(5)]);

        assert_eq!(limiter.schedule(|| task.call()).await.unwrap(), 5);
        assert_eq!(limiter.stats().transport_retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_fails_immediately() {
        let limiter = limiter(0);
        let task = Scripted::new(vec![Err(ProviderError::Rejected {
            status: 403,
            message: "forbidden".to_string(),
        })]);

        let result = limiter.schedule(|| task.call()).await;
        assert!(matches!(result, Err(ProviderError::Rejected { status: 403, .. })));
        assert_eq!(task.starts.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_respect_spacing() {
        let limiter = limiter(1000);
        let task = Scripted::new(vec![Err(transport()), Ok(1)]);

        limiter.schedule(|| task.call()).await.unwrap();
        let starts = task.starts.lock().clone();
        assert!(starts[1] - starts[0] >= Duration::from_millis(1000));
    }
}
