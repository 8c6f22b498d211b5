//! Cache-first lookup with single-flight provider calls.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::coalesce::{CoalescedResult, CoalescerStats, PendingGuard, Registration, RequestCoalescer};
use super::{LookupConfig, LookupError, LookupOutcome, LookupSource};
use crate::cache::CacheStore;
use crate::coord::CoordinateKey;
use crate::provider::ReverseGeocoder;

/// Answers address lookups.
///
/// Per key: cache check, then (on miss) join or start the single in-flight
/// provider call. The call runs in its own task, so a caller that times out
/// does not cancel it; its result still lands in the cache for the others.
pub struct LookupCoordinator {
    cache: Arc<CacheStore>,
    geocoder: Arc<dyn ReverseGeocoder>,
    coalescer: Arc<RequestCoalescer>,
    config: LookupConfig,
}

impl LookupCoordinator {
    pub fn new(
        cache: Arc<CacheStore>,
        geocoder: Arc<dyn ReverseGeocoder>,
        config: LookupConfig,
    ) -> Self {
        Self {
            cache,
            geocoder,
            coalescer: Arc::new(RequestCoalescer::new()),
            config,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.geocoder.name()
    }

    pub fn coalescer_stats(&self) -> CoalescerStats {
        self.coalescer.stats()
    }

    /// Resolves raw query-string values (`?lat=..&lng=..`).
    pub async fn resolve_query(
        &self,
        lat: Option<&str>,
        lng: Option<&str>,
    ) -> Result<LookupOutcome, LookupError> {
        let key = CoordinateKey::parse(lat, lng, self.config.key_precision)?;
        self.resolve(key).await
    }

    /// Resolves numeric coordinates.
    pub async fn resolve_coords(&self, lat: f64, lng: f64) -> Result<LookupOutcome, LookupError> {
        let key = CoordinateKey::with_precision(lat, lng, self.config.key_precision)?;
        self.resolve(key).await
    }

    /// Resolves a normalized key.
    pub async fn resolve(&self, key: CoordinateKey) -> Result<LookupOutcome, LookupError> {
        if let Some(result) = self.cache.get(&key).await {
            return Ok(LookupOutcome {
                result,
                source: LookupSource::Cache,
            });
        }

        let mut receiver = match self.coalescer.register(&key) {
            Registration::Leader(receiver) => {
                self.spawn_fetch(key.clone());
                receiver
            }
            Registration::Joined(receiver) => receiver,
        };

        match tokio::time::timeout(self.config.timeout, receiver.recv()).await {
            Ok(Ok(result)) => result,
            Ok(Err(RecvError::Closed)) | Ok(Err(RecvError::Lagged(_))) => {
                warn!(key = %key, "Lookup task ended without a result");
                Err(LookupError::ProviderUnavailable(
                    "lookup ended unexpectedly".to_string(),
                ))
            }
            Err(_) => {
                warn!(
                    key = %key,
                    timeout_secs = self.config.timeout.as_secs(),
                    "Lookup timed out, provider call continues in background"
                );
                Err(LookupError::Timeout(self.config.timeout))
            }
        }
    }

    fn spawn_fetch(&self, key: CoordinateKey) {
        let cache = Arc::clone(&self.cache);
        let geocoder = Arc::clone(&self.geocoder);
        let guard = PendingGuard::new(Arc::clone(&self.coalescer), key.clone());

        tokio::spawn(async move {
            let result = fetch_and_store(&cache, geocoder.as_ref(), &key).await;
            guard.complete(result);
        });
    }
}

/// The body of one pending request.
///
/// Checks the cache again first: another caller may have completed the same
/// key between our cache miss and our registration.
async fn fetch_and_store(
    cache: &CacheStore,
    geocoder: &dyn ReverseGeocoder,
    key: &CoordinateKey,
) -> CoalescedResult {
    if let Some(result) = cache.peek(key).await {
        debug!(key = %key, "Filled while registering, served from cache");
        return Ok(LookupOutcome {
            result,
            source: LookupSource::Cache,
        });
    }

    match geocoder.reverse(key).await {
        Ok(result) => {
            let result = Arc::new(result);
            // Written before waiters are released
            cache.put(key.clone(), Arc::clone(&result)).await;
            debug!(
                key = %key,
                provider = geocoder.name(),
                partial = result.display_name.is_none(),
                "Lookup stored"
            );
            Ok(LookupOutcome {
                result,
                source: LookupSource::Provider,
            })
        }
        Err(e) => {
            warn!(key = %key, provider = geocoder.name(), error = %e, "Lookup failed");
            Err(LookupError::from_provider(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, MemoryStore};
    use crate::coord::CoordError;
    use crate::extract::AddressResult;
    use crate::limiter::{RateLimiter, RateLimiterConfig};
    use crate::provider::{
        BoxFuture, MockAsyncHttpClient, NominatimProvider, ProviderClient, ProviderError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const BODY: &[u8] = br#"{"display_name": "268 Ly Thuong Kiet, District 10"}"#;

    fn cache() -> Arc<CacheStore> {
        Arc::new(CacheStore::new(
            CacheConfig::default(),
            Arc::new(MemoryStore::new()),
        ))
    }

    fn client(http: MockAsyncHttpClient) -> Arc<ProviderClient<MockAsyncHttpClient>> {
        Arc::new(ProviderClient::new(
            http,
            Arc::new(NominatimProvider::new()),
            Arc::new(RateLimiter::new(
                RateLimiterConfig::default().with_min_spacing(Duration::ZERO),
            )),
        ))
    }

    fn coordinator(
        cache: Arc<CacheStore>,
        geocoder: Arc<dyn ReverseGeocoder>,
        timeout: Duration,
    ) -> Arc<LookupCoordinator> {
        Arc::new(LookupCoordinator::new(
            cache,
            geocoder,
            LookupConfig::default().with_timeout(timeout),
        ))
    }

    /// Geocoder that counts calls and never answers.
    struct Hanging {
        calls: AtomicUsize,
    }

    impl ReverseGeocoder for Hanging {
        fn reverse<'a>(
            &'a self,
            _key: &'a CoordinateKey,
        ) -> BoxFuture<'a, Result<AddressResult, ProviderError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(std::future::pending())
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let http = client(MockAsyncHttpClient::new(Ok(BODY.to_vec())));
        let coordinator = coordinator(cache(), http.clone(), Duration::from_secs(5));

        let first = coordinator.resolve_coords(10.762622, 106.660172).await.unwrap();
        assert_eq!(first.source, LookupSource::Provider);
        assert_eq!(
            first.result.display_name.as_deref(),
            Some("268 Ly Thuong Kiet, District 10")
        );

        let second = coordinator.resolve_coords(10.762622, 106.660172).await.unwrap();
        assert_eq!(second.source, LookupSource::Cache);
        assert_eq!(second.result, first.result);
    }

    #[tokio::test]
    async fn test_parallel_duplicates_share_one_call() {
        let http = MockAsyncHttpClient::new(Ok(BODY.to_vec())).with_delay(Duration::from_millis(50));
        let client = client(http);
        let coordinator = coordinator(cache(), client.clone(), Duration::from_secs(5));

        let (a, b) = tokio::join!(
            coordinator.resolve_coords(10.762622, 106.660172),
            coordinator.resolve_coords(10.762622, 106.660172),
        );
        assert_eq!(a.unwrap().result, b.unwrap().result);
        assert_eq!(coordinator.coalescer_stats().coalesced_requests, 1);
    }

    #[tokio::test]
    async fn test_burst_of_callers_coalesces() {
        let http = MockAsyncHttpClient::new(Ok(BODY.to_vec())).with_delay(Duration::from_millis(50));
        let coordinator = coordinator(cache(), client(http), Duration::from_secs(5));

        let results = futures::future::join_all(
            (0..8).map(|_| coordinator.resolve_coords(10.762622, 106.660172)),
        )
        .await;

        assert!(results.iter().all(|r| r.is_ok()));
        let stats = coordinator.coalescer_stats();
        assert_eq!(stats.new_requests, 1);
        assert_eq!(stats.coalesced_requests, 7);
        assert!(!coordinator
            .coalescer
            .is_in_flight(&CoordinateKey::new(10.762622, 106.660172).unwrap()));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_cache() {
        let hanging = Arc::new(Hanging {
            calls: AtomicUsize::new(0),
        });
        let store = cache();
        let coordinator = coordinator(store.clone(), hanging.clone(), Duration::from_secs(1));

        let err = coordinator.resolve_query(Some("91"), Some("0")).await.unwrap_err();
        assert!(matches!(
            err,
            LookupError::InvalidInput(CoordError::InvalidLatitude(_))
        ));
        let err = coordinator.resolve_query(None, Some("0")).await.unwrap_err();
        assert!(matches!(err, LookupError::InvalidInput(CoordError::Missing("lat"))));

        assert_eq!(hanging.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let http = MockAsyncHttpClient::scripted(
            vec![Err(ProviderError::Rejected {
                status: 403,
                message: "HTTP 403 from https://secret.example/?key=abc".to_string(),
            })],
            Ok(BODY.to_vec()),
        );
        let store = cache();
        let coordinator = coordinator(store.clone(), client(http), Duration::from_secs(5));

        let err = coordinator.resolve_coords(1.0, 2.0).await.unwrap_err();
        match &err {
            LookupError::ProviderUnavailable(message) => {
                // Provider details stay out of user-facing messages
                assert!(!message.contains("secret"));
            }
            other => panic!("expected ProviderUnavailable, got {:?}", other),
        }
        assert!(store.is_empty());

        let retry = coordinator.resolve_coords(1.0, 2.0).await.unwrap();
        assert_eq!(retry.source, LookupSource::Provider);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_cancel_shared_call() {
        let hanging = Arc::new(Hanging {
            calls: AtomicUsize::new(0),
        });
        let coordinator = coordinator(cache(), hanging.clone(), Duration::from_secs(20));

        let err = coordinator.resolve_coords(1.0, 2.0).await.unwrap_err();
        assert_eq!(err, LookupError::Timeout(Duration::from_secs(20)));

        // The pending request survives; a new caller joins it
        let key = CoordinateKey::new(1.0, 2.0).unwrap();
        assert!(coordinator.coalescer.is_in_flight(&key));
        let err = coordinator.resolve_coords(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, LookupError::Timeout(_)));
        assert_eq!(hanging.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_result_is_cached() {
        let http = client(MockAsyncHttpClient::new(Ok(b"{}".to_vec())));
        let store = cache();
        let coordinator = coordinator(store.clone(), http, Duration::from_secs(5));

        let first = coordinator.resolve_coords(3.0, 4.0).await.unwrap();
        assert!(first.result.display_name.is_none());
        let second = coordinator.resolve_coords(3.0, 4.0).await.unwrap();
        assert_eq!(second.source, LookupSource::Cache);
    }
}
