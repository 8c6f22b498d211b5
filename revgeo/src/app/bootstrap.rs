//! Application bootstrap implementation.

use std::sync::Arc;

use tracing::{info, warn};

use super::config::{AppConfig, BackendConfig};
use super::error::AppError;
use crate::cache::{
    CacheError, CacheStore, DurableStore, FlushDaemon, FlushOutcome, GithubStore, JsonFileStore,
    MemoryStore,
};
use crate::lookup::LookupCoordinator;
use crate::provider::{AsyncReqwestClient, ProviderFactory, ReverseGeocoder};

/// The running lookup pipeline.
///
/// Start order:
/// 1. durable backend
/// 2. cache load (a failure leaves the cache empty, the app still starts)
/// 3. flush daemon
/// 4. HTTP client, provider, rate limiter and coordinator
///
/// # Example
///
/// ```ignore
/// use revgeo::app::{AppConfig, GeocodeApp};
/// use revgeo::config::ConfigFile;
///
/// let config = AppConfig::from_config_file(&ConfigFile::load()?)?;
/// let app = GeocodeApp::start(config).await?;
/// let outcome = app.coordinator().resolve_coords(10.762622, 106.660172).await?;
/// app.shutdown().await?;
/// ```
pub struct GeocodeApp {
    cache: Arc<CacheStore>,
    coordinator: Arc<LookupCoordinator>,
    flush_daemon: FlushDaemon,
    config: AppConfig,
}

impl GeocodeApp {
    /// Starts the application with the backend and provider named in
    /// `config`. Must be called within a Tokio runtime.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        let backend = build_backend(&config)?;

        let http = AsyncReqwestClient::with_timeout(&config.user_agent, config.request_timeout_secs)?;
        let client = ProviderFactory::new(http).build(&config.provider, config.limiter.clone())?;
        info!(
            provider = config.provider.name(),
            min_spacing_ms = config.limiter.min_spacing.as_millis() as u64,
            "Provider ready"
        );

        Self::start_with(config, backend, Arc::new(client)).await
    }

    /// Starts with an explicit backend and geocoder.
    ///
    /// `config.backend` and `config.provider` are ignored.
    pub async fn start_with(
        config: AppConfig,
        backend: Arc<dyn DurableStore>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Result<Self, AppError> {
        let cache = Arc::new(CacheStore::new(config.cache.clone(), backend));

        if let Err(e) = cache.load().await {
            warn!(
                backend = cache.backend_name(),
                error = %e,
                "Cache load failed, starting empty"
            );
        }

        let flush_daemon = FlushDaemon::start(Arc::clone(&cache), config.flush_interval);

        let coordinator = Arc::new(LookupCoordinator::new(
            Arc::clone(&cache),
            geocoder,
            config.lookup.clone(),
        ));

        info!(
            provider = coordinator.provider_name(),
            timeout_secs = config.lookup.timeout.as_secs(),
            "Lookup pipeline started"
        );

        Ok(Self {
            cache,
            coordinator,
            flush_daemon,
            config,
        })
    }

    pub fn coordinator(&self) -> Arc<LookupCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn cache(&self) -> Arc<CacheStore> {
        Arc::clone(&self.cache)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Stops the flush daemon and writes any dirty entries one last time.
    pub async fn shutdown(self) -> Result<FlushOutcome, CacheError> {
        info!("Shutting down lookup pipeline");
        let outcome = self.flush_daemon.shutdown().await;
        match &outcome {
            Ok(_) => info!("Shutdown complete"),
            Err(e) => warn!(error = %e, "Final flush failed, unsaved entries lost"),
        }
        outcome
    }
}

/// Builds the durable store named by `config.backend`.
pub fn build_backend(config: &AppConfig) -> Result<Arc<dyn DurableStore>, AppError> {
    let backend: Arc<dyn DurableStore> = match &config.backend {
        BackendConfig::Memory => Arc::new(MemoryStore::new()),
        BackendConfig::File(path) => Arc::new(JsonFileStore::new(path.clone())),
        BackendConfig::Github(github) => {
            let http =
                AsyncReqwestClient::with_timeout(&config.user_agent, config.request_timeout_secs)?;
            Arc::new(GithubStore::new(http, github.clone())?)
        }
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheRecord, RecordMap};
    use crate::extract::AddressResult;
    use crate::limiter::{RateLimiter, RateLimiterConfig};
    use crate::lookup::LookupSource;
    use crate::provider::{MockAsyncHttpClient, NominatimProvider, ProviderClient, ProviderConfig};
    use chrono::Utc;
    use std::time::Duration;

    const BODY: &[u8] = br#"{"display_name": "Ben Thanh Market, District 1"}"#;

    fn geocoder(http: MockAsyncHttpClient) -> Arc<dyn ReverseGeocoder> {
        Arc::new(ProviderClient::new(
            http,
            Arc::new(NominatimProvider::new()),
            Arc::new(RateLimiter::new(
                RateLimiterConfig::default().with_min_spacing(Duration::ZERO),
            )),
        ))
    }

    fn test_config() -> AppConfig {
        AppConfig::new(ProviderConfig::nominatim(), BackendConfig::Memory)
    }

    #[tokio::test]
    async fn test_start_lookup_and_shutdown_flushes() {
        let backend = Arc::new(MemoryStore::new());
        let app = GeocodeApp::start_with(
            test_config(),
            backend.clone(),
            geocoder(MockAsyncHttpClient::new(Ok(BODY.to_vec()))),
        )
        .await
        .unwrap();

        let outcome = app
            .coordinator()
            .resolve_coords(10.772, 106.698)
            .await
            .unwrap();
        assert_eq!(outcome.source, LookupSource::Provider);
        assert!(app.cache().is_dirty());

        let flushed = app.shutdown().await.unwrap();
        assert_eq!(flushed, FlushOutcome::Written { records: 1 });
        assert_eq!(backend.records().len(), 1);
    }

    #[tokio::test]
    async fn test_start_serves_loaded_records() {
        let mut records = RecordMap::new();
        let result = AddressResult {
            display_name: Some("Notre-Dame Cathedral Basilica of Saigon".to_string()),
            ..Default::default()
        };
        records.insert(
            "10.779800,106.699000".to_string(),
            CacheRecord::from_result(&result, Utc::now()),
        );
        let backend = Arc::new(MemoryStore::with_records(records));
        let http = MockAsyncHttpClient::new(Ok(BODY.to_vec()));

        let app = GeocodeApp::start_with(test_config(), backend, geocoder(http))
            .await
            .unwrap();
        assert_eq!(app.cache().len(), 1);

        let outcome = app
            .coordinator()
            .resolve_coords(10.7798, 106.699)
            .await
            .unwrap();
        assert_eq!(outcome.source, LookupSource::Cache);
        assert_eq!(outcome.result.display_name, result.display_name);

        // Nothing new to persist
        assert_eq!(app.shutdown().await.unwrap(), FlushOutcome::Clean);
    }

    #[tokio::test]
    async fn test_start_survives_unreachable_backend() {
        let backend = Arc::new(MemoryStore::new());
        backend.set_available(false);

        let app = GeocodeApp::start_with(
            test_config(),
            backend.clone(),
            geocoder(MockAsyncHttpClient::new(Ok(BODY.to_vec()))),
        )
        .await
        .unwrap();
        assert!(app.cache().is_empty());

        // Lookups still work without the durable backend
        let outcome = app.coordinator().resolve_coords(1.0, 2.0).await.unwrap();
        assert_eq!(outcome.source, LookupSource::Provider);

        assert!(app.shutdown().await.is_err());
    }

    #[tokio::test]
    async fn test_backend_recovering_after_start_keeps_its_records() {
        let records: RecordMap = [(10.0, "a"), (11.0, "b"), (12.0, "c")]
            .iter()
            .map(|(n, name)| {
                let result = AddressResult {
                    display_name: Some(name.to_string()),
                    ..Default::default()
                };
                (
                    crate::coord::CoordinateKey::new(*n, *n).unwrap().as_str().to_string(),
                    CacheRecord::from_result(&result, Utc::now()),
                )
            })
            .collect();
        let backend = Arc::new(MemoryStore::with_records(records));
        backend.set_available(false);

        let app = GeocodeApp::start_with(
            test_config(),
            backend.clone(),
            geocoder(MockAsyncHttpClient::new(Ok(BODY.to_vec()))),
        )
        .await
        .unwrap();
        backend.set_available(true);

        app.coordinator().resolve_coords(1.0, 2.0).await.unwrap();
        assert_eq!(
            app.shutdown().await.unwrap(),
            FlushOutcome::Written { records: 4 }
        );

        let persisted = backend.records();
        assert_eq!(persisted.len(), 4);
        assert!(persisted.contains_key("1.000000,2.000000"));
        assert!(persisted.contains_key("11.000000,11.000000"));
    }

    #[test]
    fn test_build_backend_variants() {
        let config = test_config();
        assert_eq!(build_backend(&config).unwrap().name(), "memory");

        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = test_config().with_backend(BackendConfig::File(temp_dir.path().join("c.json")));
        assert_eq!(build_backend(&config).unwrap().name(), "file");
    }

    #[test]
    fn test_build_backend_rejects_empty_token() {
        let config = test_config().with_backend(BackendConfig::Github(
            crate::cache::GithubConfig::new("acme", "geo-cache", ""),
        ));
        assert!(matches!(
            build_backend(&config),
            Err(AppError::Backend(_))
        ));
    }
}
