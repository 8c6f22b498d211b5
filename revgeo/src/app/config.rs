//! Application configuration for `GeocodeApp`.
//!
//! `AppConfig` is the library-facing counterpart of the INI
//! [`ConfigFile`]: typed durations, a resolved provider and a resolved
//! durable backend.

use std::path::PathBuf;
use std::time::Duration;

use super::error::AppError;
use crate::cache::{CacheConfig, GithubConfig, DEFAULT_FLUSH_INTERVAL};
use crate::config::{ConfigFile, DEFAULT_USER_AGENT};
use crate::limiter::RateLimiterConfig;
use crate::lookup::LookupConfig;
use crate::provider::{ProviderConfig, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Where the durable tier persists its records.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Nothing survives a restart.
    Memory,
    /// Local JSON file.
    File(PathBuf),
    /// JSON file in a GitHub repository.
    Github(GithubConfig),
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Memory => "memory",
            BackendConfig::File(_) => "file",
            BackendConfig::Github(_) => "github",
        }
    }
}

/// Everything `GeocodeApp::start()` needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    /// Identifying User-Agent for provider and GitHub requests.
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub limiter: RateLimiterConfig,
    pub cache: CacheConfig,
    pub flush_interval: Duration,
    pub backend: BackendConfig,
    pub lookup: LookupConfig,
}

impl AppConfig {
    /// Default settings for `provider`, persisting through `backend`.
    ///
    /// The limiter spacing follows the provider's usage policy.
    pub fn new(provider: ProviderConfig, backend: BackendConfig) -> Self {
        let limiter = RateLimiterConfig::default().with_min_spacing(provider.default_min_spacing());
        Self {
            provider,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            limiter,
            cache: CacheConfig::default(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            backend,
            lookup: LookupConfig::default(),
        }
    }

    /// Translates a loaded `ConfigFile`.
    ///
    /// Fails when the selected provider or backend is missing a required
    /// setting (Google API key, GitHub owner/repo/token).
    pub fn from_config_file(config: &ConfigFile) -> Result<Self, AppError> {
        let provider = provider_from_settings(config)?;
        let backend = backend_from_settings(config)?;

        let min_spacing = config
            .limiter
            .min_spacing_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| provider.default_min_spacing());

        Ok(Self {
            provider,
            user_agent: config.provider.user_agent.clone(),
            request_timeout_secs: config.provider.request_timeout,
            limiter: RateLimiterConfig::default()
                .with_min_spacing(min_spacing)
                .with_throttle_backoff(Duration::from_millis(config.limiter.throttle_backoff_ms))
                .with_max_transport_retries(config.limiter.max_transport_retries),
            cache: CacheConfig {
                hot_ttl: Duration::from_secs(config.cache.hot_ttl),
                hot_capacity: config.cache.hot_capacity,
            },
            flush_interval: Duration::from_secs(config.cache.flush_interval),
            backend,
            lookup: LookupConfig::default()
                .with_timeout(Duration::from_secs(config.lookup.timeout))
                .with_key_precision(config.lookup.key_precision),
        })
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_limiter(mut self, limiter: RateLimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_lookup(mut self, lookup: LookupConfig) -> Self {
        self.lookup = lookup;
        self
    }

    /// Keeps the cache in memory only (`serve --no-persist`).
    pub fn without_persistence(self) -> Self {
        self.with_backend(BackendConfig::Memory)
    }
}

fn provider_from_settings(config: &ConfigFile) -> Result<ProviderConfig, AppError> {
    let settings = &config.provider;
    let provider = match settings.provider_type.as_str() {
        "nominatim" => ProviderConfig::nominatim(),
        "google" => match settings.api_key.as_deref() {
            Some(key) => ProviderConfig::google(key),
            None => {
                return Err(AppError::Config(
                    "provider.api_key is required when provider.type = google".to_string(),
                ))
            }
        },
        "google_maps_page" => ProviderConfig::google_maps_page(),
        other => {
            return Err(AppError::Config(format!(
                "unknown provider type '{}'",
                other
            )))
        }
    };

    Ok(match &settings.base_url {
        Some(url) => provider.with_base_url(url.clone()),
        None => provider,
    })
}

fn backend_from_settings(config: &ConfigFile) -> Result<BackendConfig, AppError> {
    let cache = &config.cache;
    match cache.backend.as_str() {
        "memory" => Ok(BackendConfig::Memory),
        "file" => Ok(BackendConfig::File(cache.path.clone())),
        "github" => {
            let (Some(owner), Some(repo)) = (&cache.github_owner, &cache.github_repo) else {
                return Err(AppError::Config(
                    "cache.github_owner and cache.github_repo are required for the github backend"
                        .to_string(),
                ));
            };
            let Some(token) = &cache.github_token else {
                return Err(AppError::Config(
                    "the github backend needs a token: set GITHUB_TOKEN or cache.github_token"
                        .to_string(),
                ));
            };
            Ok(BackendConfig::Github(
                GithubConfig::new(owner.clone(), repo.clone(), token.clone())
                    .with_path(cache.github_path.clone())
                    .with_branch(cache.github_branch.clone()),
            ))
        }
        other => Err(AppError::Config(format!(
            "unknown cache backend '{}'",
            other
        ))),
    }
}
