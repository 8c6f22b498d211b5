//! Settings structs, one per `[section]` of `config.ini`.
//!
//! Pure data: parsing lives in `parser`, serialization in `writer`.

use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub provider: ProviderSettings,
    pub limiter: LimiterSettings,
    pub cache: CacheSettings,
    pub lookup: LookupSettings,
    pub server: ServerSettings,
}

/// `[provider]`
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// "nominatim", "google" or "google_maps_page"
    pub provider_type: String,
    /// Only used by "google"
    pub api_key: Option<String>,
    /// Identifying User-Agent sent with every provider request
    pub user_agent: String,
    /// Endpoint override, e.g. a self-hosted Nominatim
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
}

/// `[limiter]`
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterSettings {
    /// Minimum gap between provider calls; `None` uses the provider's default.
    pub min_spacing_ms: Option<u64>,
    pub throttle_backoff_ms: u64,
    pub max_transport_retries: u32,
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// "file", "github" or "memory"
    pub backend: String,
    /// JSON file used by the "file" backend
    pub path: PathBuf,
    /// Hot tier entry lifetime in seconds
    pub hot_ttl: u64,
    /// Hot tier capacity in entries
    pub hot_capacity: u64,
    /// Seconds between background flushes
    pub flush_interval: u64,
    pub github_owner: Option<String>,
    pub github_repo: Option<String>,
    pub github_path: String,
    pub github_branch: String,
    pub github_token: Option<String>,
}

/// `[lookup]`
#[derive(Debug, Clone, PartialEq)]
pub struct LookupSettings {
    /// Overall deadline in seconds
    pub timeout: u64,
    /// Decimal places kept in cache keys
    pub key_precision: u8,
}

/// `[server]`
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Listen address, `host:port`
    pub bind: String,
}
