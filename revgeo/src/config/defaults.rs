//! Default values for every configuration setting and the
//! `ConfigFile::default()` implementation.

use super::file::default_cache_path;
use super::settings::*;
use crate::cache::{DEFAULT_FLUSH_INTERVAL, DEFAULT_HOT_CAPACITY, DEFAULT_HOT_TTL};
use crate::coord::DEFAULT_KEY_PRECISION;
use crate::limiter::{DEFAULT_MAX_TRANSPORT_RETRIES, DEFAULT_THROTTLE_BACKOFF};
use crate::lookup::DEFAULT_LOOKUP_TIMEOUT;
use crate::provider::DEFAULT_REQUEST_TIMEOUT_SECS;

pub const DEFAULT_PROVIDER_TYPE: &str = "nominatim";

/// Sent when no `user_agent` is configured. Public Nominatim asks operators
/// to add contact details, so deployments should override it.
pub const DEFAULT_USER_AGENT: &str = concat!("revgeo/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_CACHE_BACKEND: &str = "file";
pub const DEFAULT_GITHUB_PATH: &str = "cache.json";
pub const DEFAULT_GITHUB_BRANCH: &str = "main";

pub const DEFAULT_BIND: &str = "0.0.0.0:10000";

pub const VALID_PROVIDERS: [&str; 3] = ["nominatim", "google", "google_maps_page"];
pub const VALID_BACKENDS: [&str; 3] = ["file", "github", "memory"];

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            provider: ProviderSettings {
                provider_type: DEFAULT_PROVIDER_TYPE.to_string(),
                api_key: None,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                base_url: None,
                request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            limiter: LimiterSettings {
                min_spacing_ms: None,
                throttle_backoff_ms: DEFAULT_THROTTLE_BACKOFF.as_millis() as u64,
                max_transport_retries: DEFAULT_MAX_TRANSPORT_RETRIES,
            },
            cache: CacheSettings {
                backend: DEFAULT_CACHE_BACKEND.to_string(),
                path: default_cache_path(),
                hot_ttl: DEFAULT_HOT_TTL.as_secs(),
                hot_capacity: DEFAULT_HOT_CAPACITY,
                flush_interval: DEFAULT_FLUSH_INTERVAL.as_secs(),
                github_owner: None,
                github_repo: None,
                github_path: DEFAULT_GITHUB_PATH.to_string(),
                github_branch: DEFAULT_GITHUB_BRANCH.to_string(),
                github_token: None,
            },
            lookup: LookupSettings {
                timeout: DEFAULT_LOOKUP_TIMEOUT.as_secs(),
                key_precision: DEFAULT_KEY_PRECISION,
            },
            server: ServerSettings {
                bind: DEFAULT_BIND.to_string(),
            },
        }
    }
}
