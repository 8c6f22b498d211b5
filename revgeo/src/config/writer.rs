//! INI serialization: `ConfigFile` → the commented text written to
//! `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Renders a `ConfigFile` as a commented INI string.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let api_key = config.provider.api_key.as_deref().unwrap_or("");
    let base_url = config.provider.base_url.as_deref().unwrap_or("");
    let min_spacing_ms = config
        .limiter
        .min_spacing_ms
        .map(|ms| ms.to_string())
        .unwrap_or_default();
    let github_owner = config.cache.github_owner.as_deref().unwrap_or("");
    let github_repo = config.cache.github_repo.as_deref().unwrap_or("");
    let github_token = config.cache.github_token.as_deref().unwrap_or("");

    format!(
        r#"[provider]
; Reverse geocoding provider:
;   nominatim        - OpenStreetMap Nominatim (free, max 1 request/second)
;   google           - Google Geocoding API (paid, requires api_key)
;   google_maps_page - scraped Google Maps place page (free, best effort)
type = {}
; API key (only required when type = google)
api_key = {}
; User-Agent sent with every request. Public Nominatim requires one that
; identifies your application, ideally with contact details.
user_agent = {}
; Endpoint override, e.g. a self-hosted Nominatim (empty = provider default)
base_url = {}
; Per-request timeout in seconds
request_timeout = {}

[limiter]
; Minimum milliseconds between provider calls, measured start to start.
; Empty = provider default (1000 for nominatim and google_maps_page, 0 for google)
min_spacing_ms = {}
; Pause after the provider signals throttling (HTTP 429)
throttle_backoff_ms = {}
; Retries after connection errors or 5xx responses before giving up
max_transport_retries = {}

[cache]
; Durable tier backend:
;   file   - JSON file at `path`
;   github - JSON file committed to a GitHub repository
;   memory - nothing persisted across restarts
backend = {}
path = {}
; Seconds an entry stays in the in-memory hot tier
hot_ttl = {}
; Maximum entries held in the hot tier
hot_capacity = {}
; Seconds between background flushes of new entries
flush_interval = {}
; GitHub backend. The GITHUB_TOKEN environment variable overrides github_token.
github_owner = {}
github_repo = {}
github_path = {}
github_branch = {}
github_token = {}

[lookup]
; Seconds a lookup may take, queueing included
timeout = {}
; Decimal places kept when normalizing coordinates into cache keys
key_precision = {}

[server]
; Listen address for `revgeo serve`. The PORT environment variable overrides the port.
bind = {}
"#,
        config.provider.provider_type,
        api_key,
        config.provider.user_agent,
        base_url,
        config.provider.request_timeout,
        min_spacing_ms,
        config.limiter.throttle_backoff_ms,
        config.limiter.max_transport_retries,
        config.cache.backend,
        path_to_string(&config.cache.path),
        config.cache.hot_ttl,
        config.cache.hot_capacity,
        config.cache.flush_interval,
        github_owner,
        github_repo,
        config.cache.github_path,
        config.cache.github_branch,
        github_token,
        config.lookup.timeout,
        config.lookup.key_precision,
        config.server.bind,
    )
}

/// Writes paths under the home directory with a `~` prefix.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}
