//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The one place where INI key names are mapped to struct fields.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::defaults::{VALID_BACKENDS, VALID_PROVIDERS};
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::coord::MAX_KEY_PRECISION;

/// Parses an `Ini` into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [provider]
    if let Some(section) = ini.section(Some("provider")) {
        if let Some(v) = section.get("type") {
            let v = v.trim().to_lowercase();
            if !VALID_PROVIDERS.contains(&v.as_str()) {
                return Err(invalid(
                    "provider",
                    "type",
                    &v,
                    "must be one of: nominatim, google, google_maps_page",
                ));
            }
            config.provider.provider_type = v;
        }
        if let Some(v) = non_empty(section, "api_key") {
            config.provider.api_key = Some(v);
        }
        if let Some(v) = non_empty(section, "user_agent") {
            config.provider.user_agent = v;
        }
        if let Some(v) = non_empty(section, "base_url") {
            config.provider.base_url = Some(v);
        }
        if let Some(v) = section.get("request_timeout") {
            config.provider.request_timeout =
                positive(v, "provider", "request_timeout", "must be a positive integer (seconds)")?;
        }
    }

    // [limiter]
    if let Some(section) = ini.section(Some("limiter")) {
        if let Some(v) = non_empty(section, "min_spacing_ms") {
            config.limiter.min_spacing_ms = Some(number(
                &v,
                "limiter",
                "min_spacing_ms",
                "must be a non-negative integer (milliseconds)",
            )?);
        }
        if let Some(v) = section.get("throttle_backoff_ms") {
            config.limiter.throttle_backoff_ms = number(
                v,
                "limiter",
                "throttle_backoff_ms",
                "must be a non-negative integer (milliseconds)",
            )?;
        }
        if let Some(v) = section.get("max_transport_retries") {
            config.limiter.max_transport_retries = number(
                v,
                "limiter",
                "max_transport_retries",
                "must be a non-negative integer",
            )?;
        }
    }

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("backend") {
            let v = v.trim().to_lowercase();
            if !VALID_BACKENDS.contains(&v.as_str()) {
                return Err(invalid(
                    "cache",
                    "backend",
                    &v,
                    "must be one of: file, github, memory",
                ));
            }
            config.cache.backend = v;
        }
        if let Some(v) = non_empty(section, "path") {
            config.cache.path = expand_tilde(&v);
        }
        if let Some(v) = section.get("hot_ttl") {
            config.cache.hot_ttl =
                positive(v, "cache", "hot_ttl", "must be a positive integer (seconds)")?;
        }
        if let Some(v) = section.get("hot_capacity") {
            config.cache.hot_capacity =
                positive(v, "cache", "hot_capacity", "must be a positive integer (entries)")?;
        }
        if let Some(v) = section.get("flush_interval") {
            config.cache.flush_interval =
                positive(v, "cache", "flush_interval", "must be a positive integer (seconds)")?;
        }
        if let Some(v) = non_empty(section, "github_owner") {
            config.cache.github_owner = Some(v);
        }
        if let Some(v) = non_empty(section, "github_repo") {
            config.cache.github_repo = Some(v);
        }
        if let Some(v) = non_empty(section, "github_path") {
            config.cache.github_path = v;
        }
        if let Some(v) = non_empty(section, "github_branch") {
            config.cache.github_branch = v;
        }
        if let Some(v) = non_empty(section, "github_token") {
            config.cache.github_token = Some(v);
        }
    }

    // [lookup]
    if let Some(section) = ini.section(Some("lookup")) {
        if let Some(v) = section.get("timeout") {
            config.lookup.timeout =
                positive(v, "lookup", "timeout", "must be a positive integer (seconds)")?;
        }
        if let Some(v) = section.get("key_precision") {
            let precision: u8 = number(v, "lookup", "key_precision", "must be an integer")?;
            if precision > MAX_KEY_PRECISION {
                return Err(invalid(
                    "lookup",
                    "key_precision",
                    v,
                    &format!("must be at most {}", MAX_KEY_PRECISION),
                ));
            }
            config.lookup.key_precision = precision;
        }
    }

    // [server]
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = non_empty(section, "bind") {
            if v.parse::<SocketAddr>().is_err() {
                return Err(invalid(
                    "server",
                    "bind",
                    &v,
                    "expected an address like 0.0.0.0:10000",
                ));
            }
            config.server.bind = v;
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Trimmed value, or `None` when absent or blank.
fn non_empty(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn number<T: FromStr>(
    value: &str,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn positive(value: &str, section: &str, key: &str, reason: &str) -> Result<u64, ConfigFileError> {
    match number::<u64>(value, section, key, reason)? {
        0 => Err(invalid(section, key, value, reason)),
        n => Ok(n),
    }
}

/// Expands a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
