//! Helpers shared across CLI commands.

use std::path::Path;

use clap::ValueEnum;
use revgeo::config::ConfigFile;
use tokio::runtime::Runtime;

use crate::error::CliError;

/// Provider selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ProviderType {
    /// OpenStreetMap Nominatim (free, 1 request/second)
    Nominatim,
    /// Google Geocoding API (requires API key)
    Google,
    /// Scraped Google Maps place page (no key, best effort)
    GoogleMapsPage,
}

impl ProviderType {
    /// Name used in config.ini.
    pub fn config_name(&self) -> &'static str {
        match self {
            ProviderType::Nominatim => "nominatim",
            ProviderType::Google => "google",
            ProviderType::GoogleMapsPage => "google_maps_page",
        }
    }
}

/// Loads the config file (`--config` or the default path) with
/// environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config.with_env_overrides())
}

/// Overlays provider arguments; CLI takes precedence over the config file.
pub fn apply_provider_args(
    config: &mut ConfigFile,
    provider: Option<ProviderType>,
    api_key: Option<String>,
) {
    if let Some(provider) = provider {
        config.provider.provider_type = provider.config_name().to_string();
    }
    if let Some(key) = api_key {
        config.provider.api_key = Some(key);
    }
}

/// Multi-threaded runtime for async commands.
pub fn runtime() -> Result<Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}
