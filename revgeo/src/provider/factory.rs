//! Provider factory for centralized provider creation.
//!
//! Maps a [`ProviderConfig`] to the matching provider and wires it into a
//! rate-limited [`ProviderClient`], so bootstrap code never names concrete
//! provider types.

use std::sync::Arc;
use std::time::Duration;

use super::client::ProviderClient;
use super::google::{GoogleGeocodingProvider, GoogleMapsPageProvider};
use super::http::AsyncHttpClient;
use super::nominatim::{NominatimProvider, NOMINATIM_MIN_SPACING};
use super::types::{GeocodeProvider, ProviderError};
use crate::limiter::{RateLimiter, RateLimiterConfig};

/// Configuration for creating a provider.
///
/// # Example
///
/// ```
/// use revgeo::provider::ProviderConfig;
///
/// // Public Nominatim (no API key, 1 request/second)
/// let osm = ProviderConfig::nominatim();
///
/// // Google Geocoding API (requires API key)
/// let google = ProviderConfig::google("YOUR_API_KEY");
/// assert!(google.requires_api_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// OpenStreetMap Nominatim, optionally self-hosted.
    Nominatim {
        /// Endpoint override; the public instance when `None`.
        base_url: Option<String>,
    },

    /// Google Geocoding API.
    Google {
        /// Google Maps Platform API key
        api_key: String,
        /// Endpoint override (tests).
        base_url: Option<String>,
    },

    /// Scraped Google Maps place page.
    GoogleMapsPage {
        /// Endpoint override (tests).
        base_url: Option<String>,
    },
}

impl ProviderConfig {
    pub fn nominatim() -> Self {
        Self::Nominatim { base_url: None }
    }

    pub fn google(api_key: impl Into<String>) -> Self {
        Self::Google {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn google_maps_page() -> Self {
        Self::GoogleMapsPage { base_url: None }
    }

    /// Returns the same provider pointed at a different endpoint.
    pub fn with_base_url(self, url: impl Into<String>) -> Self {
        let url = Some(url.into());
        match self {
            Self::Nominatim { .. } => Self::Nominatim { base_url: url },
            Self::Google { api_key, .. } => Self::Google {
                api_key,
                base_url: url,
            },
            Self::GoogleMapsPage { .. } => Self::GoogleMapsPage { base_url: url },
        }
    }

    /// Returns the provider name for this configuration.
    pub fn name(&self) -> &str {
        match self {
            Self::Nominatim { .. } => "Nominatim",
            Self::Google { .. } => "Google Geocoding",
            Self::GoogleMapsPage { .. } => "Google Maps Page",
        }
    }

    /// Returns whether this provider requires an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Google { .. })
    }

    /// Call spacing the provider's usage policy asks for.
    pub fn default_min_spacing(&self) -> Duration {
        match self {
            Self::Nominatim { .. } | Self::GoogleMapsPage { .. } => NOMINATIM_MIN_SPACING,
            Self::Google { .. } => Duration::ZERO,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::nominatim()
    }
}

/// Factory for creating provider instances.
///
/// # Example
///
/// ```ignore
/// use revgeo::provider::{AsyncReqwestClient, ProviderConfig, ProviderFactory};
/// use revgeo::limiter::RateLimiterConfig;
///
/// let http = AsyncReqwestClient::new("my-app/1.0 (ops@example.com)")?;
/// let client = ProviderFactory::new(http).build(&ProviderConfig::nominatim(), RateLimiterConfig::default())?;
/// ```
pub struct ProviderFactory<C: AsyncHttpClient> {
    http_client: C,
}

impl<C: AsyncHttpClient> ProviderFactory<C> {
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }

    /// Creates the provider described by `config`.
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn GeocodeProvider>, ProviderError> {
        let provider: Arc<dyn GeocodeProvider> = match config {
            ProviderConfig::Nominatim { base_url } => Arc::new(match base_url {
                Some(url) => NominatimProvider::with_base_url(url.clone()),
                None => NominatimProvider::new(),
            }),
            ProviderConfig::Google { api_key, base_url } => {
                if api_key.trim().is_empty() {
                    return Err(ProviderError::Config(
                        "Google Geocoding requires an API key".to_string(),
                    ));
                }
                let provider = GoogleGeocodingProvider::new(api_key.clone());
                Arc::new(match base_url {
                    Some(url) => provider.with_base_url(url.clone()),
                    None => provider,
                })
            }
            ProviderConfig::GoogleMapsPage { base_url } => Arc::new(match base_url {
                Some(url) => GoogleMapsPageProvider::with_base_url(url.clone()),
                None => GoogleMapsPageProvider::new(),
            }),
        };
        Ok(provider)
    }

    /// Creates the provider and a client that calls it through a fresh
    /// limiter built from `limiter_config`.
    pub fn build(
        self,
        config: &ProviderConfig,
        limiter_config: RateLimiterConfig,
    ) -> Result<ProviderClient<C>, ProviderError> {
        let provider = Self::create(config)?;
        let limiter = Arc::new(RateLimiter::new(limiter_config));
        Ok(ProviderClient::new(self.http_client, provider, limiter))
    }
}
