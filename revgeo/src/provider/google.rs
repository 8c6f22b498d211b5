//! Google reverse-geocoding providers.
//!
//! Two flavours are supported:
//!
//! - [`GoogleGeocodingProvider`]: the official Geocoding API. Requires an API
//!   key with the Geocoding API enabled. Answers with JSON.
//! - [`GoogleMapsPageProvider`]: the public `maps/place` page for a
//!   coordinate. No key, but the answer is an HTML page that has to be
//!   scraped for the address marker.
//!
//! # API Endpoints
//!
//! - Geocoding API: `https://maps.googleapis.com/maps/api/geocode/json?latlng={lat},{lng}&key={API_KEY}`
//! - Maps page: `https://www.google.com/maps/place/{lat},{lng}`

use serde::Deserialize;

use crate::coord::CoordinateKey;
use crate::extract::Extractor;
use crate::provider::{GeocodeProvider, ProviderError};

/// Geocoding API endpoint.
pub const GOOGLE_GEOCODING_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Maps place page endpoint.
pub const GOOGLE_MAPS_PAGE_BASE_URL: &str = "https://www.google.com/maps/place";

/// Google Geocoding API provider.
///
/// Google Maps Platform is a paid service with per-key quotas, so no
/// minimum call spacing is imposed by default.
pub struct GoogleGeocodingProvider {
    api_key: String,
    base_url: String,
}

impl GoogleGeocodingProvider {
    /// Creates a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GOOGLE_GEOCODING_BASE_URL.to_string(),
        }
    }

    /// Overrides the endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// Keep the key out of debug output.
impl std::fmt::Debug for GoogleGeocodingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleGeocodingProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct StatusOnly {
    #[serde(default)]
    status: Option<String>,
}

impl GeocodeProvider for GoogleGeocodingProvider {
    fn name(&self) -> &str {
        "Google Geocoding"
    }

    fn request_url(&self, key: &CoordinateKey) -> String {
        format!(
            "{}?latlng={},{}&key={}",
            self.base_url,
            key.lat(),
            key.lng(),
            self.api_key
        )
    }

    fn extractor(&self) -> Extractor {
        Extractor::Structured
    }

    /// The Geocoding API reports quota exhaustion in-band with HTTP 200.
    fn check_payload(&self, payload: &[u8]) -> Result<(), ProviderError> {
        let status = serde_json::from_slice::<StatusOnly>(payload)
            .ok()
            .and_then(|s| s.status);
        match status.as_deref() {
            Some("OVER_QUERY_LIMIT") => Err(ProviderError::Throttled(
                "Geocoding API status OVER_QUERY_LIMIT".to_string(),
            )),
            Some("UNKNOWN_ERROR") => Err(ProviderError::Transport(
                "Geocoding API status UNKNOWN_ERROR".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Scraped Google Maps page provider.
///
/// The page is fetched like a browser would and searched for an anchored
/// address marker. See [`Extractor::HtmlScraped`].
#[derive(Debug, Clone)]
pub struct GoogleMapsPageProvider {
    base_url: String,
}

impl GoogleMapsPageProvider {
    /// Creates a provider for the public maps page.
    pub fn new() -> Self {
        Self {
            base_url: GOOGLE_MAPS_PAGE_BASE_URL.to_string(),
        }
    }

    /// Overrides the endpoint (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for GoogleMapsPageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeocodeProvider for GoogleMapsPageProvider {
    fn name(&self) -> &str {
        "Google Maps Page"
    }

    fn request_url(&self, key: &CoordinateKey) -> String {
        format!("{}/{},{}", self.base_url, key.lat(), key.lng())
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![("Accept-Language", "en-US,en;q=0.9".to_string())]
    }

    fn extractor(&self) -> Extractor {
        Extractor::HtmlScraped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CoordinateKey {
        CoordinateKey::new(10.9197, 106.7353).unwrap()
    }

    #[test]
    fn test_geocoding_url() {
        let provider = GoogleGeocodingProvider::new("KEY123");
        assert_eq!(
            provider.request_url(&key()),
            "https://maps.googleapis.com/maps/api/geocode/json?latlng=10.9197,106.7353&key=KEY123"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let provider = GoogleGeocodingProvider::new("SECRET");
        assert!(!format!("{:?}", provider).contains("SECRET"));
    }

    #[test]
    fn test_over_query_limit_is_throttle() {
        let provider = GoogleGeocodingProvider::new("k");
        let err = provider
            .check_payload(br#"{"results": [], "status": "OVER_QUERY_LIMIT"}"#)
            .unwrap_err();
        assert!(err.is_throttle());
    }

    #[test]
    fn test_ok_and_html_payloads_pass_check() {
        let provider = GoogleGeocodingProvider::new("k");
        assert!(provider.check_payload(br#"{"status": "OK"}"#).is_ok());
        // Not JSON: left for the extractor to reject
        assert!(provider.check_payload(b"<html>").is_ok());
    }

    #[test]
    fn test_maps_page_url() {
        let provider = GoogleMapsPageProvider::new();
        assert_eq!(
            provider.request_url(&key()),
            "https://www.google.com/maps/place/10.9197,106.7353"
        );
        assert_eq!(provider.extractor(), Extractor::HtmlScraped);
    }
}
