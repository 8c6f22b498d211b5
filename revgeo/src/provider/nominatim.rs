//! OpenStreetMap Nominatim reverse-geocoding provider.
//!
//! Uses the public `/reverse` endpoint:
//! `https://nominatim.openstreetmap.org/reverse?format=jsonv2&lat={lat}&lon={lng}`
//!
//! The public instance allows at most one request per second and requires
//! an identifying User-Agent. Self-hosted instances can be targeted through
//! [`NominatimProvider::with_base_url`].

use std::time::Duration;

use crate::coord::CoordinateKey;
use crate::extract::Extractor;
use crate::provider::GeocodeProvider;

/// Public Nominatim endpoint.
pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Minimum spacing between calls required by the public usage policy.
pub const NOMINATIM_MIN_SPACING: Duration = Duration::from_millis(1000);

/// Nominatim reverse-geocoding provider.
#[derive(Debug, Clone)]
pub struct NominatimProvider {
    base_url: String,
    language: Option<String>,
}

impl NominatimProvider {
    /// Creates a provider for the public Nominatim instance.
    pub fn new() -> Self {
        Self::with_base_url(NOMINATIM_BASE_URL)
    }

    /// Creates a provider for a custom instance.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: None,
        }
    }

    /// Requests results in the given language (`accept-language`).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

impl Default for NominatimProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeocodeProvider for NominatimProvider {
    fn name(&self) -> &str {
        "Nominatim"
    }

    fn request_url(&self, key: &CoordinateKey) -> String {
        let mut url = format!(
            "{}/reverse?format=jsonv2&addressdetails=1&lat={}&lon={}",
            self.base_url,
            key.lat(),
            key.lng()
        );
        if let Some(language) = &self.language {
            url.push_str("&accept-language=");
            url.push_str(language);
        }
        url
    }

    fn extractor(&self) -> Extractor {
        Extractor::Structured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url() {
        let provider = NominatimProvider::new();
        let key = CoordinateKey::new(10.762622, 106.660172).unwrap();
        assert_eq!(
            provider.request_url(&key),
            "https://nominatim.openstreetmap.org/reverse?format=jsonv2&addressdetails=1&lat=10.762622&lon=106.660172"
        );
    }

    #[test]
    fn test_custom_base_url_and_language() {
        let provider = NominatimProvider::with_base_url("http://localhost:8080/").with_language("vi");
        let key = CoordinateKey::new(1.5, -2.25).unwrap();
        assert_eq!(
            provider.request_url(&key),
            "http://localhost:8080/reverse?format=jsonv2&addressdetails=1&lat=1.5&lon=-2.25&accept-language=vi"
        );
    }

    #[test]
    fn test_structured_extraction() {
        assert_eq!(NominatimProvider::new().extractor(), Extractor::Structured);
        assert_eq!(NominatimProvider::new().name(), "Nominatim");
    }
}
