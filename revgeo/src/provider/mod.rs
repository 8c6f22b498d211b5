//! Reverse-geocoding provider abstraction
//!
//! This module provides traits and implementations for looking up addresses
//! from external geocoding sources (OpenStreetMap Nominatim, the Google
//! Geocoding API, the scraped Google Maps page).
//!
//! A [`GeocodeProvider`] only describes requests and the extraction strategy.
//! [`ProviderClient`] performs the calls through a shared
//! [`RateLimiter`](crate::limiter::RateLimiter).
//!
//! # Factory Pattern
//!
//! ```ignore
//! use revgeo::provider::{AsyncReqwestClient, ProviderConfig, ProviderFactory};
//!
//! let http_client = AsyncReqwestClient::new("my-app/1.0 (ops@example.com)")?;
//! let client = ProviderFactory::new(http_client)
//!     .build(&ProviderConfig::nominatim(), Default::default())?;
//! ```

mod client;
mod factory;
mod google;
mod http;
mod nominatim;
mod types;

pub use client::ProviderClient;
pub use factory::{ProviderConfig, ProviderFactory};
pub use google::{
    GoogleGeocodingProvider, GoogleMapsPageProvider, GOOGLE_GEOCODING_BASE_URL,
    GOOGLE_MAPS_PAGE_BASE_URL,
};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use nominatim::{NominatimProvider, NOMINATIM_BASE_URL, NOMINATIM_MIN_SPACING};
pub use types::{BoxFuture, GeocodeProvider, ProviderError, ReverseGeocoder};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
