//! revgeo - rate-limited reverse geocoding with a persistent address cache
//!
//! Coordinates go through a cache-first pipeline: a two-tier
//! [`cache`] in front of a single-flight [`lookup`] coordinator, which calls
//! an external [`provider`] through a serializing [`limiter`] and turns the
//! response into an [`extract::AddressResult`].

pub mod app;
pub mod cache;
pub mod config;
pub mod coord;
pub mod extract;
pub mod limiter;
pub mod logging;
pub mod lookup;
pub mod provider;

/// Crate version, reported by the CLI and the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
