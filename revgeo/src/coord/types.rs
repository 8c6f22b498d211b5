//! Coordinate key types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LNG: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LNG: f64 = 180.0;

/// Default number of decimals kept in a key (~0.11 m at the equator).
pub const DEFAULT_KEY_PRECISION: u8 = 6;

/// Largest supported key precision. Beyond this, f64 formatting stops being
/// meaningful for geographic coordinates.
pub const MAX_KEY_PRECISION: u8 = 9;

/// Errors produced while validating coordinate input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// A required coordinate was not supplied.
    #[error("Missing {0}")]
    Missing(&'static str),

    /// A coordinate was supplied but is not a number.
    #[error("Invalid {field}: '{value}' is not a number")]
    NotNumeric { field: &'static str, value: String },

    /// Latitude outside [-90, 90] or not finite.
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180] or not finite.
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    /// Key precision outside the supported range.
    #[error("Invalid key precision: {0} (max {MAX_KEY_PRECISION})")]
    InvalidPrecision(u8),

    /// A persisted key string could not be parsed.
    #[error("Malformed coordinate key: '{0}'")]
    MalformedKey(String),
}

/// Normalized `(lat, lng)` pair used as the cache and single-flight key.
///
/// The key is rendered with a fixed number of decimals, so the same numeric
/// input always produces the same key string. Equality and hashing operate on
/// that string, never on the raw floats.
#[derive(Debug, Clone)]
pub struct CoordinateKey {
    key: String,
    lat: f64,
    lng: f64,
}

impl CoordinateKey {
    /// Creates a key using [`DEFAULT_KEY_PRECISION`] decimals.
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordError> {
        Self::with_precision(lat, lng, DEFAULT_KEY_PRECISION)
    }

    /// Creates a key rounded to `precision` decimals.
    pub fn with_precision(lat: f64, lng: f64, precision: u8) -> Result<Self, CoordError> {
        if precision > MAX_KEY_PRECISION {
            return Err(CoordError::InvalidPrecision(precision));
        }
        if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
            return Err(CoordError::InvalidLatitude(lat));
        }
        if !lng.is_finite() || !(MIN_LNG..=MAX_LNG).contains(&lng) {
            return Err(CoordError::InvalidLongitude(lng));
        }

        let lat_str = format_fixed(lat, precision);
        let lng_str = format_fixed(lng, precision);

        // Re-read the rendered values so lat()/lng() agree with the key text.
        let lat = lat_str.parse::<f64>().unwrap_or(lat);
        let lng = lng_str.parse::<f64>().unwrap_or(lng);

        Ok(Self {
            key: format!("{},{}", lat_str, lng_str),
            lat,
            lng,
        })
    }

    /// Parses raw query-string values, e.g. from `?lat=..&lng=..`.
    ///
    /// Missing or empty values, and values that are not numbers, are rejected.
    pub fn parse(lat: Option<&str>, lng: Option<&str>, precision: u8) -> Result<Self, CoordError> {
        let lat = parse_component("lat", lat)?;
        let lng = parse_component("lng", lng)?;
        Self::with_precision(lat, lng, precision)
    }

    /// The normalized key string, `"<lat>,<lng>"`.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Normalized latitude.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Normalized longitude.
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

fn parse_component(field: &'static str, raw: Option<&str>) -> Result<f64, CoordError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let raw = raw.ok_or(CoordError::Missing(field))?;
    raw.parse::<f64>().map_err(|_| CoordError::NotNumeric {
        field,
        value: raw.to_string(),
    })
}

/// Formats with a fixed number of decimals, folding `-0.000` into `0.000`.
fn format_fixed(value: f64, precision: u8) -> String {
    let rendered = format!("{:.*}", precision as usize, value);
    match rendered.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => rendered,
    }
}

impl PartialEq for CoordinateKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CoordinateKey {}

impl Hash for CoordinateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for CoordinateKey {
    type Err = CoordError;

    /// Reads a persisted `"<lat>,<lng>"` key back, keeping its precision.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| CoordError::MalformedKey(s.to_string()))?;
        let precision = lat
            .trim()
            .split_once('.')
            .map(|(_, decimals)| decimals.len())
            .unwrap_or(0)
            .min(MAX_KEY_PRECISION as usize) as u8;
        Self::parse(Some(lat), Some(lng), precision)
            .map_err(|_| CoordError::MalformedKey(s.to_string()))
    }
}
