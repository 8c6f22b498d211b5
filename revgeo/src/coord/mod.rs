//! Coordinate normalization and plus-code encoding.
//!
//! [`CoordinateKey`] is the identity of a lookup: the cache, the durable
//! record map and the single-flight registry are all keyed by it. The key is
//! a fixed-decimal string, so equality never depends on float comparison.
//!
//! ```
//! use revgeo::coord::CoordinateKey;
//!
//! let key = CoordinateKey::new(10.762622, 106.660172).unwrap();
//! assert_eq!(key.as_str(), "10.762622,106.660172");
//! ```

mod plus_code;
mod types;

pub use plus_code::{encode_plus_code, DEFAULT_CODE_LENGTH};
pub use types::{
    CoordError, CoordinateKey, DEFAULT_KEY_PRECISION, MAX_KEY_PRECISION, MAX_LAT, MAX_LNG,
    MIN_LAT, MIN_LNG,
};

use serde::{Deserialize, Serialize};

/// Open Location Code pair attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlusCode {
    /// Full global code, e.g. `7P28WP9P+V4`.
    pub global: String,
    /// Short code plus locality as reported by the provider, if any.
    pub compound: Option<String>,
}

impl PlusCode {
    /// Computes the global code for a key at the standard length.
    pub fn for_key(key: &CoordinateKey) -> Result<Self, CoordError> {
        Ok(Self {
            global: encode_plus_code(key.lat(), key.lng(), DEFAULT_CODE_LENGTH)?,
            compound: None,
        })
    }

    /// Returns a copy carrying the given compound code.
    pub fn with_compound(mut self, compound: Option<String>) -> Self {
        self.compound = compound;
        self
    }
}
