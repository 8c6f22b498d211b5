//! Provider response extraction.
//!
//! Providers answer in one of two shapes: a typed JSON document
//! ([`Extractor::Structured`]) or a rendered HTML page that has to be
//! searched for an anchored marker ([`Extractor::HtmlScraped`]). Both are
//! normalized into the same [`AddressResult`].
//!
//! Extraction is a pure function of `(payload, key)`: no network access, no
//! clock. An unstructured page without a recognizable marker is a valid
//! partial result, not an error.
//!
//! # Example
//!
//! ```
//! use revgeo::coord::CoordinateKey;
//! use revgeo::extract::Extractor;
//!
//! let key = CoordinateKey::new(40.7128, -74.006).unwrap();
//! let page = br#"<script>{"formatted_address":"123 Main St"}</script>"#;
//! let result = Extractor::HtmlScraped.parse(page, &key).unwrap();
//! assert_eq!(result.display_name.as_deref(), Some("123 Main St"));
//! ```

mod html;
mod structured;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::{CoordinateKey, PlusCode};

/// Canonical reverse-geocoding result.
///
/// Immutable once constructed; shared between cache tiers behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResult {
    /// Human-readable address, or `None` when the provider gave nothing usable.
    pub display_name: Option<String>,
    /// Named address parts (road, city, postcode, ...).
    #[serde(default)]
    pub address_components: BTreeMap<String, String>,
    /// Plus code pair, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plus_code: Option<PlusCode>,
}

impl AddressResult {
    /// True when neither a display name nor any component was extracted.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.address_components.is_empty()
    }
}

/// Hard extraction failures.
///
/// An absent marker is NOT one of these; it yields an empty result instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    /// The payload is not in the shape the extractor expects (e.g. not JSON).
    #[error("Malformed provider payload: {0}")]
    Malformed(String),

    /// The provider answered with an explicit error object.
    #[error("Provider reported an error: {0}")]
    ProviderReported(String),

    /// The plus code for the key could not be computed.
    #[error("Cannot encode plus code: {0}")]
    PlusCode(String),
}

/// Extraction strategy, selected per provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Direct field mapping from a JSON document.
    Structured,
    /// Anchored pattern search over an HTML page.
    HtmlScraped,
}

impl Extractor {
    /// Parses a raw provider payload for `key`.
    pub fn parse(
        &self,
        payload: &[u8],
        key: &CoordinateKey,
    ) -> Result<AddressResult, ExtractionError> {
        match self {
            Extractor::Structured => structured::parse(payload),
            Extractor::HtmlScraped => {
                let plus_code = PlusCode::for_key(key)
                    .map_err(|e| ExtractionError::PlusCode(e.to_string()))?;
                Ok(html::parse(payload, plus_code))
            }
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Extractor::Structured => "structured",
            Extractor::HtmlScraped => "html",
        }
    }
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decodes the body of a JSON string literal captured from a page.
///
/// Falls back to the raw text when the capture is not a valid JSON string.
pub(crate) fn decode_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}
