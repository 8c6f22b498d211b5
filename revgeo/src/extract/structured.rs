//! Direct field mapping for JSON geocoding responses.
//!
//! Two response families are understood:
//!
//! - Nominatim style: `{"display_name": "...", "address": {"road": "...", ...}}`
//! - Google Geocoding style: `{"status": "OK", "results": [{"formatted_address":
//!   "...", "address_components": [...]}], "plus_code": {...}}`
//! - A flat `{"formatted_address": "..."}`, as single-result proxies return
//!
//! Every field is optional. Missing fields become `None` or an empty map.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::{AddressResult, ExtractionError};
use crate::coord::PlusCode;

#[derive(Debug, Default, Deserialize)]
struct StructuredResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    address: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    plus_code: Option<RawPlusCode>,
}

#[derive(Debug, Default, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    #[serde(default)]
    plus_code: Option<RawPlusCode>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlusCode {
    global_code: String,
    #[serde(default)]
    compound_code: Option<String>,
}

/// Google statuses that mean "valid answer, nothing found".
const EMPTY_STATUSES: [&str; 1] = ["ZERO_RESULTS"];

pub(super) fn parse(payload: &[u8]) -> Result<AddressResult, ExtractionError> {
    let response: StructuredResponse = serde_json::from_slice(payload)
        .map_err(|e| ExtractionError::Malformed(format!("invalid JSON: {}", e)))?;

    if let Some(error) = response.error {
        let message = match error {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(ExtractionError::ProviderReported(message));
    }

    if let Some(status) = response.status.as_deref() {
        if status != "OK" && !EMPTY_STATUSES.contains(&status) {
            let message = response
                .error_message
                .clone()
                .unwrap_or_else(|| status.to_string());
            return Err(ExtractionError::ProviderReported(message));
        }
    }

    let first = response.results.into_iter().next().unwrap_or_default();

    let display_name = non_empty(response.display_name)
        .or_else(|| non_empty(response.formatted_address))
        .or_else(|| non_empty(first.formatted_address));

    let mut address_components = BTreeMap::new();
    if let Some(address) = response.address {
        for (name, value) in address {
            // Nominatim mixes strings with occasional nested values; keep text only
            if let Value::String(text) = value {
                if !text.trim().is_empty() {
                    address_components.insert(name, text);
                }
            }
        }
    }
    for component in first.address_components {
        if let Some(kind) = component.types.into_iter().find(|t| t != "political") {
            address_components.entry(kind).or_insert(component.long_name);
        }
    }

    let plus_code = response
        .plus_code
        .or(first.plus_code)
        .map(|raw| PlusCode {
            global: raw.global_code,
            compound: non_empty(raw.compound_code),
        });

    Ok(AddressResult {
        display_name,
        address_components,
        plus_code,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
