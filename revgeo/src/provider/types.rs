//! Provider types and traits

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::coord::CoordinateKey;
use crate::extract::{AddressResult, ExtractionError, Extractor};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider signalled rate limiting (HTTP 429 or an in-band equivalent).
    Throttled(String),
    /// Transport-level failure: timeout, connection reset, 5xx.
    Transport(String),
    /// Provider refused the request with a non-retryable status.
    Rejected { status: u16, message: String },
    /// Transport retries exhausted.
    Unavailable { attempts: u32, last_error: String },
    /// Payload could not be turned into a result.
    Extraction(ExtractionError),
    /// Client or provider misconfiguration.
    Config(String),
}

impl ProviderError {
    /// True for throttling signals, which are retried without limit.
    pub fn is_throttle(&self) -> bool {
        matches!(self, ProviderError::Throttled(_))
    }

    /// True for failures worth retrying a bounded number of times.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }

    /// Classifies an HTTP status that was not a success.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            429 => ProviderError::Throttled(format!("HTTP 429 from {}", context)),
            500..=599 => ProviderError::Transport(format!("HTTP {} from {}", status, context)),
            _ => ProviderError::Rejected {
                status,
                message: format!("HTTP {} from {}", status, context),
            },
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Throttled(msg) => write!(f, "Provider throttled: {}", msg),
            ProviderError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ProviderError::Rejected { status, message } => {
                write!(f, "Provider rejected request ({}): {}", status, message)
            }
            ProviderError::Unavailable {
                attempts,
                last_error,
            } => write!(
                f,
                "Provider unavailable after {} attempts: {}",
                attempts, last_error
            ),
            ProviderError::Extraction(e) => write!(f, "Extraction failed: {}", e),
            ProviderError::Config(msg) => write!(f, "Provider configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ExtractionError> for ProviderError {
    fn from(e: ExtractionError) -> Self {
        ProviderError::Extraction(e)
    }
}

/// Describes one reverse-geocoding source.
///
/// A provider is pure description: how to build the request for a key, which
/// headers to send, and which extraction strategy reads the answer. The
/// actual I/O is done by [`ProviderClient`](super::ProviderClient).
pub trait GeocodeProvider: Send + Sync {
    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;

    /// Builds the request URL for a coordinate.
    fn request_url(&self, key: &CoordinateKey) -> String;

    /// Extra request headers (the User-Agent is set by the HTTP client).
    fn headers(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Extraction strategy for this provider's payloads.
    fn extractor(&self) -> Extractor;

    /// Inspects a successful body for in-band failure signals, e.g. an API
    /// that answers HTTP 200 with `"status": "OVER_QUERY_LIMIT"`.
    fn check_payload(&self, _payload: &[u8]) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Anything that can resolve a coordinate into an address.
///
/// Implemented by [`ProviderClient`](super::ProviderClient); the lookup
/// coordinator depends only on this trait.
pub trait ReverseGeocoder: Send + Sync {
    /// Fetches and extracts the address for `key`.
    fn reverse<'a>(
        &'a self,
        key: &'a CoordinateKey,
    ) -> BoxFuture<'a, Result<AddressResult, ProviderError>>;

    /// Name of the underlying provider.
    fn name(&self) -> &str;
}
