//! Application error types.

use std::fmt;

use crate::cache::StoreError;
use crate::provider::ProviderError;

/// Errors that can occur while starting the application.
#[derive(Debug)]
pub enum AppError {
    /// The durable backend could not be constructed.
    Backend(StoreError),

    /// The HTTP client or provider could not be constructed.
    Provider(ProviderError),

    /// Configuration error.
    Config(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Backend(e) => write!(f, "Failed to set up cache backend: {}", e),
            AppError::Provider(e) => write!(f, "Failed to set up provider: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Backend(e) => Some(e),
            AppError::Provider(e) => Some(e),
            AppError::Config(_) => None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Backend(e)
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        AppError::Provider(e)
    }
}
