//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use tracing::{trace, warn};

use super::types::ProviderError;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Trait for async HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request with extra headers.
    ///
    /// Non-success statuses are returned as errors classified by
    /// [`ProviderError::from_status`].
    fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Performs an HTTP PUT with a JSON body and returns the response body.
    fn put_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Performs an HTTP GET request.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send {
        self.get_with_headers(url, &[])
    }
}

/// Real async HTTP client implementation using reqwest.
///
/// Every request carries the configured `User-Agent`; public geocoding
/// services refuse anonymous traffic.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with the given identifying user agent.
    pub fn new(user_agent: &str) -> Result<Self, ProviderError> {
        Self::with_timeout(user_agent, DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(user_agent: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        if user_agent.trim().is_empty() {
            return Err(ProviderError::Config(
                "a non-empty User-Agent is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = redact_url(url);
        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            warn!(
                url = url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            ProviderError::Transport(format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            trace!(url = url, status = status.as_u16(), "Non-success status");
            return Err(ProviderError::from_status(status.as_u16(), url));
        }

        let bytes = response.bytes().await.map_err(|e| {
            let e = e.without_url();
            warn!(url = url, error = %e, "Failed to read response body");
            ProviderError::Transport(format!("Failed to read response: {}", e))
        })?;

        trace!(url = url, bytes = bytes.len(), "HTTP request completed");
        Ok(bytes.to_vec())
    }
}

/// Strips the query string, which may carry an API key.
pub(crate) fn redact_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<Vec<u8>, ProviderError> {
        trace!(url = redact_url(url), "HTTP GET");
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        self.send(request, url).await
    }

    async fn put_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<Vec<u8>, ProviderError> {
        trace!(url = redact_url(url), "HTTP PUT");
        let payload = serde_json::to_vec(body)
            .map_err(|e| ProviderError::Config(format!("Failed to encode body: {}", e)))?;
        let mut request = self
            .client
            .put(url)
            .header("Content-Type", "application/json")
            .body(payload);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        self.send(request, url).await
    }
}
