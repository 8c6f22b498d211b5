//! Rate-limited provider client.

use std::sync::Arc;

use tracing::{debug, warn};

use super::http::AsyncHttpClient;
use super::types::{BoxFuture, GeocodeProvider, ProviderError, ReverseGeocoder};
use crate::coord::CoordinateKey;
use crate::extract::AddressResult;
use crate::limiter::RateLimiter;

/// Fetches addresses from one provider through a shared [`RateLimiter`].
///
/// The client is stateless apart from its collaborators: every call builds
/// the request from the key, runs it under the limiter and hands the body
/// to the provider's extractor.
pub struct ProviderClient<C: AsyncHttpClient> {
    http: C,
    provider: Arc<dyn GeocodeProvider>,
    limiter: Arc<RateLimiter>,
}

impl<C: AsyncHttpClient> ProviderClient<C> {
    pub fn new(http: C, provider: Arc<dyn GeocodeProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            provider,
            limiter,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Looks up one coordinate.
    ///
    /// Throttling and transport retries happen inside the limiter. Provider
    /// error bodies and extraction details are logged, not returned verbatim
    /// to callers further up.
    pub async fn fetch(&self, key: &CoordinateKey) -> Result<AddressResult, ProviderError> {
        let url = self.provider.request_url(key);
        let headers = self.provider.headers();

        let http = &self.http;
        let provider = &self.provider;
        let url_ref = url.as_str();
        let headers_ref = headers.as_slice();

        let payload = self
            .limiter
            .schedule(move || async move {
                let body = http.get_with_headers(url_ref, headers_ref).await?;
                provider.check_payload(&body)?;
                Ok(body)
            })
            .await
            .map_err(|e| {
                warn!(
                    provider = self.provider.name(),
                    key = %key,
                    error = %e,
                    "Provider call failed"
                );
                e
            })?;

        let extractor = self.provider.extractor();
        let result = extractor.parse(&payload, key).map_err(|e| {
            warn!(
                provider = self.provider.name(),
                extractor = %extractor,
                key = %key,
                error = %e,
                "Extraction failed"
            );
            ProviderError::from(e)
        })?;

        debug!(
            provider = self.provider.name(),
            key = %key,
            has_display_name = result.display_name.is_some(),
            components = result.address_components.len(),
            "Provider lookup complete"
        );

        Ok(result)
    }
}

impl<C: AsyncHttpClient> ReverseGeocoder for ProviderClient<C> {
    fn reverse<'a>(
        &'a self,
        key: &'a CoordinateKey,
    ) -> BoxFuture<'a, Result<AddressResult, ProviderError>> {
        Box::pin(self.fetch(key))
    }

    fn name(&self) -> &str {
        self.provider_name()
    }
}
