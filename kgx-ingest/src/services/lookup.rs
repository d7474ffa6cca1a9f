//! Batch lookup service abstraction
//!
//! Both normalization services answer the same shape of question: given a
//! batch of identifiers, return for each one either a record or nothing.
//! [`LookupService`] captures that so the batch normalizer, the cache and
//! the tests do not care which service is behind it.

use crate::error::LookupError;
use governor::{DefaultDirectRateLimiter, Quota};
use std::collections::HashMap;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("kgx-ingest/", env!("CARGO_PKG_VERSION"));

/// Answer of one batch request: id → record, or `None` when the service
/// knows the id but has no mapping for it
pub type BatchAnswer<R> = HashMap<String, Option<R>>;

/// Remote batch lookup
#[async_trait::async_trait]
pub trait LookupService: Send + Sync {
    /// Resolved form of one identifier
    type Record: Clone + Send + Sync + 'static;

    /// Service name for logging
    fn name(&self) -> &'static str;

    /// Issue exactly one request for `ids`
    ///
    /// Ids absent from the returned map are treated as unresolved by the
    /// caller. Any `Err` fails the whole batch.
    async fn lookup_batch(&self, ids: &[String]) -> Result<BatchAnswer<Self::Record>, LookupError>;
}

/// Minimum spacing between consecutive requests
///
/// A zero interval disables limiting.
pub(crate) struct RateLimiter {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(min_interval).map(governor::RateLimiter::direct),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Wait if necessary to comply with rate limit
    pub(crate) async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                tracing::debug!("Rate limiting: waiting for next request slot");
                limiter.until_ready().await;
            }
        }
    }
}

/// Build the shared reqwest client configuration
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, LookupError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| LookupError::Network(e.to_string()))
}

/// Map a reqwest transport error onto [`LookupError`]
pub(crate) fn map_transport_error(e: reqwest::Error, timeout: Duration) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout(timeout)
    } else {
        LookupError::Network(e.to_string())
    }
}

/// Send one GET with a repeated query parameter and decode the JSON body
pub(crate) async fn get_batch<T>(
    http_client: &reqwest::Client,
    endpoint: &str,
    param: &str,
    ids: &[String],
    timeout: Duration,
) -> Result<T, LookupError>
where
    T: serde::de::DeserializeOwned,
{
    let query: Vec<(&str, &str)> = ids.iter().map(|id| (param, id.as_str())).collect();

    let response = http_client
        .get(endpoint)
        .query(&query)
        .send()
        .await
        .map_err(|e| map_transport_error(e, timeout))?;

    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(LookupError::Status(status.as_u16(), error_text));
    }

    let body = response
        .text()
        .await
        .map_err(|e| map_transport_error(e, timeout))?;

    serde_json::from_str(&body).map_err(|e| LookupError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_rate_limiter_creation() {
        assert!(RateLimiter::new(Duration::from_millis(250)).is_enabled());
        assert!(!RateLimiter::new(Duration::ZERO).is_enabled());
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(Duration::from_millis(200));

        let start = Instant::now();
        limiter.wait().await;
        let first_elapsed = start.elapsed();
        limiter.wait().await;
        let second_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(100));
        assert!(second_elapsed >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_disabled_rate_limiter_never_waits() {
        let limiter = RateLimiter::new(Duration::ZERO);

        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
