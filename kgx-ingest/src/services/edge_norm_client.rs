//! Predicate (edge) normalization service client
//!
//! `GET <endpoint>?predicate=<rel1>&predicate=<rel2>&...` answers with a
//! JSON object keyed by the submitted relations, each value either `null`
//! or `{"identifier": "biolink:...", "label": "..."}`.

use crate::error::LookupError;
use crate::models::PredicateRecord;
use crate::services::lookup::{build_http_client, get_batch, BatchAnswer, LookupService, RateLimiter};
use kgx_common::config::NormalizationConfig;
use std::time::Duration;

/// Predicate normalization API client
pub struct EdgeNormClient {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    rate_limiter: RateLimiter,
}

impl EdgeNormClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        min_interval: Duration,
    ) -> Result<Self, LookupError> {
        let endpoint = endpoint.into();
        let rate_limiter = RateLimiter::new(min_interval);
        tracing::debug!(endpoint = %endpoint, rate_limited = rate_limiter.is_enabled(), "Edge normalization client ready");

        Ok(Self {
            http_client: build_http_client(timeout)?,
            endpoint,
            timeout,
            rate_limiter,
        })
    }

    pub fn from_config(config: &NormalizationConfig) -> Result<Self, LookupError> {
        Self::new(
            config.edge_endpoint.clone(),
            config.request_timeout(),
            Duration::from_millis(config.min_request_interval_ms),
        )
    }
}

#[async_trait::async_trait]
impl LookupService for EdgeNormClient {
    type Record = PredicateRecord;

    fn name(&self) -> &'static str {
        "edge-normalization"
    }

    async fn lookup_batch(&self, ids: &[String]) -> Result<BatchAnswer<PredicateRecord>, LookupError> {
        self.rate_limiter.wait().await;

        tracing::debug!(endpoint = %self.endpoint, relations = ids.len(), "Querying edge normalization");

        get_batch(&self.http_client, &self.endpoint, "predicate", ids, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn test_lookup_predicates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("predicate", "RO:0002434"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "RO:0002434": {"identifier": "biolink:interacts_with", "label": "interacts with"},
                "subClassOf": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = EdgeNormClient::new(server.uri(), Duration::from_secs(5), Duration::ZERO).unwrap();
        let answer = client
            .lookup_batch(&["RO:0002434".to_string(), "subClassOf".to_string()])
            .await
            .unwrap();

        assert_eq!(
            answer["RO:0002434"],
            Some(PredicateRecord {
                identifier: "biolink:interacts_with".to_string(),
                label: Some("interacts with".to_string()),
            })
        );
        assert_eq!(answer["subClassOf"], None);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = EdgeNormClient::new(server.uri(), Duration::from_secs(5), Duration::ZERO).unwrap();
        let err = client.lookup_batch(&["RO:1".to_string()]).await.unwrap_err();
        assert!(err.is_transient());
    }
}
