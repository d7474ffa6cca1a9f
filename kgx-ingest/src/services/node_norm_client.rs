//! Node normalization service client
//!
//! `GET <endpoint>?curie=<id1>&curie=<id2>&...`
//!
//! A 200 response is a JSON object keyed by the submitted curies. Each
//! value is either `null` or
//! `{"id": {"identifier", "label"?}, "type"?: [..], "equivalent_identifiers"?: [{"identifier"}]}`.
//! Any other status fails the whole batch.

use crate::error::LookupError;
use crate::models::NormalizationRecord;
use crate::services::lookup::{build_http_client, get_batch, BatchAnswer, LookupService, RateLimiter};
use kgx_common::config::NormalizationConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Identifier object in a normalization response
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizedId {
    pub identifier: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// One non-null entry of a normalization response
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizedNode {
    pub id: NormalizedId,
    #[serde(rename = "type", default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub equivalent_identifiers: Option<Vec<NormalizedId>>,
}

impl From<NormalizedNode> for NormalizationRecord {
    fn from(node: NormalizedNode) -> Self {
        let record = NormalizationRecord::new(node.id.identifier)
            .with_categories(node.types.unwrap_or_default())
            .with_equivalent_identifiers(
                node.equivalent_identifiers
                    .unwrap_or_default()
                    .into_iter()
                    .map(|e| e.identifier),
            );

        match node.id.label {
            Some(label) => record.with_label(label),
            None => record,
        }
    }
}

/// Node normalization API client
pub struct NodeNormClient {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    rate_limiter: RateLimiter,
}

impl NodeNormClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        min_interval: Duration,
    ) -> Result<Self, LookupError> {
        let endpoint = endpoint.into();
        let rate_limiter = RateLimiter::new(min_interval);
        tracing::debug!(endpoint = %endpoint, rate_limited = rate_limiter.is_enabled(), "Node normalization client ready");

        Ok(Self {
            http_client: build_http_client(timeout)?,
            endpoint,
            timeout,
            rate_limiter,
        })
    }

    pub fn from_config(config: &NormalizationConfig) -> Result<Self, LookupError> {
        Self::new(
            config.node_endpoint.clone(),
            config.request_timeout(),
            Duration::from_millis(config.min_request_interval_ms),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl LookupService for NodeNormClient {
    type Record = NormalizationRecord;

    fn name(&self) -> &'static str {
        "node-normalization"
    }

    async fn lookup_batch(&self, ids: &[String]) -> Result<BatchAnswer<NormalizationRecord>, LookupError> {
        self.rate_limiter.wait().await;

        tracing::debug!(endpoint = %self.endpoint, ids = ids.len(), "Querying node normalization");

        let raw: HashMap<String, Option<NormalizedNode>> =
            get_batch(&self.http_client, &self.endpoint, "curie", ids, self.timeout).await?;

        Ok(raw
            .into_iter()
            .map(|(id, node)| (id, node.map(NormalizationRecord::from)))
            .collect())
    }
}
