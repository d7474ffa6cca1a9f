//! Batched identifier normalization
//!
//! **Algorithm:**
//! 1. Drop repeated ids (first-seen order kept) and ids the cache already
//!    has an answer for
//! 2. Partition what is left into chunks of `chunk_size`
//! 3. One batch request per chunk, with bounded retry; up to
//!    `max_concurrent_batches` chunks in flight
//! 4. Success: merge the chunk into the cache in one write; ids the
//!    service left out become Unresolved
//! 5. Failure: under [`FailurePolicy::ChunkSacrifice`] every id of the
//!    chunk becomes Unresolved; under [`FailurePolicy::PerIdRetry`] each id
//!    is asked for on its own first
//!
//! A failed chunk never fails the run. Cancelling stops chunks that have
//! not started; their ids stay Miss so a later run can still ask for them.

use crate::services::lookup::LookupService;
use crate::services::normalization_cache::{Lookup, NormalizationCache};
use crate::utils::retry::retry_with_backoff;
use futures::stream::{self, StreamExt};
use kgx_common::config::{FailurePolicy, NormalizationConfig, RetryConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Chunk size of the secondary node normalization path
pub const SECONDARY_NODE_CHUNK_SIZE: usize = 2900;

/// Batching parameters for one normalizer
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub chunk_size: usize,
    pub failure_policy: FailurePolicy,
    pub retry: RetryConfig,
    /// Bound on each single attempt
    pub request_timeout: Duration,
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::for_nodes(&NormalizationConfig::default())
    }
}

impl BatchConfig {
    pub fn for_nodes(config: &NormalizationConfig) -> Self {
        Self::with_chunk_size(config, config.node_chunk_size)
    }

    pub fn for_edges(config: &NormalizationConfig) -> Self {
        Self::with_chunk_size(config, config.edge_chunk_size)
    }

    pub fn with_chunk_size(config: &NormalizationConfig, chunk_size: usize) -> Self {
        Self {
            chunk_size,
            failure_policy: config.failure_policy,
            retry: config.retry.clone(),
            request_timeout: config.request_timeout(),
            max_concurrent_batches: config.max_concurrent_batches,
        }
    }
}

/// What one `normalize` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Distinct ids passed in
    pub requested: usize,
    /// Ids sent to the service in a chunk that ran
    pub looked_up: usize,
    /// Ids the cache already had an answer for
    pub cache_hits: usize,
    /// Ids newly resolved by this call
    pub resolved: usize,
    /// Requested ids that are Unresolved after the call, sorted
    pub unresolved: Vec<String>,
    /// Chunks whose batch request failed
    pub failed_chunks: usize,
    /// Some chunks were skipped because the run was cancelled
    pub cancelled: bool,
}

enum ChunkOutcome {
    Merged { looked_up: usize, resolved: usize, failed: bool },
    Cancelled,
}

/// Fills a [`NormalizationCache`] from a [`LookupService`]
pub struct BatchNormalizer<S: LookupService> {
    service: Arc<S>,
    config: BatchConfig,
}

impl<S: LookupService> BatchNormalizer<S> {
    pub fn new(service: Arc<S>, config: BatchConfig) -> Self {
        Self { service, config }
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub async fn normalize(&self, ids: &[String], cache: &NormalizationCache<S::Record>) -> NormalizationReport {
        self.normalize_cancellable(ids, cache, &CancellationToken::new())
            .await
    }

    pub async fn normalize_cancellable(
        &self,
        ids: &[String],
        cache: &NormalizationCache<S::Record>,
        cancel: &CancellationToken,
    ) -> NormalizationReport {
        let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
        let distinct: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

        let to_lookup: Vec<String> = distinct
            .iter()
            .filter(|id| cache.lookup(id).is_miss())
            .map(|id| (*id).clone())
            .collect();

        let mut report = NormalizationReport {
            requested: distinct.len(),
            cache_hits: distinct.len() - to_lookup.len(),
            ..NormalizationReport::default()
        };

        tracing::trace!(
            service = self.service.name(),
            cache_hits = report.cache_hits,
            "Skipping ids already in cache"
        );

        let chunk_size = self.config.chunk_size.max(1);
        let chunks: Vec<(usize, Vec<String>)> = to_lookup
            .chunks(chunk_size)
            .enumerate()
            .map(|(n, chunk)| (n * chunk_size, chunk.to_vec()))
            .collect();

        let outcomes: Vec<ChunkOutcome> = stream::iter(chunks)
            .map(|(start, chunk)| self.process_chunk(start, chunk, cache, cancel))
            .buffer_unordered(self.config.max_concurrent_batches.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ChunkOutcome::Merged { looked_up, resolved, failed } => {
                    report.looked_up += looked_up;
                    report.resolved += resolved;
                    if failed {
                        report.failed_chunks += 1;
                    }
                }
                ChunkOutcome::Cancelled => report.cancelled = true,
            }
        }

        let mut unresolved: Vec<String> = distinct
            .into_iter()
            .filter(|id| matches!(cache.lookup(id), Lookup::Unresolved))
            .cloned()
            .collect();
        unresolved.sort();
        report.unresolved = unresolved;

        tracing::debug!(
            service = self.service.name(),
            requested = report.requested,
            looked_up = report.looked_up,
            resolved = report.resolved,
            unresolved = report.unresolved.len(),
            failed_chunks = report.failed_chunks,
            "Normalization pass complete"
        );

        report
    }

    async fn process_chunk(
        &self,
        start: usize,
        chunk: Vec<String>,
        cache: &NormalizationCache<S::Record>,
        cancel: &CancellationToken,
    ) -> ChunkOutcome {
        if cancel.is_cancelled() {
            return ChunkOutcome::Cancelled;
        }

        let end = start + chunk.len();

        // Dropping the request on cancellation leaves the chunk unmerged
        let result = {
            let request = retry_with_backoff(
                self.service.name(),
                &self.config.retry,
                self.config.request_timeout,
                || self.service.lookup_batch(&chunk),
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ChunkOutcome::Cancelled,
                result = request => result,
            }
        };

        match result {
            Ok(mut answer) => {
                let merged: Vec<(String, Option<S::Record>)> = chunk
                    .into_iter()
                    .map(|id| {
                        let record = answer.remove(&id).flatten();
                        (id, record)
                    })
                    .collect();
                let looked_up = merged.len();
                let resolved = merged.iter().filter(|(_, record)| record.is_some()).count();
                cache.insert_batch(merged);

                ChunkOutcome::Merged { looked_up, resolved, failed: false }
            }
            Err(err) => {
                tracing::warn!(
                    service = self.service.name(),
                    chunk_start = start,
                    chunk_end = end,
                    error = %err,
                    "Batch lookup failed"
                );

                match self.config.failure_policy {
                    FailurePolicy::ChunkSacrifice => {
                        let looked_up = chunk.len();
                        cache.insert_batch(chunk.into_iter().map(|id| (id, None)));
                        ChunkOutcome::Merged { looked_up, resolved: 0, failed: true }
                    }
                    FailurePolicy::PerIdRetry => self.retry_individually(chunk, cache, cancel).await,
                }
            }
        }
    }

    /// Ask for each id of a failed chunk alone
    ///
    /// Answers are held back and merged in one write once every id has been
    /// asked for, so a cancelled retry leaves the whole chunk Miss.
    async fn retry_individually(
        &self,
        chunk: Vec<String>,
        cache: &NormalizationCache<S::Record>,
        cancel: &CancellationToken,
    ) -> ChunkOutcome {
        let mut merged: Vec<(String, Option<S::Record>)> = Vec::with_capacity(chunk.len());

        for id in chunk {
            let result = {
                let single = std::slice::from_ref(&id);
                let request = retry_with_backoff(
                    self.service.name(),
                    &self.config.retry,
                    self.config.request_timeout,
                    || self.service.lookup_batch(single),
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ChunkOutcome::Cancelled,
                    result = request => result,
                }
            };

            let record = match result {
                Ok(mut answer) => answer.remove(&id).flatten(),
                Err(err) => {
                    tracing::debug!(service = self.service.name(), id = %id, error = %err, "Single-id lookup failed");
                    None
                }
            };
            merged.push((id, record));
        }

        let looked_up = merged.len();
        let resolved = merged.iter().filter(|(_, record)| record.is_some()).count();
        cache.insert_batch(merged);

        ChunkOutcome::Merged { looked_up, resolved, failed: true }
    }
}
