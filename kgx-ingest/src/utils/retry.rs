//! Bounded retry with exponential backoff for batch lookups
//!
//! Only transient failures ([`LookupError::is_transient`]) are retried.
//! Each attempt runs under its own timeout; an attempt that overruns is
//! treated as a transient [`LookupError::Timeout`].

use crate::error::LookupError;
use kgx_common::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Run `operation` until it succeeds, fails permanently, or the attempts
/// in `retry` are used up
///
/// **Backoff:** `initial_backoff_ms` after the first failure, doubling on
/// every further failure, capped at `max_backoff_ms`.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    retry: &RetryConfig,
    attempt_timeout: Duration,
    mut operation: F,
) -> Result<T, LookupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LookupError>>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying lookup");
        }

        let outcome = match tokio::time::timeout(attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(attempt_timeout)),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Lookup succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                tracing::debug!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Lookup failed: retry attempts exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                let backoff = retry.backoff_after(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient lookup failure, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
