//! Retry with exponential backoff for persistence calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::DomainError;
use crate::domain::models::SyncConfig;

/// Retry policy for transient persistence errors
///
/// Backoff doubles with each retry, capped at `max_backoff_ms`. Only errors
/// for which [`DomainError::is_transient`] holds are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Execute an operation, retrying transient failures.
    ///
    /// Returns the last error once retries are exhausted or the error is permanent.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(attempt, "operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if self.should_retry(&err, attempt) {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            attempt = attempt + 1,
                            error = %err,
                            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                            "transient persistence error, retrying"
                        );
                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if attempt >= self.max_retries {
                            warn!(attempts = attempt + 1, error = %err, "operation failed after retries");
                        } else {
                            debug!(error = %err, "permanent error, not retrying");
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    /// `min(initial_backoff × 2^attempt, max_backoff)`
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    fn should_retry(&self, error: &DomainError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
