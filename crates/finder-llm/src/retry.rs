//! Retry logic with exponential backoff
//!
//! [`RetryPolicy`] decides which failures are transient and how long to wait
//! between attempts. [`RetryingProvider`] applies a policy to every call of
//! a wrapped [`LLMProvider`].

use crate::{CompletionRequest, CompletionResponse, LLMError, LLMProvider, Result};
use async_trait::async_trait;
use finder_utils::RetryOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
///
/// The delay before retry `n` (1-based) is `initial_delay * exp_base^(n-1)`,
/// capped at `max_delay` when one is set. With the default policy the waits
/// are 1s, 7s, 49s and 343s.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Backoff multiplier
    pub exp_base: f64,

    /// Upper bound for a single delay
    pub max_delay: Option<Duration>,

    /// HTTP statuses considered transient
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryOptions::default())
    }
}

impl From<&RetryOptions> for RetryPolicy {
    fn from(options: &RetryOptions) -> Self {
        Self {
            max_attempts: options.attempts.max(1),
            initial_delay: options.initial_delay(),
            exp_base: options.exp_base,
            max_delay: options.max_delay(),
            retryable_statuses: options.http_status_codes.clone(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based); zero for `retry == 0`
    pub fn backoff_duration(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.exp_base.powi(exponent);
        let backoff = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(max) if backoff > max => max,
            _ => backoff,
        }
    }

    /// Sum of all waits when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts)
            .map(|retry| self.backoff_duration(retry))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Check if an error is transient under this policy
    pub fn is_retryable(&self, error: &LLMError) -> bool {
        if matches!(error, LLMError::RetriesExhausted { .. }) {
            return false;
        }
        error
            .status()
            .is_some_and(|status| self.retryable_statuses.contains(&status))
    }

    /// Execute an async operation with retry logic
    ///
    /// Non-retryable errors are returned immediately. If every attempt fails
    /// with a retryable error the last one is wrapped in
    /// [`LLMError::RetriesExhausted`].
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt, self.max_attempts, operation_name
            );

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            if !self.is_retryable(&error) {
                debug!(
                    "Operation '{}' failed with non-retryable error: {}",
                    operation_name, error
                );
                return Err(error);
            }

            if attempt >= self.max_attempts {
                warn!(
                    "Operation '{}' failed after {} attempts: {}",
                    operation_name, attempt, error
                );
                return Err(LLMError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let backoff = self.backoff_duration(attempt);
            warn!(
                "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                operation_name, attempt, self.max_attempts, error, backoff
            );
            sleep(backoff).await;
        }
    }
}

/// Provider decorator that retries transient failures
///
/// The policy is shared read-only; concurrent requests retry independently.
pub struct RetryingProvider {
    inner: Arc<dyn LLMProvider>,
    policy: Arc<RetryPolicy>,
}

impl RetryingProvider {
    /// Wrap a provider with a retry policy
    pub fn new(inner: Arc<dyn LLMProvider>, policy: Arc<RetryPolicy>) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LLMProvider for RetryingProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let operation = format!("{}:{}", self.inner.name(), request.model);
        self.policy
            .execute(&operation, || self.inner.complete(request.clone()))
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
