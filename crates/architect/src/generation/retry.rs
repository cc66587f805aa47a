//! Bounded exponential backoff for transient generation failures.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use super::GenerationError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delays between attempts: doubling from `initial_backoff`, capped at
    /// `max_backoff`, one fewer than `max_attempts`.
    pub fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts.max(1) - 1;
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_factor(2.0)
            .with_max_times(retries as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// budget is spent. Non-transient errors are returned on first sight.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let attempts = AtomicU32::new(0);
    let result = (|| {
        attempts.fetch_add(1, Ordering::Relaxed);
        operation()
    })
    .retry(policy.backoff())
    .when(GenerationError::is_transient)
    .notify(|error, delay: Duration| {
        tracing::warn!(
            "generation attempt {}/{max_attempts} failed: {error}; retrying in {delay:?}",
            attempts.load(Ordering::Relaxed)
        );
    })
    .await;

    match result {
        Err(error) if error.is_transient() => Err(GenerationError::Exhausted {
            attempts: attempts.load(Ordering::Relaxed),
            last: error.to_string(),
        }),
        other => other,
    }
}
