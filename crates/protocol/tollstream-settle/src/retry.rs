//! Retry with exponential backoff for idempotent backend calls.
//!
//! Window requests are never retried here: a retried charge the caller
//! does not know about could bill twice. Only calls that carry an
//! idempotency key (channel open) go through a [`RetryPolicy`].

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::SettleResult;

/// Retry policy with exponential backoff and jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Create from retry config.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay, config.max_delay)
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the given attempt (0-indexed; attempt 0 never waits).
    ///
    /// Doubles from `base_delay`, caps at `max_delay`, then applies up to
    /// 25% jitter in either direction.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);

        let millis = capped.as_millis() as u64;
        let spread = millis / 4;
        if spread == 0 {
            return capped;
        }
        let offset = rand::random::<u64>() % (spread * 2 + 1);
        Duration::from_millis(millis - spread + offset)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable
    /// error, or the attempts run out.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> SettleResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SettleResult<T>>,
    {
        let mut attempt = 0;
        loop {
            let delay = self.delay_for_attempt(attempt);
            if !delay.is_zero() {
                debug!(label, attempt, ?delay, "Retrying after delay");
                sleep(delay).await;
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    warn!(
                        label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Retryable error, will retry"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
