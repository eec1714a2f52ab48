//! Bounded exponential-backoff retry for remote generation calls.
//!
//! Every remote call (image, speech, video, vision, storage) is wrapped in
//! [`retry_with_backoff`]. The delay doubles after each failure, starting from
//! [`RetryPolicy::initial_delay`]. There is no jitter and no circuit breaker:
//! once the attempt budget is spent the last error is returned unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry budget for a single unit of remote work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for every retry after that.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and initial delay.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Policy that never sleeps. Used by tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay before the `retry`-th retry (1-based): `initial_delay * 2^(retry-1)`.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }
}

/// Run `operation` until it succeeds or the policy's attempt budget is spent.
///
/// The closure is invoked once per attempt and must perform exactly one
/// remote call. On exhaustion the error of the final attempt is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(call = label, attempts = attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                tracing::warn!(
                    call = label,
                    attempts = attempt,
                    error = %e,
                    "All retries exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_before_retry(attempt);
                tracing::warn!(
                    call = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
