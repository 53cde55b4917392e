//! Retry logic with configurable backoff policies for Figma API calls.

use std::time::Duration;

use figpipe_types::{FigpipeError, Result};

/// Backoff policy controlling the delay between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max.
    Exponential { base: Duration, max: Duration },
    /// No delay between retries.
    None,
}

impl BackoffPolicy {
    /// Compute the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Exponential { base, max } => {
                let millis = (base.as_millis() as u64)
                    .saturating_mul(2u64.saturating_pow(attempt as u32));
                Duration::from_millis(millis).min(*max)
            }
            BackoffPolicy::None => Duration::ZERO,
        }
    }

    /// Delay before retrying after `err`. Rate limits wait at least as long as the server asked.
    pub fn delay_after(&self, err: &FigpipeError, attempt: usize) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match err {
            FigpipeError::RateLimited { retry_after_ms } => {
                backoff.max(Duration::from_millis(*retry_after_ms))
            }
            _ => backoff,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Call `f` up to `max_retries + 1` times, retrying only errors that
/// satisfy [`FigpipeError::is_retryable`].
pub async fn with_retry<T, F, Fut>(
    f: F,
    max_retries: usize,
    policy: &BackoffPolicy,
    operation: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = policy.delay_after(&e, attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = %delay.as_millis(),
                    error = %e,
                    "Retryable Figma error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
