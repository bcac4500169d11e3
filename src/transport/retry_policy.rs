use std::future::Future;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::BridgeError;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(upstream: &UpstreamConfig) -> Self {
        Self {
            max_retries: upstream.max_retries,
            delay: Duration::from_millis(upstream.retry_delay_ms),
        }
    }

    /// Total attempts this policy allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Run `op` until it succeeds, fails with a non-retriable error, or the
    /// retry budget is spent. The last error is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, BridgeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_retries || !err.is_retriable() {
                        return Err(err);
                    }
                    tracing::debug!(
                        retry_attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = self.delay.as_millis(),
                        error = %err,
                        "retrying upstream request"
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
