//! Caller-level retry around [`StreamSink::invoke`].
//!
//! The sink itself never retries. This wrapper retries only failures that
//! report themselves as retryable, with capped exponential backoff.

use std::time::Duration;

use graphsink_core::InvokeError;

use crate::sink::StreamSink;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt + 1` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Invoke `element`, retrying retryable failures according to `policy`.
///
/// Each attempt is a fresh invocation, so it receives a new sequence number.
pub async fn invoke_with_retry<T, S>(
    sink: &mut S,
    element: T,
    policy: &RetryPolicy,
) -> Result<(), InvokeError>
where
    T: Clone + Send + 'static,
    S: StreamSink<T> + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match sink.invoke(element.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable invocation failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
