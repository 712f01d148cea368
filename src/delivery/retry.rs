use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::DeliveryError;

/// Seam between the retry executor and the wire.
///
/// One call sends one serialized batch and classifies the outcome. Tests
/// substitute an in-memory transport; production uses the HTTP collector
/// transport.
#[async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn send(&self, payload: &[u8]) -> Result<(), DeliveryError>;
}

/// Executes one batch delivery with bounded retries, exponential backoff,
/// and jitter.
///
/// Re-enqueue policy deliberately lives in the worker, not here: on
/// exhaustion this surfaces `DeliveryError { exhausted: true }` and lets the
/// queue owner decide what happens to the events.
#[derive(Debug, Clone)]
pub(crate) struct RetryExecutor {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

/// Backoff before retry attempt `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max_delay`. Jitter is applied separately.
pub(crate) fn backoff_delay(base_delay: Duration, max_delay: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    base_delay
        .checked_mul(1u32 << exp)
        .unwrap_or(max_delay)
        .min(max_delay)
}

fn jittered(delay: Duration) -> Duration {
    // +/-25% uniform jitter
    delay.mul_f64(rand::thread_rng().gen_range(0.75..=1.25))
}

impl RetryExecutor {
    pub(crate) fn new(max_retries: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Deliver `payload` through `transport`, retrying retryable failures up
    /// to `max_retries` times (max_retries + 1 total attempts).
    ///
    /// Non-retryable failures (4xx other than 429) return immediately without
    /// consuming the remaining budget.
    pub(crate) async fn deliver<T: Transport>(
        &self,
        transport: &T,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = jittered(backoff_delay(
                    self.base_delay,
                    self.max_delay,
                    attempt as u32,
                ));
                debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match transport.send(payload).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.retryable => {
                    warn!(status = ?e.status, "batch rejected with terminal error");
                    return Err(e);
                }
                Err(mut e) => {
                    if attempt == self.max_retries {
                        e.exhausted = true;
                        return Err(e);
                    }
                    debug!(attempt, status = ?e.status, error = %e, "delivery attempt failed, will retry");
                }
            }
        }
        unreachable!("retry loop always returns")
    }
}
