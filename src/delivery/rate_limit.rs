use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token-bucket admission control for outbound delivery requests.
///
/// The bucket holds up to `max_tokens` and refills continuously at
/// `max_tokens / refill_period`. Each admitted delivery consumes one token;
/// when the bucket is empty, callers suspend for one token's worth of refill
/// time and re-check. No upper bound on the accumulated wait is enforced
/// here; callers needing a hard timeout wrap `acquire()` externally.
pub(crate) struct RateLimiter {
    max_tokens: f64,
    refill_period: Duration,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub(crate) fn new(max_tokens: f64, refill_period: Duration) -> Self {
        let max_tokens = max_tokens.max(1.0);
        Self {
            max_tokens,
            refill_period,
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until a token is available, then consume it.
    pub(crate) async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Time for one token to accrue. The lock is not held while
                // sleeping, so concurrent acquirers re-contend on wake.
                self.refill_period.div_f64(self.max_tokens)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Restore the bucket to full capacity.
    #[allow(dead_code)]
    pub(crate) async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.tokens = self.max_tokens;
        state.last_refill = Instant::now();
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        let accrued = elapsed.as_secs_f64() / self.refill_period.as_secs_f64() * self.max_tokens;
        state.tokens = (state.tokens + accrued).min(self.max_tokens);
        state.last_refill = now;
    }
}
