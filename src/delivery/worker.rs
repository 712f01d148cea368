use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::delivery::batching::serialize_batches;
use crate::delivery::queue::PendingQueue;
use crate::delivery::rate_limit::RateLimiter;
use crate::delivery::retry::{RetryExecutor, Transport};

/// Commands sent to the worker task.
pub(crate) enum WorkerCommand {
    /// Size-threshold trigger. Sent with `try_send` and dropped when the
    /// channel is full - a lost trigger is coalesced into whatever flush is
    /// already pending.
    TriggerFlush,
    /// Explicit flush; the reply is true when everything queued at drain time
    /// was accepted by the collector.
    Flush(oneshot::Sender<bool>),
    /// Stop the timer, run one final flush bounded by `close_timeout`, reply,
    /// and exit.
    Shutdown(oneshot::Sender<bool>),
}

/// Single-owner flush worker.
///
/// This task is the only code that calls `drain`/`reinsert_front` on the
/// pending queue, which is what enforces the at-most-one-flush-in-flight
/// invariant: the timer, the size threshold, and explicit `flush()` all
/// arrive here as messages and are handled one at a time.
pub(crate) struct Worker<T: Transport> {
    queue: Arc<PendingQueue>,
    limiter: RateLimiter,
    retry: RetryExecutor,
    transport: Arc<T>,
    config: ClientConfig,
}

impl<T: Transport> Worker<T> {
    pub(crate) fn new(config: ClientConfig, queue: Arc<PendingQueue>, transport: Arc<T>) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit_max_tokens(),
            config.rate_limit_refill_period(),
        );
        let retry = RetryExecutor::new(
            config.max_retries(),
            config.base_delay(),
            config.max_delay(),
        );
        Self {
            queue,
            limiter,
            retry,
            transport,
            config,
        }
    }

    /// Drain and deliver everything queued at the start of the cycle,
    /// partial tail batch included.
    ///
    /// Events recorded while the cycle runs stay queued for the next one.
    /// Returns true when every drained event was accepted by the collector.
    pub(crate) async fn flush_cycle(&self) -> bool {
        let mut remaining = self.queue.len();
        let mut all_accepted = true;

        while remaining > 0 {
            let batch = self.queue.drain(self.config.batch_size().min(remaining));
            if batch.is_empty() {
                break;
            }
            remaining -= batch.len();

            match self.deliver_batch(batch).await {
                DeliverOutcome::Accepted => {}
                DeliverOutcome::Dropped => all_accepted = false,
                DeliverOutcome::Requeued => return false,
            }
        }

        all_accepted
    }

    /// Deliver full batches only, leaving a partial tail for the timer or the
    /// next threshold crossing. This is what the size-threshold trigger runs.
    pub(crate) async fn flush_full_batches(&self) {
        while self.queue.len() >= self.config.batch_size() {
            let batch = self.queue.drain(self.config.batch_size());
            if batch.is_empty() {
                break;
            }
            match self.deliver_batch(batch).await {
                DeliverOutcome::Accepted | DeliverOutcome::Dropped => {}
                // Re-enqueued events would be drained straight back out;
                // leave them for the next timer cycle instead.
                DeliverOutcome::Requeued => break,
            }
        }
    }

    /// Deliver one drained batch, splitting it by the byte cap if needed.
    async fn deliver_batch(&self, batch: Vec<crate::types::TraceEvent>) -> DeliverOutcome {
        let mut payloads = serialize_batches(
            batch,
            self.config.batch_size(),
            self.config.batch_max_bytes(),
        )
        .into_iter();

        let mut outcome = DeliverOutcome::Accepted;
        while let Some(payload) = payloads.next() {
            self.limiter.acquire().await;

            match self
                .retry
                .deliver(self.transport.as_ref(), &payload.data)
                .await
            {
                Ok(()) => {
                    if self.config.debug() {
                        debug!(events = payload.events.len(), "batch accepted by collector");
                    }
                }
                Err(e) if e.retryable => {
                    // Retries exhausted on a transient failure: put this
                    // payload and every not-yet-sent event back at the head
                    // so the next cycle sees the oldest data first.
                    warn!(error = %e, "delivery exhausted retries, re-enqueueing batch at head");
                    let mut events = payload.events;
                    for unsent in payloads {
                        events.extend(unsent.events);
                    }
                    self.queue.reinsert_front(events);
                    return DeliverOutcome::Requeued;
                }
                Err(e) => {
                    // Terminal reject (e.g. 401): resending would loop
                    // forever, so the batch is dropped.
                    warn!(error = %e, events = payload.events.len(), "batch permanently rejected, dropping");
                    outcome = DeliverOutcome::Dropped;
                }
            }
        }
        outcome
    }

    async fn final_flush(&self) -> bool {
        let accepted = tokio::time::timeout(self.config.close_timeout(), self.flush_cycle())
            .await
            .unwrap_or(false);
        let left_behind = self.queue.len();
        if left_behind > 0 {
            warn!(events = left_behind, "dropping unsent events at shutdown");
        }
        accepted && left_behind == 0
    }
}

enum DeliverOutcome {
    /// Every payload in the batch was accepted.
    Accepted,
    /// At least one payload was terminally rejected and dropped.
    Dropped,
    /// A payload exhausted its retries and went back to the queue head.
    Requeued,
}

/// Worker task body: a recurring flush timer plus the command channel.
pub(crate) async fn run_worker<T: Transport>(
    worker: Worker<T>,
    mut receiver: mpsc::Receiver<WorkerCommand>,
) {
    let period = worker.config.flush_interval();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                worker.flush_cycle().await;
            }
            cmd = receiver.recv() => match cmd {
                Some(WorkerCommand::TriggerFlush) => {
                    worker.flush_full_batches().await;
                }
                Some(WorkerCommand::Flush(ack)) => {
                    let ok = worker.flush_cycle().await;
                    let _ = ack.send(ok);
                }
                Some(WorkerCommand::Shutdown(ack)) => {
                    let ok = worker.final_flush().await;
                    let _ = ack.send(ok);
                    break;
                }
                None => {
                    // Client handle dropped without close(): best-effort
                    // bounded final flush, then exit.
                    worker.final_flush().await;
                    break;
                }
            }
        }
    }
}
