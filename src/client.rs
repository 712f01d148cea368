use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::delivery::{
    CollectorTransport, PendingQueue, Transport, Worker, WorkerCommand, run_worker,
};
use crate::error::Result;
use crate::types::{EventFields, TraceEvent};

const STATE_ACTIVE: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

const WORKER_CHANNEL_SIZE: usize = 32;

/// Public façade of the SDK.
///
/// Owns the pending queue and the background flush worker. Cloning is cheap
/// and clones share the same queue and worker. `record()` never blocks on
/// network I/O and never surfaces an error into the host application; the
/// worker delivers batches in the background.
///
/// Lifecycle is monotonic: `Active → Closing → Closed`. After `close()`
/// settles, `record()` silently returns a sentinel empty id.
#[derive(Clone)]
pub struct TelemetryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    queue: Arc<PendingQueue>,
    worker_tx: mpsc::Sender<WorkerCommand>,
    state: AtomicU8,
    #[allow(dead_code)]
    worker_handle: JoinHandle<()>,
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("project_id", &self.inner.config.project_id())
            .field("pending", &self.inner.queue.len())
            .field("state", &self.inner.state.load(Ordering::SeqCst))
            .finish()
    }
}

impl TelemetryClient {
    /// Create a client and spawn its background worker.
    ///
    /// Fails immediately on an invalid configuration (missing api_key or
    /// project_id, malformed base_url). Must be called from within a tokio
    /// runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = CollectorTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub(crate) fn with_transport<T: Transport + 'static>(
        config: ClientConfig,
        transport: Arc<T>,
    ) -> Self {
        let queue = Arc::new(PendingQueue::new(
            config.max_queue_size(),
            config.queue_drop_logging_period(),
        ));
        let (worker_tx, worker_rx) = mpsc::channel(WORKER_CHANNEL_SIZE);
        let worker = Worker::new(config.clone(), queue.clone(), transport);
        let worker_handle = tokio::spawn(run_worker(worker, worker_rx));

        Self {
            inner: Arc::new(ClientInner {
                config,
                queue,
                worker_tx,
                state: AtomicU8::new(STATE_ACTIVE),
                worker_handle,
            }),
        }
    }

    /// Record one trace event and return its id.
    ///
    /// Returns immediately; the event is appended to the pending queue and
    /// delivered by the background worker. When the queue reaches
    /// `batch_size`, a flush is requested right away instead of waiting for
    /// the next timer tick. After `close()` this is a silent no-op returning
    /// an empty id - telemetry must never break the host application.
    pub fn record(&self, fields: EventFields) -> String {
        if self.inner.state.load(Ordering::SeqCst) == STATE_CLOSED {
            return String::new();
        }

        let event = TraceEvent::from_fields(self.inner.config.project_id(), fields);
        let id = event.id.clone();

        if self.inner.queue.append(event) && self.inner.config.debug() {
            debug!(event_id = %id, "recorded event");
        }

        if self.inner.queue.len() >= self.inner.config.batch_size() {
            // Coalesced: a full channel means a flush request is already
            // pending, and the timer covers anything that slips through.
            let _ = self.inner.worker_tx.try_send(WorkerCommand::TriggerFlush);
        }

        id
    }

    /// Force an out-of-cycle drain of everything currently queued.
    ///
    /// Returns true when the collector accepted all of it within `timeout`,
    /// false on timeout or any delivery failure. Never raises.
    pub async fn flush(&self, timeout: Duration) -> bool {
        if self.inner.state.load(Ordering::SeqCst) == STATE_CLOSED {
            return self.inner.queue.is_empty();
        }

        let (tx, rx) = oneshot::channel();
        if self
            .inner
            .worker_tx
            .send(WorkerCommand::Flush(tx))
            .await
            .is_err()
        {
            return self.inner.queue.is_empty();
        }

        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(true)))
    }

    /// Shut the client down: cancel the flush timer, run one final flush
    /// bounded by `close_timeout`, drop whatever remains, and release the
    /// worker.
    ///
    /// Idempotent - the second and later calls are no-ops that return
    /// immediately. State never moves backward.
    pub async fn close(&self) {
        if self
            .inner
            .state
            .compare_exchange(STATE_ACTIVE, STATE_CLOSING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let (tx, rx) = oneshot::channel();
        let clean = if self
            .inner
            .worker_tx
            .send(WorkerCommand::Shutdown(tx))
            .await
            .is_ok()
        {
            // The worker bounds the final flush by close_timeout itself; the
            // extra second covers the ack round-trip.
            tokio::time::timeout(
                self.inner.config.close_timeout() + Duration::from_secs(1),
                rx,
            )
            .await
            .map(|r| r.unwrap_or(false))
            .unwrap_or(false)
        } else {
            false
        };

        if !clean {
            warn!("client closed with undelivered events");
        }
        self.inner.state.store(STATE_CLOSED, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.inner.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_client;
    use crate::types::EventStatus;

    fn make_config() -> ClientConfig {
        ClientConfig::builder()
            .api_key("sk-test")
            .project_id("proj")
            .base_delay(Duration::from_millis(10))
            .rate_limit_max_tokens(1000.0)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_returns_event_id_and_queues() {
        let (client, _transport) = test_client(make_config());

        let id = client.record(EventFields::default());
        assert!(!id.is_empty());
        assert_eq!(client.pending_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_delivers_all_queued_events_in_order() {
        let (client, transport) = test_client(make_config());
        for op in ["a", "b", "c"] {
            client.record(EventFields {
                operation: Some(op.to_string()),
                ..Default::default()
            });
        }

        assert!(client.flush(Duration::from_secs(5)).await);
        assert_eq!(client.pending_len(), 0);
        assert_eq!(transport.delivered_operations(), ["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_threshold_triggers_immediate_flush() {
        let config = ClientConfig::builder()
            .api_key("sk-test")
            .project_id("proj")
            .batch_size(2)
            .rate_limit_max_tokens(1000.0)
            .build();
        let (client, transport) = test_client(config);

        for op in ["1", "2", "3"] {
            client.record(EventFields {
                operation: Some(op.to_string()),
                ..Default::default()
            });
        }

        // Let the triggered flush run; the timer (5s default) has not fired.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let delivered = transport.delivered_operations();
        assert!(delivered.contains(&"1".to_string()));
        assert!(delivered.contains(&"2".to_string()));

        // Event 3 goes out on the next timer tick.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.delivered_operations(), ["1", "2", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_after_close_returns_sentinel() {
        let (client, _transport) = test_client(make_config());
        client.close().await;

        let id = client.record(EventFields {
            status: Some(EventStatus::Error),
            ..Default::default()
        });
        assert!(id.is_empty());
        assert_eq!(client.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_events() {
        let (client, transport) = test_client(make_config());
        client.record(EventFields {
            operation: Some("final".to_string()),
            ..Default::default()
        });

        client.close().await;
        assert_eq!(transport.delivered_operations(), ["final"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_twice_is_noop() {
        let (client, transport) = test_client(make_config());
        client.record(EventFields::default());

        client.close().await;
        let delivered = transport.delivered_operations().len();

        client.close().await;
        assert_eq!(transport.delivered_operations().len(), delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_queue_and_worker() {
        let (client, transport) = test_client(make_config());
        let clone = client.clone();

        client.record(EventFields {
            operation: Some("a".to_string()),
            ..Default::default()
        });
        clone.record(EventFields {
            operation: Some("b".to_string()),
            ..Default::default()
        });

        assert!(client.flush(Duration::from_secs(5)).await);
        assert_eq!(transport.delivered_operations(), ["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_reports_failure_and_reenqueues() {
        let config = ClientConfig::builder()
            .api_key("sk-test")
            .project_id("proj")
            .max_retries(0)
            .base_delay(Duration::from_millis(10))
            .rate_limit_max_tokens(1000.0)
            .build();
        let (client, transport) = test_client(config);
        transport.fail_next(vec![500]);
        client.record(EventFields::default());

        assert!(!client.flush(Duration::from_secs(5)).await);
        // Exhausted batch is back at the head for the next cycle.
        assert_eq!(client.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let config = ClientConfig::builder()
            .api_key("")
            .project_id("proj")
            .build();
        assert!(TelemetryClient::new(config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_during_closing_is_accepted() {
        let (client, _transport) = test_client(make_config());

        // Move to Closing by hand; close() itself would settle to Closed.
        client.inner.state.store(STATE_CLOSING, Ordering::SeqCst);
        let id = client.record(EventFields::default());
        assert!(!id.is_empty());
        assert_eq!(client.pending_len(), 1);
    }

    #[test]
    fn test_client_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<TelemetryClient>();
    }
}
