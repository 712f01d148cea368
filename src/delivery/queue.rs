use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::types::TraceEvent;

/// Ordered buffer of events awaiting delivery.
///
/// `append` pushes to the tail; `drain` removes a contiguous run from the
/// head; `reinsert_front` puts a fully-retried-and-failed batch back ahead of
/// newer events so the collector still sees the oldest data first. The queue
/// itself is just storage - the single-flight invariant is enforced by the
/// worker task being the only caller of `drain`/`reinsert_front`.
pub(crate) struct PendingQueue {
    inner: Mutex<VecDeque<TraceEvent>>,
    max_size: usize,
    dropped_count: AtomicUsize,
    last_drop_log_time: AtomicU64,
    drop_logging_period: Duration,
}

impl PendingQueue {
    pub(crate) fn new(max_size: usize, drop_logging_period: Duration) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            max_size,
            dropped_count: AtomicUsize::new(0),
            last_drop_log_time: AtomicU64::new(0),
            drop_logging_period,
        }
    }

    /// Append an event at the tail. Returns false if the queue is full and
    /// the event was dropped.
    pub(crate) fn append(&self, event: TraceEvent) -> bool {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.max_size {
            drop(queue);
            let dropped = self.dropped_count.fetch_add(1, Ordering::Relaxed) + 1;
            self.log_drop_warning(dropped);
            return false;
        }
        queue.push_back(event);
        true
    }

    /// Atomically remove and return up to `max` contiguous events from the head.
    pub(crate) fn drain(&self, max: usize) -> Vec<TraceEvent> {
        let mut queue = self.inner.lock().unwrap();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Reinsert a failed batch at the head, ahead of newer events, preserving
    /// its internal order.
    ///
    /// Reinserted events may push the queue past `max_size`; dropping
    /// already-accepted events here would silently lose the oldest data, so
    /// the cap applies only to new appends.
    pub(crate) fn reinsert_front(&self, events: Vec<TraceEvent>) {
        let mut queue = self.inner.lock().unwrap();
        for event in events.into_iter().rev() {
            queue.push_front(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(dead_code)]
    pub(crate) fn dropped_count(&self) -> usize {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Log a drop warning with throttling.
    fn log_drop_warning(&self, dropped: usize) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let last_log = self.last_drop_log_time.load(Ordering::Relaxed);
        let throttle_secs = self.drop_logging_period.as_secs();

        if now - last_log >= throttle_secs
            && self
                .last_drop_log_time
                .compare_exchange(last_log, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            warn!(
                "Pending queue full (size: {}), dropped {} events so far. \
                 Consider increasing TRACEPIPE_QUEUE_MAX_SIZE.",
                self.max_size, dropped
            );
        }
    }
}
