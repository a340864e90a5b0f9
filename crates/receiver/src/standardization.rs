//! Hand-off between the network path and the durable retry buffer.
//!
//! Producers enqueue serialized records without waiting on disk; one task per
//! stream drains the queue and performs the append.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use brx_metadata::{BackpressurePolicy, HandoffConfig};
use brx_middleware::RetryBuffer;
use bytes::Bytes;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metrics::KindMetrics;

const DRAIN_BATCH: usize = 64;

struct HandoffQueue {
    entries: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    policy: BackpressurePolicy,
    notify: Notify,
}

enum Offer {
    Accepted,
    /// Accepted after dropping the oldest queued entry
    Displaced,
    Rejected,
}

impl HandoffQueue {
    fn offer(&self, payload: Bytes) -> Offer {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = if entries.len() < self.capacity {
            Offer::Accepted
        } else {
            match self.policy {
                BackpressurePolicy::RejectNew => return Offer::Rejected,
                BackpressurePolicy::DropOldest => {
                    entries.pop_front();
                    Offer::Displaced
                }
            }
        };
        entries.push_back(payload);
        drop(entries);
        self.notify.notify_one();
        outcome
    }

    fn drain(&self, max: usize) -> Vec<Bytes> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let n = entries.len().min(max);
        entries.drain(..n).collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Submission side of the hand-off queue. Cheap to clone.
#[derive(Clone)]
pub struct StandardizationWorker {
    queue: Arc<HandoffQueue>,
    metrics: KindMetrics,
}

impl StandardizationWorker {
    /// Start the append task for one buffer. It stops once `cancel` fires
    /// and everything queued before that has been appended.
    pub fn spawn(
        buffer: Arc<dyn RetryBuffer>,
        config: &HandoffConfig,
        metrics: KindMetrics,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let queue = Arc::new(HandoffQueue {
            entries: Mutex::new(VecDeque::with_capacity(config.capacity)),
            capacity: config.capacity,
            policy: config.policy,
            notify: Notify::new(),
        });
        let handle = tokio::spawn(append_loop(
            Arc::clone(&queue),
            buffer,
            metrics.clone(),
            cancel,
        ));
        (Self { queue, metrics }, handle)
    }

    /// Queue a serialized record for the retry buffer. Returns false when
    /// the queue refused it.
    pub fn submit(&self, payload: Bytes) -> bool {
        match self.queue.offer(payload) {
            Offer::Accepted => true,
            Offer::Displaced => {
                self.metrics.inc_handoff_rejected();
                tracing::warn!(kind = %self.metrics.kind(), "Hand-off queue full, dropped oldest entry");
                true
            }
            Offer::Rejected => {
                self.metrics.inc_handoff_rejected();
                tracing::warn!(kind = %self.metrics.kind(), "Hand-off queue full, rejected entry");
                false
            }
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

async fn append_loop(
    queue: Arc<HandoffQueue>,
    buffer: Arc<dyn RetryBuffer>,
    metrics: KindMetrics,
    cancel: CancellationToken,
) {
    loop {
        let batch = queue.drain(DRAIN_BATCH);
        if batch.is_empty() {
            tokio::select! {
                _ = queue.notify.notified() => continue,
                _ = cancel.cancelled() => break,
            }
        }
        append_batch(&*buffer, &metrics, batch).await;
    }

    loop {
        let batch = queue.drain(DRAIN_BATCH);
        if batch.is_empty() {
            break;
        }
        append_batch(&*buffer, &metrics, batch).await;
    }
    tracing::info!(kind = %metrics.kind(), "Standardization worker stopped");
}

async fn append_batch(buffer: &dyn RetryBuffer, metrics: &KindMetrics, batch: Vec<Bytes>) {
    for payload in batch {
        let len = payload.len();
        match buffer.append(payload).await {
            Ok(_) => metrics.inc_buffer_file_in(),
            Err(e) => {
                metrics.inc_buffer_write_error();
                tracing::error!(kind = %metrics.kind(), len, error = %e, "Failed to append to retry buffer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ReceiverMetrics, TelemetryKind};
    use brx_middleware::InMemoryBuffer;
    use prometheus::Registry;

    fn metrics() -> KindMetrics {
        ReceiverMetrics::new(Registry::new())
            .unwrap()
            .for_kind(TelemetryKind::PerfData)
    }

    fn config(capacity: usize, policy: BackpressurePolicy) -> HandoffConfig {
        HandoffConfig { capacity, policy }
    }

    #[tokio::test]
    async fn test_submitted_entries_reach_buffer() {
        let buffer = Arc::new(InMemoryBuffer::new());
        let metrics = metrics();
        let cancel = CancellationToken::new();
        let (worker, handle) = StandardizationWorker::spawn(
            buffer.clone(),
            &HandoffConfig::default(),
            metrics.clone(),
            cancel.clone(),
        );

        assert!(worker.submit(Bytes::from("a")));
        assert!(worker.submit(Bytes::from("b")));
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(buffer.payloads().await, vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(metrics.get_buffer_file_in(), 2);
    }

    #[test]
    fn test_reject_new_when_full() {
        let queue = HandoffQueue {
            entries: Mutex::new(VecDeque::new()),
            capacity: 2,
            policy: BackpressurePolicy::RejectNew,
            notify: Notify::new(),
        };
        assert!(matches!(queue.offer(Bytes::from("1")), Offer::Accepted));
        assert!(matches!(queue.offer(Bytes::from("2")), Offer::Accepted));
        assert!(matches!(queue.offer(Bytes::from("3")), Offer::Rejected));
        assert_eq!(queue.drain(10), vec![Bytes::from("1"), Bytes::from("2")]);
    }

    #[test]
    fn test_drop_oldest_when_full() {
        let queue = HandoffQueue {
            entries: Mutex::new(VecDeque::new()),
            capacity: 2,
            policy: BackpressurePolicy::DropOldest,
            notify: Notify::new(),
        };
        queue.offer(Bytes::from("1"));
        queue.offer(Bytes::from("2"));
        assert!(matches!(queue.offer(Bytes::from("3")), Offer::Displaced));
        assert_eq!(queue.drain(10), vec![Bytes::from("2"), Bytes::from("3")]);
    }

    #[tokio::test]
    async fn test_rejection_counted() {
        let buffer = Arc::new(InMemoryBuffer::new());
        let metrics = metrics();
        let cancel = CancellationToken::new();
        // Current-thread runtime: the append task cannot drain until we yield
        let (worker, handle) = StandardizationWorker::spawn(
            buffer.clone(),
            &config(1, BackpressurePolicy::RejectNew),
            metrics.clone(),
            cancel.clone(),
        );
        let accepted = (0..5)
            .filter(|i| worker.submit(Bytes::from(i.to_string())))
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(metrics.get_handoff_rejected(), 5 - accepted as u64);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(buffer.payloads().await.len(), accepted);
    }
}
