//! Periodic redelivery of parked records.

use std::sync::Arc;
use std::time::Duration;

use brx_middleware::{BufferEntry, BufferError, ReplayStats, RetryBuffer};
use tokio_util::sync::CancellationToken;

use crate::metrics::KindMetrics;
use crate::parser::{ErrorLogProducer, PerfDataProducer};

/// Something that takes buffered payloads back. Returns true when an entry
/// is done with.
pub trait BufferConsumer: Send + Sync {
    fn call(&self, payload: &[u8]) -> bool;
    fn metrics(&self) -> &KindMetrics;
}

impl BufferConsumer for PerfDataProducer {
    fn call(&self, payload: &[u8]) -> bool {
        PerfDataProducer::call(self, payload)
    }

    fn metrics(&self) -> &KindMetrics {
        PerfDataProducer::metrics(self)
    }
}

impl BufferConsumer for ErrorLogProducer {
    fn call(&self, payload: &[u8]) -> bool {
        ErrorLogProducer::call(self, payload)
    }

    fn metrics(&self) -> &KindMetrics {
        ErrorLogProducer::metrics(self)
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;

pub struct ReplayLoop {
    buffer: Arc<dyn RetryBuffer>,
    consumer: Arc<dyn BufferConsumer>,
    interval: Duration,
    before_pass: Option<Hook>,
}

impl ReplayLoop {
    pub fn new(
        buffer: Arc<dyn RetryBuffer>,
        consumer: Arc<dyn BufferConsumer>,
        interval: Duration,
    ) -> Self {
        Self {
            buffer,
            consumer,
            interval,
            before_pass: None,
        }
    }

    /// Run `hook` ahead of every pass
    pub fn with_before_pass(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_pass = Some(Box::new(hook));
        self
    }

    pub async fn run_once(&self) -> Result<ReplayStats, BufferError> {
        if let Some(hook) = &self.before_pass {
            hook();
        }
        let consumer = &self.consumer;
        let stats = self
            .buffer
            .replay(&mut |entry: &BufferEntry| consumer.call(&entry.payload))
            .await?;

        let metrics = consumer.metrics();
        if stats.evicted > 0 {
            metrics.inc_buffer_evicted(stats.evicted);
            tracing::warn!(kind = %metrics.kind(), evicted = stats.evicted, "Retry buffer evicted unresolved entries");
        }
        if stats.delivered > 0 {
            tracing::debug!(
                kind = %metrics.kind(),
                delivered = stats.delivered,
                handled = stats.handled,
                pending = stats.pending,
                "Replay pass complete"
            );
        }
        Ok(stats)
    }

    /// Replay every interval until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let kind = self.consumer.metrics().kind();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(kind = %kind, error = %e, "Replay pass failed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        tracing::info!(kind = %kind, "Replay loop stopped");
    }
}
