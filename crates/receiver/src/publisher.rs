//! Publishes domain events to the transport, off the ingest path.
//!
//! `receive` only enqueues; a single task serializes and publishes each event
//! on "{prefix}.{scope}".

use std::sync::Arc;

use brx_middleware::{SubjectBuilder, Transport};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metrics::ReceiverMetrics;
use crate::receiver::SourceReceiver;
use crate::source::Source;

pub struct TransportSourceReceiver {
    tx: mpsc::Sender<Source>,
    metrics: ReceiverMetrics,
}

impl TransportSourceReceiver {
    pub fn spawn(
        transport: Arc<dyn Transport>,
        subject_prefix: &str,
        capacity: usize,
        metrics: ReceiverMetrics,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let subjects = SubjectBuilder::new(subject_prefix);
        let handle = tokio::spawn(publish_loop(rx, transport, subjects, cancel));
        (Self { tx, metrics }, handle)
    }
}

impl SourceReceiver for TransportSourceReceiver {
    fn receive(&self, source: Source) {
        if let Err(e) = self.tx.try_send(source) {
            self.metrics.inc_source_dropped();
            let scope = match &e {
                mpsc::error::TrySendError::Full(s) | mpsc::error::TrySendError::Closed(s) => {
                    s.scope()
                }
            };
            tracing::warn!(scope = %scope, error = %e, "Dropped domain event");
        }
    }
}

async fn publish_loop(
    mut rx: mpsc::Receiver<Source>,
    transport: Arc<dyn Transport>,
    subjects: SubjectBuilder,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            maybe = rx.recv() => match maybe {
                Some(source) => publish(&*transport, &subjects, &source).await,
                None => break,
            },
            _ = cancel.cancelled() => {
                // Flush what is already queued, then stop
                rx.close();
                while let Some(source) = rx.recv().await {
                    publish(&*transport, &subjects, &source).await;
                }
                break;
            }
        }
    }
    if let Err(e) = transport.flush().await {
        tracing::warn!(error = %e, "Failed to flush domain events on shutdown");
    }
    tracing::info!("Domain event publisher stopped");
}

async fn publish(transport: &dyn Transport, subjects: &SubjectBuilder, source: &Source) {
    let subject = subjects.scope(source.scope().as_str());
    let payload = match serde_json::to_vec(source) {
        Ok(p) => Bytes::from(p),
        Err(e) => {
            tracing::error!(error = %e, scope = %source.scope(), "Failed to serialize domain event");
            return;
        }
    };
    if let Err(e) = transport.publish(&subject, payload).await {
        tracing::error!(error = %e, subject = %subject, "Failed to publish domain event");
    }
}
