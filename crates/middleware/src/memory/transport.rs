use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::latency::now_tsc;
use crate::transport::{Subscription, Transport, TransportMessage};

const FANOUT_CAPACITY: usize = 1024;

/// Process-local transport.
///
/// Every publish is recorded so tests can assert on traffic after the fact.
/// Live subscribers share one broadcast channel and filter by subject, which
/// also gives them the `>` and `*` wildcards.
pub struct InMemoryTransport {
    fanout: broadcast::Sender<TransportMessage>,
    sequence: AtomicU64,
    history: Mutex<Vec<TransportMessage>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            fanout: broadcast::channel(FANOUT_CAPACITY).0,
            sequence: AtomicU64::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Everything published so far, oldest first
    pub fn published(&self) -> Vec<TransportMessage> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn published_on(&self, subject: &str) -> Vec<TransportMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.subject == subject)
            .collect()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// NATS-style subject match: `*` is one token, a trailing `>` the rest
fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut tokens = subject.split('.');
    for p in pattern.split('.') {
        match (p, tokens.next()) {
            (">", Some(_)) => return true,
            ("*", Some(_)) => {}
            (p, Some(t)) if p == t => {}
            _ => return false,
        }
    }
    tokens.next().is_none()
}

struct FilteredSubscription {
    pattern: String,
    rx: broadcast::Receiver<TransportMessage>,
}

#[async_trait]
impl Subscription for FilteredSubscription {
    async fn next(&mut self) -> Result<Option<TransportMessage>, TransportError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if subject_matches(&self.pattern, &msg.subject) => {
                    return Ok(Some(TransportMessage {
                        received_at: now_tsc(),
                        ..msg
                    }))
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(pattern = %self.pattern, skipped, "In-memory subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        let msg = TransportMessage {
            subject: subject.to_string(),
            payload,
            received_at: now_tsc(),
            sequence: Some(self.sequence.fetch_add(1, Ordering::Relaxed)),
        };
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(msg.clone());
        // Err only means nobody is listening
        let _ = self.fanout.send(msg);
        Ok(())
    }

    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError> {
        Ok(Box::new(FilteredSubscription {
            pattern: subject.to_string(),
            rx: self.fanout.subscribe(),
        }))
    }
}
