//! Outbound seam for domain events.
//!
//! The receiver only publishes. Subscriptions exist so tests and local tools
//! can watch what the aggregation side would see.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// One event as seen by a subscriber
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub subject: String,
    pub payload: Bytes,
    /// Raw TSC reading taken on receipt
    pub received_at: u64,
    /// Publish order, where the transport tracks it
    pub sequence: Option<u64>,
}

#[async_trait]
pub trait Subscription: Send + Sync {
    /// Next message, or `None` once the subscription has ended
    async fn next(&mut self) -> Result<Option<TransportMessage>, TransportError>;
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Wait until everything published so far has left the process
    async fn flush(&self) -> Result<(), TransportError>;

    /// Subscribe to a subject; NATS wildcards are honoured where supported
    async fn subscribe(&self, subject: &str) -> Result<Box<dyn Subscription>, TransportError>;
}
