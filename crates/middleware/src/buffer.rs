use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BufferError;

/// One parked payload, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEntry {
    pub sequence: u64,
    pub payload: Bytes,
}

/// Outcome of one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Entries handed to the callback
    pub delivered: u64,
    /// Entries the callback reported handled; these are gone
    pub handled: u64,
    /// Entries kept for the next pass
    pub pending: u64,
    /// Entries dropped by segment eviction since the previous pass
    pub evicted: u64,
}

impl ReplayStats {
    pub fn merge(&mut self, other: ReplayStats) {
        self.delivered += other.delivered;
        self.handled += other.handled;
        self.pending += other.pending;
        self.evicted += other.evicted;
    }
}

/// Callback invoked per entry during replay. Returns true when handled.
pub type ReplayCallback<'a> = &'a mut (dyn FnMut(&BufferEntry) -> bool + Send);

/// Append/replay queue giving at-least-once redelivery.
///
/// A replay pass covers the entries present when it starts, in arrival order.
/// Handled entries are consumed; the rest are kept and offered again on the
/// next pass. Entries appended during a pass wait for the next one.
#[async_trait]
pub trait RetryBuffer: Send + Sync {
    async fn append(&self, payload: Bytes) -> Result<u64, BufferError>;

    async fn replay(&self, callback: ReplayCallback<'_>) -> Result<ReplayStats, BufferError>;

    /// Entries not yet consumed
    async fn pending(&self) -> Result<u64, BufferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_stats_merge() {
        let mut total = ReplayStats::default();
        total.merge(ReplayStats {
            delivered: 3,
            handled: 2,
            pending: 1,
            evicted: 0,
        });
        total.merge(ReplayStats {
            delivered: 1,
            handled: 0,
            pending: 1,
            evicted: 5,
        });
        assert_eq!(
            total,
            ReplayStats {
                delivered: 4,
                handled: 2,
                pending: 2,
                evicted: 5,
            }
        );
    }
}
