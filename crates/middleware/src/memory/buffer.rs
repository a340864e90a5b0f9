use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use crate::buffer::{BufferEntry, ReplayCallback, ReplayStats, RetryBuffer};
use crate::error::BufferError;

struct State {
    entries: VecDeque<BufferEntry>,
    next_sequence: u64,
    appended: u64,
}

/// Non-durable retry buffer with the same replay semantics as the file one
pub struct InMemoryBuffer {
    state: Mutex<State>,
}

impl InMemoryBuffer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                entries: VecDeque::new(),
                next_sequence: 0,
                appended: 0,
            }),
        }
    }

    /// Total appends since creation, including re-queued entries
    pub async fn appended(&self) -> u64 {
        self.state.lock().await.appended
    }

    /// Snapshot of pending payloads, oldest first
    pub async fn payloads(&self) -> Vec<Bytes> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .map(|e| e.payload.clone())
            .collect()
    }
}

impl Default for InMemoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetryBuffer for InMemoryBuffer {
    async fn append(&self, payload: Bytes) -> Result<u64, BufferError> {
        let mut state = self.state.lock().await;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.appended += 1;
        state.entries.push_back(BufferEntry { sequence, payload });
        Ok(sequence)
    }

    async fn replay(&self, callback: ReplayCallback<'_>) -> Result<ReplayStats, BufferError> {
        let batch: Vec<BufferEntry> = {
            let mut state = self.state.lock().await;
            state.entries.drain(..).collect()
        };

        let mut stats = ReplayStats::default();
        let mut kept = Vec::new();
        for entry in batch {
            stats.delivered += 1;
            if callback(&entry) {
                stats.handled += 1;
            } else {
                stats.pending += 1;
                kept.push(entry);
            }
        }

        // Kept entries go back ahead of anything appended during the pass
        let mut state = self.state.lock().await;
        for entry in kept.into_iter().rev() {
            state.entries.push_front(entry);
        }
        Ok(stats)
    }

    async fn pending(&self) -> Result<u64, BufferError> {
        Ok(self.state.lock().await.entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_in_arrival_order() {
        let buffer = InMemoryBuffer::new();
        for p in ["a", "b", "c"] {
            buffer.append(Bytes::from(p)).await.unwrap();
        }

        let mut seen = Vec::new();
        let stats = buffer
            .replay(&mut |e: &BufferEntry| {
                seen.push(e.payload.clone());
                true
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
        assert_eq!(stats.handled, 3);
        assert_eq!(buffer.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unhandled_entries_kept_for_next_pass() {
        let buffer = InMemoryBuffer::new();
        buffer.append(Bytes::from("keep")).await.unwrap();
        buffer.append(Bytes::from("drop")).await.unwrap();

        let stats = buffer
            .replay(&mut |e: &BufferEntry| e.payload == Bytes::from("drop"))
            .await
            .unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(buffer.payloads().await, vec![Bytes::from("keep")]);

        // Second pass sees the same entry with its original sequence
        let mut sequences = Vec::new();
        buffer
            .replay(&mut |e: &BufferEntry| {
                sequences.push(e.sequence);
                true
            })
            .await
            .unwrap();
        assert_eq!(sequences, vec![0]);
        assert_eq!(buffer.appended().await, 2);
    }
}
