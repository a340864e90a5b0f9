use std::sync::Mutex;

use crate::source::{Scope, Source};

/// Aggregation-side sink. Fire and forget; must not block the caller.
pub trait SourceReceiver: Send + Sync {
    fn receive(&self, source: Source);
}

/// Collects every event; for tests and local inspection
#[derive(Default)]
pub struct MemorySourceReceiver {
    events: Mutex<Vec<Source>>,
}

impl MemorySourceReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Source> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn of_scope(&self, scope: Scope) -> Vec<Source> {
        self.events()
            .into_iter()
            .filter(|s| s.scope() == scope)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl SourceReceiver for MemorySourceReceiver {
    fn receive(&self, source: Source) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(source);
    }
}
