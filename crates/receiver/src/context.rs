use std::sync::Arc;

use crate::clock::{SystemClock, WallClock};
use crate::exchanger::PagePathIdExchanger;
use crate::inventory::{InventoryCache, InventoryRegister};
use crate::metrics::ReceiverMetrics;
use crate::receiver::SourceReceiver;
use crate::sampler::Sampler;

/// Collaborators shared by every parser and listener.
/// Built once at startup and passed around behind an `Arc`.
pub struct ReceiverContext {
    pub cache: Arc<dyn InventoryCache>,
    pub register: Arc<dyn InventoryRegister>,
    pub exchanger: PagePathIdExchanger,
    pub receiver: Arc<dyn SourceReceiver>,
    pub clock: Arc<dyn WallClock>,
    pub sampler: Sampler,
    pub metrics: ReceiverMetrics,
}

impl ReceiverContext {
    pub fn new(
        cache: Arc<dyn InventoryCache>,
        register: Arc<dyn InventoryRegister>,
        receiver: Arc<dyn SourceReceiver>,
        sampler: Sampler,
        metrics: ReceiverMetrics,
    ) -> Self {
        Self {
            exchanger: PagePathIdExchanger::new(Arc::clone(&register)),
            cache,
            register,
            receiver,
            clock: Arc::new(SystemClock),
            sampler,
            metrics,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }
}
