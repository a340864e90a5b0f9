use std::sync::Arc;

use crate::decorator::PagePathStandard;
use crate::inventory::{DetectPoint, InventoryRegister};

/// Resolves page paths to endpoint ids.
///
/// A miss is not an error: the registry has queued the name and the caller
/// decides whether to park the record for a later attempt.
#[derive(Clone)]
pub struct PagePathIdExchanger {
    register: Arc<dyn InventoryRegister>,
}

impl PagePathIdExchanger {
    pub fn new(register: Arc<dyn InventoryRegister>) -> Self {
        Self { register }
    }

    /// Writes the resolved id into `record` and returns true, or returns
    /// false and leaves `record` untouched.
    pub fn exchange<R: PagePathStandard>(&self, record: &mut R, service_id: u32) -> bool {
        match self.register.get_or_create_endpoint(
            service_id,
            record.page_path(),
            DetectPoint::Server,
        ) {
            Some(id) => {
                record.set_page_path_id(id);
                true
            }
            None => {
                tracing::debug!(
                    service_id,
                    page_path = %record.page_path(),
                    "Page path id not registered yet"
                );
                false
            }
        }
    }
}
