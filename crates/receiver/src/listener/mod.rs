//! Multi-scope fan-out.
//!
//! A fresh set of listeners is created for every record. Each sees `parse`
//! exactly once with the resolved record, then `build`, which emits zero or
//! more domain events. Order across listeners is not defined.

mod error_category;
mod error_log;
mod heartbeat;
mod perf_detail;
mod perf_record;

use std::sync::Arc;

pub use error_category::ErrorCategoryListener;
pub use error_log::{ErrorLogRecordListener, MultiScopesErrorLogListener};
pub use heartbeat::HeartbeatListener;
pub use perf_detail::MultiScopesPerfDetailListener;
pub use perf_record::PerfDataRecordListener;

use crate::context::ReceiverContext;
use crate::core_info::{ErrorLogCoreInfo, PerfDataCoreInfo};
use crate::decorator::{ErrorLogDecorator, PerfDataDecorator};
use crate::error::Result;

pub trait PerfDataListener: Send {
    fn parse(&mut self, decorator: &PerfDataDecorator, core: &PerfDataCoreInfo) -> Result<()>;
    fn build(&mut self) -> Result<()>;
}

pub trait ErrorLogListener: Send {
    fn parse(&mut self, decorator: &ErrorLogDecorator, core: &ErrorLogCoreInfo) -> Result<()>;
    fn build(&mut self) -> Result<()>;
}

pub trait PerfDataListenerFactory: Send + Sync {
    fn create(&self, ctx: &Arc<ReceiverContext>) -> Box<dyn PerfDataListener>;
}

pub trait ErrorLogListenerFactory: Send + Sync {
    fn create(&self, ctx: &Arc<ReceiverContext>) -> Box<dyn ErrorLogListener>;
}

impl<F> PerfDataListenerFactory for F
where
    F: Fn(&Arc<ReceiverContext>) -> Box<dyn PerfDataListener> + Send + Sync,
{
    fn create(&self, ctx: &Arc<ReceiverContext>) -> Box<dyn PerfDataListener> {
        self(ctx)
    }
}

impl<F> ErrorLogListenerFactory for F
where
    F: Fn(&Arc<ReceiverContext>) -> Box<dyn ErrorLogListener> + Send + Sync,
{
    fn create(&self, ctx: &Arc<ReceiverContext>) -> Box<dyn ErrorLogListener> {
        self(ctx)
    }
}

/// Registry of listener factories, filled at startup
#[derive(Default)]
pub struct ListenerManager {
    perf_data: Vec<Box<dyn PerfDataListenerFactory>>,
    error_log: Vec<Box<dyn ErrorLogListenerFactory>>,
}

impl ListenerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in listener for both streams
    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        manager.add_perf_data(|ctx: &Arc<ReceiverContext>| -> Box<dyn PerfDataListener> {
            Box::new(MultiScopesPerfDetailListener::new(Arc::clone(ctx)))
        });
        manager.add_perf_data(|ctx: &Arc<ReceiverContext>| -> Box<dyn PerfDataListener> {
            Box::new(ErrorCategoryListener::new(Arc::clone(ctx)))
        });
        manager.add_perf_data(|ctx: &Arc<ReceiverContext>| -> Box<dyn PerfDataListener> {
            Box::new(PerfDataRecordListener::new(Arc::clone(ctx)))
        });
        manager.add_perf_data(|ctx: &Arc<ReceiverContext>| -> Box<dyn PerfDataListener> {
            Box::new(HeartbeatListener::new(Arc::clone(ctx)))
        });
        manager.add_error_log(|ctx: &Arc<ReceiverContext>| -> Box<dyn ErrorLogListener> {
            Box::new(MultiScopesErrorLogListener::new(Arc::clone(ctx)))
        });
        manager.add_error_log(|ctx: &Arc<ReceiverContext>| -> Box<dyn ErrorLogListener> {
            Box::new(ErrorLogRecordListener::new(Arc::clone(ctx)))
        });
        manager
    }

    pub fn add_perf_data(&mut self, factory: impl PerfDataListenerFactory + 'static) {
        self.perf_data.push(Box::new(factory));
    }

    pub fn add_error_log(&mut self, factory: impl ErrorLogListenerFactory + 'static) {
        self.error_log.push(Box::new(factory));
    }

    pub fn create_perf_data_listeners(
        &self,
        ctx: &Arc<ReceiverContext>,
    ) -> Vec<Box<dyn PerfDataListener>> {
        self.perf_data.iter().map(|f| f.create(ctx)).collect()
    }

    pub fn create_error_log_listeners(
        &self,
        ctx: &Arc<ReceiverContext>,
    ) -> Vec<Box<dyn ErrorLogListener>> {
        self.error_log.iter().map(|f| f.create(ctx)).collect()
    }

    pub fn perf_data_factories(&self) -> usize {
        self.perf_data.len()
    }

    pub fn error_log_factories(&self) -> usize {
        self.error_log.len()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use brx_schema::{BrowserErrorLog, BrowserPerfData, ErrorCategory, PerfDetail};
    use bytes::Bytes;
    use prometheus::Registry;

    use crate::context::ReceiverContext;
    use crate::core_info::PerfDataCoreInfo;
    use crate::decorator::{PagePathStandard, PerfDataDecorator};
    use crate::inventory::InMemoryInventory;
    use crate::metrics::ReceiverMetrics;
    use crate::receiver::MemorySourceReceiver;
    use crate::sampler::Sampler;

    pub struct Fixture {
        pub ctx: Arc<ReceiverContext>,
        pub inventory: Arc<InMemoryInventory>,
        pub events: Arc<MemorySourceReceiver>,
    }

    pub fn fixture(sample_rate: u32) -> Fixture {
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.add_service(7, "shop");
        inventory.add_instance(70, 7, "v1");
        let events = Arc::new(MemorySourceReceiver::new());
        let ctx = Arc::new(ReceiverContext::new(
            inventory.clone(),
            inventory.clone(),
            events.clone(),
            Sampler::new(sample_rate),
            ReceiverMetrics::new(Registry::new()).unwrap(),
        ));
        Fixture {
            ctx,
            inventory,
            events,
        }
    }

    pub fn resolved_report(categories: &[ErrorCategory]) -> (PerfDataDecorator, PerfDataCoreInfo) {
        let logs = categories
            .iter()
            .map(|&category| BrowserErrorLog {
                unique_id: "u-1".to_string(),
                service_id: 7,
                service_version_id: 70,
                page_path: "/checkout".to_string(),
                category,
                ..Default::default()
            })
            .collect();
        let mut decorator = PerfDataDecorator::new(Arc::new(BrowserPerfData {
            unique_id: "u-1".to_string(),
            service_id: 7,
            service_version_id: 70,
            page_path: "/checkout".to_string(),
            page_path_id: None,
            time: Some(180_000),
            perf_detail: Some(PerfDetail {
                dns_time: 12,
                dom_ready_time: 300,
                ..Default::default()
            }),
            logs,
        }));
        decorator.set_page_path_id(42);
        assert_eq!(decorator.page_path_id(), Some(42));
        let core = PerfDataCoreInfo::resolve(&decorator, Bytes::from("payload")).unwrap();
        (decorator, core)
    }
}
