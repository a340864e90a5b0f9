use std::sync::Arc;

use brx_schema::{BrowserPerfData, WireMessage};

use crate::context::ReceiverContext;
use crate::core_info::PerfDataCoreInfo;
use crate::decorator::{PagePathStandard, PerfDataDecorator};
use crate::error::{ReceiverError, Result};
use crate::listener::{ListenerManager, PerfDataListener};
use crate::metrics::{KindMetrics, TelemetryKind};
use crate::parser::{defer, guarded_parse, DataSource};
use crate::standardization::StandardizationWorker;

pub struct PerfDataParser<'a> {
    ctx: &'a ReceiverContext,
    worker: &'a StandardizationWorker,
    metrics: &'a KindMetrics,
    listeners: Vec<Box<dyn PerfDataListener>>,
}

impl<'a> PerfDataParser<'a> {
    pub fn new(
        ctx: &'a ReceiverContext,
        worker: &'a StandardizationWorker,
        metrics: &'a KindMetrics,
        listeners: Vec<Box<dyn PerfDataListener>>,
    ) -> Self {
        Self {
            ctx,
            worker,
            metrics,
            listeners,
        }
    }

    /// True when the record needs no further attempts: dispatched, or
    /// dropped for good.
    pub fn parse(mut self, message: Arc<BrowserPerfData>, source: DataSource) -> bool {
        let (ctx, metrics) = (self.ctx, self.metrics);
        let record = Arc::clone(&message);
        guarded_parse(
            ctx,
            metrics,
            &record.unique_id,
            record.service_id,
            record.service_version_id,
            || self.resolve(message, source),
        )
    }

    fn resolve(&mut self, message: Arc<BrowserPerfData>, source: DataSource) -> Result<bool> {
        let mut decorator = PerfDataDecorator::new(message);

        let time = match decorator.time() {
            Some(t) => t,
            None => {
                let now = self.ctx.clock.now_millis();
                decorator.set_time(now);
                now
            }
        };
        for i in 0..decorator.error_log_count() {
            if let Some(mut entry) = decorator.error_log(i) {
                if entry.time().is_none() {
                    entry.set_time(time);
                }
            }
        }

        let service_id = decorator.service_id();
        if !self.ctx.exchanger.exchange(&mut decorator, service_id) {
            defer(self.worker, self.metrics, source, || {
                Ok(decorator.to_bytes()?)
            })?;
            return Ok(false);
        }

        let data_binary = decorator.to_bytes()?;
        let core = PerfDataCoreInfo::resolve(&decorator, data_binary).ok_or_else(|| {
            ReceiverError::Unresolved {
                unique_id: decorator.unique_id().to_string(),
            }
        })?;
        for listener in self.listeners.iter_mut() {
            listener.parse(&decorator, &core)?;
        }
        for listener in self.listeners.iter_mut() {
            listener.build()?;
        }
        Ok(true)
    }
}

/// Entry point for perf reports, live and replayed
pub struct PerfDataProducer {
    ctx: Arc<ReceiverContext>,
    listeners: Arc<ListenerManager>,
    worker: StandardizationWorker,
    metrics: KindMetrics,
}

impl PerfDataProducer {
    pub fn new(
        ctx: Arc<ReceiverContext>,
        listeners: Arc<ListenerManager>,
        worker: StandardizationWorker,
    ) -> Self {
        let metrics = ctx.metrics.for_kind(TelemetryKind::PerfData);
        Self {
            ctx,
            listeners,
            worker,
            metrics,
        }
    }

    pub fn metrics(&self) -> &KindMetrics {
        &self.metrics
    }

    fn parser(&self) -> PerfDataParser<'_> {
        PerfDataParser::new(
            &self.ctx,
            &self.worker,
            &self.metrics,
            self.listeners.create_perf_data_listeners(&self.ctx),
        )
    }

    /// Live path
    pub fn send(&self, message: BrowserPerfData) -> bool {
        self.parser().parse(Arc::new(message), DataSource::Live)
    }

    /// Live path from a raw request body. A body that does not decode is
    /// counted and dropped.
    pub fn send_bytes(&self, body: &[u8]) -> bool {
        match BrowserPerfData::from_bytes(body) {
            Ok(message) => self.send(message),
            Err(e) => {
                self.metrics.inc_parse_error();
                tracing::error!(kind = %self.metrics.kind(), error = %e, "Malformed perf report");
                true
            }
        }
    }

    /// Replay callback for the retry buffer
    pub fn call(&self, payload: &[u8]) -> bool {
        let message = match BrowserPerfData::from_bytes(payload) {
            Ok(m) => m,
            Err(e) => {
                self.metrics.inc_parse_error();
                tracing::error!(kind = %self.metrics.kind(), error = %e, "Dropping undecodable buffered entry");
                return true;
            }
        };
        let handled = self
            .parser()
            .parse(Arc::new(message), DataSource::BufferReplay);
        if handled {
            self.metrics.inc_buffer_file_out();
        }
        handled
    }
}
