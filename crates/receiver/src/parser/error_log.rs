use std::sync::Arc;

use brx_schema::{BrowserErrorLog, WireMessage};

use crate::context::ReceiverContext;
use crate::core_info::ErrorLogCoreInfo;
use crate::decorator::{ErrorLogDecorator, PagePathStandard};
use crate::error::{ReceiverError, Result};
use crate::listener::{ErrorLogListener, ListenerManager};
use crate::metrics::{KindMetrics, TelemetryKind};
use crate::parser::{defer, guarded_parse, DataSource};
use crate::standardization::StandardizationWorker;

pub struct ErrorLogParser<'a> {
    ctx: &'a ReceiverContext,
    worker: &'a StandardizationWorker,
    metrics: &'a KindMetrics,
    listeners: Vec<Box<dyn ErrorLogListener>>,
}

impl<'a> ErrorLogParser<'a> {
    pub fn new(
        ctx: &'a ReceiverContext,
        worker: &'a StandardizationWorker,
        metrics: &'a KindMetrics,
        listeners: Vec<Box<dyn ErrorLogListener>>,
    ) -> Self {
        Self {
            ctx,
            worker,
            metrics,
            listeners,
        }
    }

    pub fn parse(mut self, message: Arc<BrowserErrorLog>, source: DataSource) -> bool {
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

    fn resolve(&mut self, message: Arc<BrowserErrorLog>, source: DataSource) -> Result<bool> {
        let mut decorator = ErrorLogDecorator::new(message);
        if decorator.time().is_none() {
            decorator.set_time(self.ctx.clock.now_millis());
        }

        let service_id = decorator.service_id();
        if !self.ctx.exchanger.exchange(&mut decorator, service_id) {
            defer(self.worker, self.metrics, source, || {
                Ok(decorator.to_bytes()?)
            })?;
            return Ok(false);
        }

        let data_binary = decorator.to_bytes()?;
        let core = ErrorLogCoreInfo::resolve(&decorator, data_binary).ok_or_else(|| {
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

/// Entry point for standalone error logs, live and replayed
pub struct ErrorLogProducer {
    ctx: Arc<ReceiverContext>,
    listeners: Arc<ListenerManager>,
    worker: StandardizationWorker,
    metrics: KindMetrics,
}

impl ErrorLogProducer {
    pub fn new(
        ctx: Arc<ReceiverContext>,
        listeners: Arc<ListenerManager>,
        worker: StandardizationWorker,
    ) -> Self {
        let metrics = ctx.metrics.for_kind(TelemetryKind::ErrorLog);
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

    fn parser(&self) -> ErrorLogParser<'_> {
        ErrorLogParser::new(
            &self.ctx,
            &self.worker,
            &self.metrics,
            self.listeners.create_error_log_listeners(&self.ctx),
        )
    }

    pub fn send(&self, message: BrowserErrorLog) -> bool {
        self.parser().parse(Arc::new(message), DataSource::Live)
    }

    /// Live path for a single JSON log
    pub fn send_bytes(&self, body: &[u8]) -> bool {
        match BrowserErrorLog::from_bytes(body) {
            Ok(message) => self.send(message),
            Err(e) => {
                self.metrics.inc_parse_error();
                tracing::error!(kind = %self.metrics.kind(), error = %e, "Malformed error log");
                true
            }
        }
    }

    /// Live path for a JSON array of logs. Returns how many were handled.
    pub fn send_batch_bytes(&self, body: &[u8]) -> usize {
        match serde_json::from_slice::<Vec<BrowserErrorLog>>(body) {
            Ok(messages) => messages
                .into_iter()
                .map(|m| self.send(m))
                .filter(|&handled| handled)
                .count(),
            Err(e) => {
                self.metrics.inc_parse_error();
                tracing::error!(kind = %self.metrics.kind(), error = %e, "Malformed error log batch");
                0
            }
        }
    }

    /// Replay callback for the retry buffer
    pub fn call(&self, payload: &[u8]) -> bool {
        let message = match BrowserErrorLog::from_bytes(payload) {
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
