use std::sync::Arc;

use brx_schema::{BrowserErrorLog, BrowserPerfData, ErrorCategory, PerfDetail, SchemaError, WireMessage};
use bytes::Bytes;

use super::{CowMessage, PagePathStandard};

/// Decorator over one page-load performance report
pub struct PerfDataDecorator {
    message: CowMessage<BrowserPerfData>,
}

impl PerfDataDecorator {
    pub fn new(origin: Arc<BrowserPerfData>) -> Self {
        Self {
            message: CowMessage::new(origin),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.message.get().unique_id
    }

    pub fn service_version_id(&self) -> u32 {
        self.message.get().service_version_id
    }

    pub fn time(&self) -> Option<i64> {
        self.message.get().time
    }

    pub fn set_time(&mut self, time: i64) {
        self.message.make_mut().time = Some(time);
    }

    pub fn is_error(&self) -> bool {
        self.message.get().is_error()
    }

    pub fn perf_detail(&self) -> PerfDetailDecorator<'_> {
        PerfDetailDecorator {
            detail: self.message.get().perf_detail.as_ref(),
        }
    }

    pub fn error_log_count(&self) -> usize {
        self.message.get().logs.len()
    }

    /// Nested error entry at `index`. Writes through it land in this
    /// decorator's shadow.
    pub fn error_log(&mut self, index: usize) -> Option<ErrorLogEntryDecorator<'_>> {
        if index >= self.error_log_count() {
            return None;
        }
        Some(ErrorLogEntryDecorator {
            parent: &mut self.message,
            index,
        })
    }

    /// Read-only iteration over nested error entries
    pub fn error_logs(&self) -> impl Iterator<Item = &BrowserErrorLog> {
        self.message.get().logs.iter()
    }

    pub fn materialize(&mut self) {
        self.message.make_mut();
    }

    pub fn is_materialized(&self) -> bool {
        self.message.is_materialized()
    }

    /// The origin itself when nothing was written, otherwise a new message
    pub fn build(self) -> Arc<BrowserPerfData> {
        self.message.build()
    }

    pub fn to_bytes(&self) -> Result<Bytes, SchemaError> {
        self.message.get().to_bytes()
    }
}

impl PagePathStandard for PerfDataDecorator {
    fn service_id(&self) -> u32 {
        self.message.get().service_id
    }

    fn page_path(&self) -> &str {
        &self.message.get().page_path
    }

    fn page_path_id(&self) -> Option<u32> {
        self.message.get().page_path_id
    }

    fn set_page_path_id(&mut self, id: u32) {
        self.message.make_mut().page_path_id = Some(id);
    }
}

/// Timing breakdown of a report; absent detail reads as zeros
pub struct PerfDetailDecorator<'a> {
    detail: Option<&'a PerfDetail>,
}

impl PerfDetailDecorator<'_> {
    fn field(&self, f: impl Fn(&PerfDetail) -> i32) -> i32 {
        self.detail.map(f).unwrap_or(0)
    }

    pub fn redirect_time(&self) -> i32 {
        self.field(|d| d.redirect_time)
    }

    pub fn dns_time(&self) -> i32 {
        self.field(|d| d.dns_time)
    }

    pub fn req_time(&self) -> i32 {
        self.field(|d| d.req_time)
    }

    pub fn dom_analysis_time(&self) -> i32 {
        self.field(|d| d.dom_analysis_time)
    }

    pub fn dom_ready_time(&self) -> i32 {
        self.field(|d| d.dom_ready_time)
    }

    pub fn blank_time(&self) -> i32 {
        self.field(|d| d.blank_time)
    }
}

/// One error entry nested in a perf report
pub struct ErrorLogEntryDecorator<'a> {
    parent: &'a mut CowMessage<BrowserPerfData>,
    index: usize,
}

impl ErrorLogEntryDecorator<'_> {
    fn entry(&self) -> &BrowserErrorLog {
        &self.parent.get().logs[self.index]
    }

    fn entry_mut(&mut self) -> &mut BrowserErrorLog {
        &mut self.parent.make_mut().logs[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn unique_id(&self) -> &str {
        &self.entry().unique_id
    }

    pub fn category(&self) -> ErrorCategory {
        self.entry().category
    }

    pub fn time(&self) -> Option<i64> {
        self.entry().time
    }

    pub fn set_time(&mut self, time: i64) {
        self.entry_mut().time = Some(time);
    }

    pub fn page_path_id(&self) -> Option<u32> {
        self.entry().page_path_id
    }

    pub fn set_page_path_id(&mut self, id: u32) {
        self.entry_mut().page_path_id = Some(id);
    }

    /// Materializes the whole report, not just this entry
    pub fn materialize(&mut self) {
        self.parent.make_mut();
    }

    pub fn is_materialized(&self) -> bool {
        self.parent.is_materialized()
    }
}
