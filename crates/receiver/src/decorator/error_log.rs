use std::sync::Arc;

use brx_schema::{BrowserErrorLog, ErrorCategory, SchemaError, WireMessage};
use bytes::Bytes;

use super::{CowMessage, PagePathStandard};

/// Decorator over a standalone error log
pub struct ErrorLogDecorator {
    message: CowMessage<BrowserErrorLog>,
}

impl ErrorLogDecorator {
    pub fn new(origin: Arc<BrowserErrorLog>) -> Self {
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

    pub fn category(&self) -> ErrorCategory {
        self.message.get().category
    }

    pub fn time(&self) -> Option<i64> {
        self.message.get().time
    }

    pub fn set_time(&mut self, time: i64) {
        self.message.make_mut().time = Some(time);
    }

    pub fn materialize(&mut self) {
        self.message.make_mut();
    }

    pub fn is_materialized(&self) -> bool {
        self.message.is_materialized()
    }

    pub fn build(self) -> Arc<BrowserErrorLog> {
        self.message.build()
    }

    pub fn to_bytes(&self) -> Result<Bytes, SchemaError> {
        self.message.get().to_bytes()
    }
}

impl PagePathStandard for ErrorLogDecorator {
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
