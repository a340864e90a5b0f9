use std::sync::Arc;

use brx_schema::ErrorCategory;

use crate::context::ReceiverContext;
use crate::core_info::ErrorLogCoreInfo;
use crate::decorator::ErrorLogDecorator;
use crate::error::{ReceiverError, Result};
use crate::listener::ErrorLogListener;
use crate::sampler::{sample_key, SampleGate, SampleStatus};
use crate::source::{BrowserAppErrorLog, BrowserAppPageErrorLog, BrowserErrorLogRecord, Source};

struct Scratch {
    service_id: u32,
    service_name: String,
    page_path_id: u32,
    page_path: String,
    category: ErrorCategory,
    time_bucket: i64,
}

/// Standalone error logs counted per service and page
pub struct MultiScopesErrorLogListener {
    ctx: Arc<ReceiverContext>,
    scratch: Option<Scratch>,
}

impl MultiScopesErrorLogListener {
    pub fn new(ctx: Arc<ReceiverContext>) -> Self {
        Self { ctx, scratch: None }
    }
}

impl ErrorLogListener for MultiScopesErrorLogListener {
    fn parse(&mut self, _decorator: &ErrorLogDecorator, core: &ErrorLogCoreInfo) -> Result<()> {
        let service = self
            .ctx
            .cache
            .service(core.service_id)
            .ok_or(ReceiverError::MissingService(core.service_id))?;
        self.scratch = Some(Scratch {
            service_id: core.service_id,
            service_name: service.name,
            page_path_id: core.page_path_id,
            page_path: core.page_path.clone(),
            category: core.category,
            time_bucket: core.minute_time_bucket,
        });
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let Some(s) = self.scratch.take() else {
            return Ok(());
        };
        self.ctx
            .receiver
            .receive(Source::BrowserAppErrorLog(BrowserAppErrorLog {
                service_id: s.service_id,
                name: s.service_name.clone(),
                category: s.category,
                time_bucket: s.time_bucket,
            }));
        self.ctx
            .receiver
            .receive(Source::BrowserAppPageErrorLog(BrowserAppPageErrorLog {
                page_path_id: s.page_path_id,
                name: s.page_path,
                service_id: s.service_id,
                service_name: s.service_name,
                category: s.category,
                time_bucket: s.time_bucket,
            }));
        Ok(())
    }
}

/// Keeps the full payload of sampled error logs
pub struct ErrorLogRecordListener {
    ctx: Arc<ReceiverContext>,
    gate: SampleGate,
    record: Option<BrowserErrorLogRecord>,
}

impl ErrorLogRecordListener {
    pub fn new(ctx: Arc<ReceiverContext>) -> Self {
        let gate = SampleGate::new(ctx.sampler);
        Self {
            ctx,
            gate,
            record: None,
        }
    }
}

impl ErrorLogListener for ErrorLogRecordListener {
    fn parse(&mut self, _decorator: &ErrorLogDecorator, core: &ErrorLogCoreInfo) -> Result<()> {
        if !self.gate.admit(sample_key(&core.unique_id)) {
            return Ok(());
        }
        self.record = Some(BrowserErrorLogRecord {
            unique_id: core.unique_id.clone(),
            service_id: core.service_id,
            service_version_id: core.service_version_id,
            page_path_id: core.page_path_id,
            page_path: core.page_path.clone(),
            category: core.category,
            time: core.time,
            time_bucket: core.minute_time_bucket,
            data_binary: core.data_binary.clone(),
        });
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        if self.gate.seal() != SampleStatus::Sampled {
            return Ok(());
        }
        if let Some(record) = self.record.take() {
            self.ctx
                .receiver
                .receive(Source::BrowserErrorLogRecord(record));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::PagePathStandard;
    use crate::listener::test_support::fixture;
    use crate::source::Scope;
    use brx_schema::BrowserErrorLog;
    use bytes::Bytes;

    fn resolved_log() -> (ErrorLogDecorator, ErrorLogCoreInfo) {
        let mut decorator = ErrorLogDecorator::new(Arc::new(BrowserErrorLog {
            unique_id: "e-1".to_string(),
            service_id: 7,
            service_version_id: 70,
            page_path: "/cart".to_string(),
            category: ErrorCategory::PromiseError,
            time: Some(120_500),
            ..Default::default()
        }));
        decorator.set_page_path_id(9);
        let core = ErrorLogCoreInfo::resolve(&decorator, Bytes::from("log")).unwrap();
        (decorator, core)
    }

    #[test]
    fn test_multi_scope_error_log() {
        let f = fixture(10_000);
        let (decorator, core) = resolved_log();
        let mut listener = MultiScopesErrorLogListener::new(f.ctx.clone());
        listener.parse(&decorator, &core).unwrap();
        listener.build().unwrap();

        assert_eq!(f.events.len(), 2);
        match &f.events.of_scope(Scope::BrowserAppPageErrorLog)[0] {
            Source::BrowserAppPageErrorLog(e) => {
                assert_eq!(e.page_path_id, 9);
                assert_eq!(e.name, "/cart");
                assert_eq!(e.category, ErrorCategory::PromiseError);
                assert_eq!(e.time_bucket, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_record_follows_sample_rate() {
        let f = fixture(10_000);
        let (decorator, core) = resolved_log();
        let mut listener = ErrorLogRecordListener::new(f.ctx.clone());
        listener.parse(&decorator, &core).unwrap();
        listener.build().unwrap();
        assert_eq!(f.events.of_scope(Scope::BrowserErrorLogRecord).len(), 1);

        let f = fixture(0);
        let mut listener = ErrorLogRecordListener::new(f.ctx.clone());
        listener.parse(&decorator, &core).unwrap();
        listener.build().unwrap();
        assert!(f.events.is_empty());
    }
}
