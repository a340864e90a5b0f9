use std::sync::Arc;

use brx_schema::ErrorCategory;

use crate::context::ReceiverContext;
use crate::core_info::PerfDataCoreInfo;
use crate::decorator::PerfDataDecorator;
use crate::error::{ReceiverError, Result};
use crate::listener::PerfDataListener;
use crate::sampler::{sample_key, SampleGate, SampleStatus};
use crate::source::{BrowserAppErrorLog, BrowserAppPageErrorLog, Source};

struct Scratch {
    service_id: u32,
    service_name: String,
    page_path_id: u32,
    page_path: String,
    time_bucket: i64,
    categories: Vec<ErrorCategory>,
}

/// Error counts per service and page, from the entries nested in a perf
/// report. The whole report is sampled as one group.
pub struct ErrorCategoryListener {
    ctx: Arc<ReceiverContext>,
    gate: SampleGate,
    scratch: Option<Scratch>,
}

impl ErrorCategoryListener {
    pub fn new(ctx: Arc<ReceiverContext>) -> Self {
        let gate = SampleGate::new(ctx.sampler);
        Self {
            ctx,
            gate,
            scratch: None,
        }
    }
}

impl PerfDataListener for ErrorCategoryListener {
    fn parse(&mut self, decorator: &PerfDataDecorator, core: &PerfDataCoreInfo) -> Result<()> {
        if decorator.error_log_count() == 0 {
            return Ok(());
        }
        let key = sample_key(&core.unique_id);
        let mut categories = Vec::with_capacity(decorator.error_log_count());
        for entry in decorator.error_logs() {
            if self.gate.admit(key) {
                categories.push(entry.category);
            }
        }
        if categories.is_empty() {
            return Ok(());
        }

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
            time_bucket: core.minute_time_bucket,
            categories,
        });
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        if self.gate.seal() != SampleStatus::Sampled {
            return Ok(());
        }
        let Some(s) = self.scratch.take() else {
            return Ok(());
        };
        for category in s.categories {
            self.ctx
                .receiver
                .receive(Source::BrowserAppErrorLog(BrowserAppErrorLog {
                    service_id: s.service_id,
                    name: s.service_name.clone(),
                    category,
                    time_bucket: s.time_bucket,
                }));
            self.ctx
                .receiver
                .receive(Source::BrowserAppPageErrorLog(BrowserAppPageErrorLog {
                    page_path_id: s.page_path_id,
                    name: s.page_path.clone(),
                    service_id: s.service_id,
                    service_name: s.service_name.clone(),
                    category,
                    time_bucket: s.time_bucket,
                }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::test_support::{fixture, resolved_report};
    use crate::source::Scope;

    fn run(rate: u32, categories: &[ErrorCategory]) -> Arc<crate::receiver::MemorySourceReceiver> {
        let f = fixture(rate);
        let (decorator, core) = resolved_report(categories);
        let mut listener = ErrorCategoryListener::new(f.ctx.clone());
        listener.parse(&decorator, &core).unwrap();
        listener.build().unwrap();
        f.events
    }

    #[test]
    fn test_sampled_group_emits_every_entry() {
        let events = run(
            10_000,
            &[
                ErrorCategory::ScriptError,
                ErrorCategory::AjaxError,
                ErrorCategory::VueError,
            ],
        );
        let per_service = events.of_scope(Scope::BrowserAppErrorLog);
        assert_eq!(per_service.len(), 3);
        assert_eq!(events.of_scope(Scope::BrowserAppPageErrorLog).len(), 3);
        match &per_service[1] {
            Source::BrowserAppErrorLog(e) => {
                assert_eq!(e.category, ErrorCategory::AjaxError);
                assert_eq!(e.name, "shop");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_ignored_group_emits_nothing() {
        let events = run(0, &[ErrorCategory::ScriptError, ErrorCategory::AjaxError]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_one_percent_rate_keeps_group_whole() {
        let categories = [
            ErrorCategory::ScriptError,
            ErrorCategory::AjaxError,
            ErrorCategory::ResourceError,
        ];
        // Keys land at 62 and 8680 out of 10000
        for (unique_id, expected) in [("report-1600", 3), ("report-1", 0)] {
            let f = fixture(100);
            let (decorator, mut core) = resolved_report(&categories);
            core.unique_id = unique_id.to_string();

            let mut listener = ErrorCategoryListener::new(f.ctx.clone());
            listener.parse(&decorator, &core).unwrap();
            listener.build().unwrap();

            assert_eq!(
                f.events.of_scope(Scope::BrowserAppErrorLog).len(),
                expected,
                "{unique_id}"
            );
            assert_eq!(
                f.events.of_scope(Scope::BrowserAppPageErrorLog).len(),
                expected,
                "{unique_id}"
            );
        }
    }

    #[test]
    fn test_report_without_errors_emits_nothing() {
        assert!(run(10_000, &[]).is_empty());
    }
}
