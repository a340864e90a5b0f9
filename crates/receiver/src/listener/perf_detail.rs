use std::sync::Arc;

use crate::context::ReceiverContext;
use crate::core_info::PerfDataCoreInfo;
use crate::decorator::PerfDataDecorator;
use crate::error::{ReceiverError, Result};
use crate::listener::PerfDataListener;
use crate::source::{
    BrowserAppPagePerf, BrowserAppPerf, BrowserAppSingleVersionPagePerf,
    BrowserAppSingleVersionPerf, PerfTimings, Source,
};

struct Scratch {
    service_id: u32,
    service_name: String,
    instance_id: u32,
    instance_name: String,
    page_path_id: u32,
    page_path: String,
    status: bool,
    timings: PerfTimings,
    time_bucket: i64,
}

/// Page-load timings per service, instance, page and instance×page
pub struct MultiScopesPerfDetailListener {
    ctx: Arc<ReceiverContext>,
    scratch: Option<Scratch>,
}

impl MultiScopesPerfDetailListener {
    pub fn new(ctx: Arc<ReceiverContext>) -> Self {
        Self { ctx, scratch: None }
    }
}

impl PerfDataListener for MultiScopesPerfDetailListener {
    fn parse(&mut self, decorator: &PerfDataDecorator, core: &PerfDataCoreInfo) -> Result<()> {
        let service = self
            .ctx
            .cache
            .service(core.service_id)
            .ok_or(ReceiverError::MissingService(core.service_id))?;
        let instance = self
            .ctx
            .cache
            .instance(core.service_version_id)
            .ok_or(ReceiverError::MissingInstance(core.service_version_id))?;

        let detail = decorator.perf_detail();
        self.scratch = Some(Scratch {
            service_id: core.service_id,
            service_name: service.name,
            instance_id: core.service_version_id,
            instance_name: instance.name,
            page_path_id: core.page_path_id,
            page_path: core.page_path.clone(),
            status: !core.is_error,
            timings: PerfTimings {
                redirect_time: detail.redirect_time(),
                dns_time: detail.dns_time(),
                req_time: detail.req_time(),
                dom_analysis_time: detail.dom_analysis_time(),
                dom_ready_time: detail.dom_ready_time(),
                blank_time: detail.blank_time(),
            },
            time_bucket: core.minute_time_bucket,
        });
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let Some(s) = self.scratch.take() else {
            return Ok(());
        };
        let receiver = &self.ctx.receiver;

        receiver.receive(Source::BrowserAppPerf(BrowserAppPerf {
            service_id: s.service_id,
            name: s.service_name.clone(),
            status: s.status,
            timings: s.timings,
            time_bucket: s.time_bucket,
        }));
        receiver.receive(Source::BrowserAppSingleVersionPerf(
            BrowserAppSingleVersionPerf {
                service_version_id: s.instance_id,
                service_id: s.service_id,
                name: s.instance_name.clone(),
                service_name: s.service_name.clone(),
                status: s.status,
                timings: s.timings,
                time_bucket: s.time_bucket,
            },
        ));
        receiver.receive(Source::BrowserAppPagePerf(BrowserAppPagePerf {
            page_path_id: s.page_path_id,
            name: s.page_path.clone(),
            service_id: s.service_id,
            service_name: s.service_name.clone(),
            status: s.status,
            timings: s.timings,
            time_bucket: s.time_bucket,
        }));
        receiver.receive(Source::BrowserAppSingleVersionPagePerf(
            BrowserAppSingleVersionPagePerf {
                service_version_id: s.instance_id,
                page_path_id: s.page_path_id,
                service_id: s.service_id,
                page_path: s.page_path,
                service_version_name: s.instance_name,
                service_name: s.service_name,
                status: s.status,
                timings: s.timings,
                time_bucket: s.time_bucket,
            },
        ));
        Ok(())
    }
}
