use std::sync::Arc;

use crate::context::ReceiverContext;
use crate::core_info::PerfDataCoreInfo;
use crate::decorator::PerfDataDecorator;
use crate::error::Result;
use crate::listener::PerfDataListener;
use crate::sampler::{sample_key, SampleGate, SampleStatus};
use crate::source::{BrowserPerfDataRecord, Source};

/// Keeps the full payload of sampled reports that carried errors
pub struct PerfDataRecordListener {
    ctx: Arc<ReceiverContext>,
    gate: SampleGate,
    record: Option<BrowserPerfDataRecord>,
}

impl PerfDataRecordListener {
    pub fn new(ctx: Arc<ReceiverContext>) -> Self {
        let gate = SampleGate::new(ctx.sampler);
        Self {
            ctx,
            gate,
            record: None,
        }
    }
}

impl PerfDataListener for PerfDataRecordListener {
    fn parse(&mut self, _decorator: &PerfDataDecorator, core: &PerfDataCoreInfo) -> Result<()> {
        if !core.is_error || !self.gate.admit(sample_key(&core.unique_id)) {
            return Ok(());
        }
        self.record = Some(BrowserPerfDataRecord {
            unique_id: core.unique_id.clone(),
            service_id: core.service_id,
            service_version_id: core.service_version_id,
            page_path_id: core.page_path_id,
            page_path: core.page_path.clone(),
            time: core.time,
            time_bucket: core.minute_time_bucket,
            is_error: core.is_error,
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
                .receive(Source::BrowserPerfDataRecord(record));
        }
        Ok(())
    }
}
