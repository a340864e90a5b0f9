use std::sync::Arc;

use crate::context::ReceiverContext;
use crate::core_info::PerfDataCoreInfo;
use crate::decorator::PerfDataDecorator;
use crate::error::Result;
use crate::listener::PerfDataListener;

/// Marks the reporting service and instance alive. Emits no events.
pub struct HeartbeatListener {
    ctx: Arc<ReceiverContext>,
    beat: Option<(u32, u32, i64)>,
}

impl HeartbeatListener {
    pub fn new(ctx: Arc<ReceiverContext>) -> Self {
        Self { ctx, beat: None }
    }
}

impl PerfDataListener for HeartbeatListener {
    fn parse(&mut self, _decorator: &PerfDataDecorator, core: &PerfDataCoreInfo) -> Result<()> {
        self.beat = Some((core.service_id, core.service_version_id, core.time));
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        if let Some((service_id, instance_id, time)) = self.beat.take() {
            self.ctx.register.service_heartbeat(service_id, time);
            self.ctx.register.instance_heartbeat(instance_id, time);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::test_support::{fixture, resolved_report};

    #[test]
    fn test_heartbeats_on_build() {
        let f = fixture(10_000);
        let (decorator, core) = resolved_report(&[]);
        let mut listener = HeartbeatListener::new(f.ctx.clone());
        listener.parse(&decorator, &core).unwrap();
        assert_eq!(f.inventory.last_service_heartbeat(7), None);

        listener.build().unwrap();
        assert_eq!(f.inventory.last_service_heartbeat(7), Some(180_000));
        assert_eq!(f.inventory.last_instance_heartbeat(70), Some(180_000));
        assert!(f.events.is_empty());
    }
}
