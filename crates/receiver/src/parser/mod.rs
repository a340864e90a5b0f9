//! Per-record resolution state machine and the producers that drive it.
//!
//! One parser is built per record: validate the owner, default the time,
//! resolve the page path, then fan out to listeners. Unresolved live records
//! are parked in the retry buffer; unresolved replays stay where they are.

mod error_log;
mod perf;

pub use error_log::{ErrorLogParser, ErrorLogProducer};
pub use perf::{PerfDataParser, PerfDataProducer};

use bytes::Bytes;

use crate::context::ReceiverContext;
use crate::error::Result;
use crate::metrics::KindMetrics;
use crate::standardization::StandardizationWorker;

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Straight off the network
    Live,
    /// Re-read from the retry buffer
    BufferReplay,
}

/// False (after logging and counting) when the service or instance is not
/// in the inventory cache.
fn owner_known(
    ctx: &ReceiverContext,
    metrics: &KindMetrics,
    unique_id: &str,
    service_id: u32,
    instance_id: u32,
) -> bool {
    if ctx.cache.service(service_id).is_some() && ctx.cache.instance(instance_id).is_some() {
        return true;
    }
    metrics.inc_unknown_owner();
    tracing::warn!(
        kind = %metrics.kind(),
        unique_id,
        service_id,
        instance_id,
        "Dropping record from unknown service or instance"
    );
    false
}

/// Owner check, then `resolve`. A failure is counted and logged and the
/// record reported handled, since retrying cannot fix it.
fn guarded_parse(
    ctx: &ReceiverContext,
    metrics: &KindMetrics,
    unique_id: &str,
    service_id: u32,
    instance_id: u32,
    resolve: impl FnOnce() -> Result<bool>,
) -> bool {
    if !owner_known(ctx, metrics, unique_id, service_id, instance_id) {
        return true;
    }
    match resolve() {
        Ok(handled) => handled,
        Err(e) => {
            metrics.inc_parse_error();
            tracing::error!(kind = %metrics.kind(), unique_id, error = %e, "Failed to parse record");
            true
        }
    }
}

/// Unresolved record: park it on the live path, count a retry on replay
fn defer(
    worker: &StandardizationWorker,
    metrics: &KindMetrics,
    source: DataSource,
    serialize: impl FnOnce() -> Result<Bytes>,
) -> Result<()> {
    match source {
        DataSource::Live => {
            worker.submit(serialize()?);
        }
        DataSource::BufferReplay => metrics.inc_buffer_file_retry(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReceiverError;
    use crate::listener::test_support::fixture;
    use crate::metrics::TelemetryKind;

    #[test]
    fn test_unknown_owner_skips_resolution() {
        let f = fixture(10_000);
        let metrics = f.ctx.metrics.for_kind(TelemetryKind::ErrorLog);
        let mut resolved = false;
        let handled = guarded_parse(&f.ctx, &metrics, "u-9", 8, 70, || {
            resolved = true;
            Ok(false)
        });
        assert!(handled);
        assert!(!resolved);
        assert_eq!(metrics.get_unknown_owner(), 1);
    }

    #[test]
    fn test_resolution_outcome_passed_through() {
        let f = fixture(10_000);
        let metrics = f.ctx.metrics.for_kind(TelemetryKind::PerfData);
        assert!(!guarded_parse(&f.ctx, &metrics, "u-1", 7, 70, || Ok(false)));
        assert!(guarded_parse(&f.ctx, &metrics, "u-1", 7, 70, || Ok(true)));
        assert_eq!(metrics.get_parse_error(), 0);
        assert_eq!(metrics.get_unknown_owner(), 0);
    }

    #[test]
    fn test_resolution_error_counted_and_handled() {
        let f = fixture(10_000);
        let metrics = f.ctx.metrics.for_kind(TelemetryKind::ErrorLog);
        let handled = guarded_parse(&f.ctx, &metrics, "u-1", 7, 70, || {
            Err(ReceiverError::MissingService(7))
        });
        assert!(handled);
        assert_eq!(metrics.get_parse_error(), 1);
    }
}
