//! Prometheus self-metrics for the receiver
//!
//! Everything registers into a caller-supplied [`Registry`]; nothing is global,
//! so tests can build as many independent pipelines as they like.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

const LABEL_KIND: &str = "kind";

/// Which inbound stream a metric refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    PerfData,
    ErrorLog,
}

impl TelemetryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryKind::PerfData => "perf_data",
            TelemetryKind::ErrorLog => "error_log",
        }
    }
}

impl std::fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
) -> Result<IntCounterVec, prometheus::Error> {
    let counter = IntCounterVec::new(Opts::new(name, help), &[LABEL_KIND])?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Receiver metrics handle. Cheap to clone.
#[derive(Clone)]
pub struct ReceiverMetrics {
    registry: Registry,
    buffer_file_retry: IntCounterVec,
    buffer_file_out: IntCounterVec,
    buffer_file_in: IntCounterVec,
    buffer_write_error: IntCounterVec,
    buffer_evicted: IntCounterVec,
    parse_error: IntCounterVec,
    unknown_owner: IntCounterVec,
    handoff_rejected: IntCounterVec,
    ingest_latency: HistogramVec,
    source_dropped: IntCounter,
}

impl ReceiverMetrics {
    pub fn new(registry: Registry) -> Result<Self, prometheus::Error> {
        let buffer_file_retry = counter_vec(
            &registry,
            "brx_buffer_file_retry_total",
            "Replayed entries whose page path is still unresolved",
        )?;
        let buffer_file_out = counter_vec(
            &registry,
            "brx_buffer_file_out_total",
            "Replayed entries handled and removed from the retry buffer",
        )?;
        let buffer_file_in = counter_vec(
            &registry,
            "brx_buffer_file_in_total",
            "Entries appended to the retry buffer",
        )?;
        let buffer_write_error = counter_vec(
            &registry,
            "brx_buffer_write_error_total",
            "Retry buffer appends that failed",
        )?;
        let buffer_evicted = counter_vec(
            &registry,
            "brx_buffer_evicted_total",
            "Retry buffer entries dropped by segment eviction",
        )?;
        let parse_error = counter_vec(
            &registry,
            "brx_parse_error_total",
            "Messages dropped because parsing failed",
        )?;
        let unknown_owner = counter_vec(
            &registry,
            "brx_unknown_owner_total",
            "Messages dropped because their service or instance is unknown",
        )?;
        let handoff_rejected = counter_vec(
            &registry,
            "brx_handoff_rejected_total",
            "Entries refused or displaced by the full hand-off queue",
        )?;

        let ingest_latency = HistogramVec::new(
            HistogramOpts::new(
                "brx_ingest_latency_seconds",
                "Time spent handling one ingest call",
            )
            .buckets(vec![
                0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05, 0.1,
            ]),
            &[LABEL_KIND],
        )?;
        registry.register(Box::new(ingest_latency.clone()))?;

        let source_dropped = IntCounter::new(
            "brx_source_dropped_total",
            "Domain events dropped because the publish queue was full",
        )?;
        registry.register(Box::new(source_dropped.clone()))?;

        Ok(Self {
            registry,
            buffer_file_retry,
            buffer_file_out,
            buffer_file_in,
            buffer_write_error,
            buffer_evicted,
            parse_error,
            unknown_owner,
            handoff_rejected,
            ingest_latency,
            source_dropped,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Pre-resolve the per-stream label set
    pub fn for_kind(&self, kind: TelemetryKind) -> KindMetrics {
        let label = [kind.as_str()];
        KindMetrics {
            kind,
            buffer_file_retry: self.buffer_file_retry.with_label_values(&label),
            buffer_file_out: self.buffer_file_out.with_label_values(&label),
            buffer_file_in: self.buffer_file_in.with_label_values(&label),
            buffer_write_error: self.buffer_write_error.with_label_values(&label),
            buffer_evicted: self.buffer_evicted.with_label_values(&label),
            parse_error: self.parse_error.with_label_values(&label),
            unknown_owner: self.unknown_owner.with_label_values(&label),
            handoff_rejected: self.handoff_rejected.with_label_values(&label),
            ingest_latency: self.ingest_latency.with_label_values(&label),
        }
    }

    pub fn inc_source_dropped(&self) {
        self.source_dropped.inc();
    }

    pub fn get_source_dropped(&self) -> u64 {
        self.source_dropped.get()
    }

    /// Text exposition of everything in the registry
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}

/// Counters for one telemetry stream
#[derive(Clone)]
pub struct KindMetrics {
    kind: TelemetryKind,
    buffer_file_retry: IntCounter,
    buffer_file_out: IntCounter,
    buffer_file_in: IntCounter,
    buffer_write_error: IntCounter,
    buffer_evicted: IntCounter,
    parse_error: IntCounter,
    unknown_owner: IntCounter,
    handoff_rejected: IntCounter,
    ingest_latency: Histogram,
}

impl KindMetrics {
    pub fn kind(&self) -> TelemetryKind {
        self.kind
    }

    pub fn inc_buffer_file_retry(&self) {
        self.buffer_file_retry.inc();
    }

    pub fn inc_buffer_file_out(&self) {
        self.buffer_file_out.inc();
    }

    pub fn inc_buffer_file_in(&self) {
        self.buffer_file_in.inc();
    }

    pub fn inc_buffer_write_error(&self) {
        self.buffer_write_error.inc();
    }

    pub fn inc_buffer_evicted(&self, count: u64) {
        self.buffer_evicted.inc_by(count);
    }

    pub fn inc_parse_error(&self) {
        self.parse_error.inc();
    }

    pub fn inc_unknown_owner(&self) {
        self.unknown_owner.inc();
    }

    pub fn inc_handoff_rejected(&self) {
        self.handoff_rejected.inc();
    }

    pub fn observe_ingest_latency(&self, seconds: f64) {
        self.ingest_latency.observe(seconds);
    }

    pub fn get_buffer_file_retry(&self) -> u64 {
        self.buffer_file_retry.get()
    }

    pub fn get_buffer_file_out(&self) -> u64 {
        self.buffer_file_out.get()
    }

    pub fn get_buffer_file_in(&self) -> u64 {
        self.buffer_file_in.get()
    }

    pub fn get_buffer_write_error(&self) -> u64 {
        self.buffer_write_error.get()
    }

    pub fn get_buffer_evicted(&self) -> u64 {
        self.buffer_evicted.get()
    }

    pub fn get_parse_error(&self) -> u64 {
        self.parse_error.get()
    }

    pub fn get_unknown_owner(&self) -> u64 {
        self.unknown_owner.get()
    }

    pub fn get_handoff_rejected(&self) -> u64 {
        self.handoff_rejected.get()
    }

    pub fn get_ingest_samples(&self) -> u64 {
        self.ingest_latency.get_sample_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_independent() {
        let metrics = ReceiverMetrics::new(Registry::new()).unwrap();
        let perf = metrics.for_kind(TelemetryKind::PerfData);
        let logs = metrics.for_kind(TelemetryKind::ErrorLog);

        perf.inc_parse_error();
        perf.inc_parse_error();
        logs.inc_buffer_file_out();

        assert_eq!(perf.get_parse_error(), 2);
        assert_eq!(logs.get_parse_error(), 0);
        assert_eq!(logs.get_buffer_file_out(), 1);
    }

    #[test]
    fn test_handles_share_underlying_counters() {
        let metrics = ReceiverMetrics::new(Registry::new()).unwrap();
        metrics.for_kind(TelemetryKind::PerfData).inc_buffer_file_in();
        metrics.for_kind(TelemetryKind::PerfData).inc_buffer_file_in();
        assert_eq!(
            metrics.for_kind(TelemetryKind::PerfData).get_buffer_file_in(),
            2
        );
    }

    #[test]
    fn test_separate_registries_do_not_collide() {
        let a = ReceiverMetrics::new(Registry::new()).unwrap();
        let b = ReceiverMetrics::new(Registry::new()).unwrap();
        a.inc_source_dropped();
        assert_eq!(a.get_source_dropped(), 1);
        assert_eq!(b.get_source_dropped(), 0);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        ReceiverMetrics::new(registry.clone()).unwrap();
        assert!(ReceiverMetrics::new(registry).is_err());
    }

    #[test]
    fn test_encode_contains_kind_label() {
        let metrics = ReceiverMetrics::new(Registry::new()).unwrap();
        let errors = metrics.for_kind(TelemetryKind::ErrorLog);
        errors.inc_buffer_file_retry();
        errors.observe_ingest_latency(0.0002);

        let text = metrics.encode().unwrap();
        assert!(text.contains("brx_buffer_file_retry_total{kind=\"error_log\"} 1"));
        assert!(text.contains("brx_ingest_latency_seconds_bucket"));
        assert_eq!(errors.get_ingest_samples(), 1);
    }
}
