use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MetadataError;
use crate::stream::{BackpressurePolicy, StreamConfig};

/// Sample rates are expressed in parts per ten thousand
pub const SAMPLE_RATE_PRECISION: u32 = 10_000;
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:12800";
pub const DEFAULT_HANDOFF_CAPACITY: usize = 1024;
pub const DEFAULT_REPLAY_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SUBJECT_PREFIX: &str = "brx";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Nats,
    Memory,
}

/// Where emitted domain events are published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    pub url: Option<String>,
    /// Events go out on "{subject_prefix}.{scope}"
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            transport_type: TransportType::Memory,
            url: None,
            subject_prefix: default_subject_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandoffConfig {
    #[serde(default = "default_handoff_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub policy: BackpressurePolicy,
}

fn default_handoff_capacity() -> usize {
    DEFAULT_HANDOFF_CAPACITY
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            capacity: default_handoff_capacity(),
            policy: BackpressurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayConfig {
    #[serde(default = "default_replay_interval_ms")]
    pub interval_ms: u64,
}

fn default_replay_interval_ms() -> u64 {
    DEFAULT_REPLAY_INTERVAL_MS
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_replay_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSeed {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceSeed {
    pub id: u32,
    pub service_id: u32,
    pub name: String,
}

/// Services and instances known at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InventoryConfig {
    #[serde(default)]
    pub services: Vec<ServiceSeed>,
    #[serde(default)]
    pub instances: Vec<InstanceSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    pub perf_data: StreamConfig,
    pub error_log: StreamConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE_PRECISION
}

impl ReceiverConfig {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        let config: ReceiverConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.sample_rate > SAMPLE_RATE_PRECISION {
            return Err(MetadataError::Validation(format!(
                "sample_rate {} exceeds {}",
                self.sample_rate, SAMPLE_RATE_PRECISION
            )));
        }
        if self.handoff.capacity == 0 {
            return Err(MetadataError::Validation(
                "handoff.capacity must be positive".to_string(),
            ));
        }
        if self.replay.interval_ms == 0 {
            return Err(MetadataError::Validation(
                "replay.interval_ms must be positive".to_string(),
            ));
        }
        self.perf_data.buffer.validate("perf_data")?;
        self.error_log.buffer.validate("error_log")?;
        if self.perf_data.buffer.path == self.error_log.buffer.path {
            return Err(MetadataError::Validation(
                "perf_data and error_log must use distinct buffer paths".to_string(),
            ));
        }
        if self.transport.transport_type == TransportType::Nats && self.transport.url.is_none() {
            return Err(MetadataError::Validation(
                "transport.url is required for nats".to_string(),
            ));
        }
        for instance in &self.inventory.instances {
            if !self
                .inventory
                .services
                .iter()
                .any(|s| s.id == instance.service_id)
            {
                return Err(MetadataError::Validation(format!(
                    "instance {} references unknown service {}",
                    instance.id, instance.service_id
                )));
            }
        }
        Ok(())
    }
}
