//! brx-metadata: receiver configuration loaded from YAML

pub mod error;
pub mod receiver;
pub mod stream;

pub use error::MetadataError;
pub use receiver::{
    HandoffConfig, InstanceSeed, InventoryConfig, ReceiverConfig, ReplayConfig, ServiceSeed,
    TransportConfig, TransportType,
};
pub use stream::{BackpressurePolicy, BufferConfig, StreamConfig};
