//! Browser telemetry receiver
//!
//! Turns inbound browser performance reports and error logs into domain
//! events for the aggregation side. Records whose page path has no id yet are
//! parked in a durable retry buffer and replayed until the inventory
//! registry catches up.

pub mod clock;
pub mod context;
pub mod core_info;
pub mod decorator;
pub mod error;
pub mod exchanger;
pub mod inventory;
pub mod listener;
pub mod metrics;
pub mod parser;
pub mod publisher;
pub mod receiver;
pub mod replay;
pub mod sampler;
pub mod server;
pub mod source;
pub mod standardization;

pub use clock::{FixedClock, SystemClock, WallClock};
pub use context::ReceiverContext;
pub use core_info::{minute_time_bucket, ErrorLogCoreInfo, PerfDataCoreInfo};
pub use error::{ReceiverError, Result};
pub use exchanger::PagePathIdExchanger;
pub use inventory::{DetectPoint, InMemoryInventory, InventoryCache, InventoryRegister};
pub use listener::ListenerManager;
pub use metrics::{KindMetrics, ReceiverMetrics, TelemetryKind};
pub use parser::{DataSource, ErrorLogProducer, PerfDataProducer};
pub use publisher::TransportSourceReceiver;
pub use receiver::{MemorySourceReceiver, SourceReceiver};
pub use replay::{BufferConsumer, ReplayLoop};
pub use sampler::{sample_key, SampleGate, SampleStatus, Sampler};
pub use server::{create_router, run_server, ServerState};
pub use source::{Scope, Source};
pub use standardization::StandardizationWorker;
