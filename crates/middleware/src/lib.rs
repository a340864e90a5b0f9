//! brx-middleware: Pluggable middleware abstractions
//!
//! Provides the durable retry buffer and the publish transport behind traits,
//! with file/NATS implementations for production and in-memory ones for testing.

pub mod buffer;
pub mod error;
pub mod factory;
pub mod file;
pub mod latency;
pub mod memory;
pub mod nats;
pub mod transport;

pub use buffer::{BufferEntry, ReplayStats, RetryBuffer};
pub use error::{BufferError, TransportError};
pub use factory::{FactoryError, MiddlewareFactory};
pub use file::FileBuffer;
pub use memory::{InMemoryBuffer, InMemoryTransport};
pub use nats::{NatsTransport, SubjectBuilder};
pub use transport::{Subscription, Transport, TransportMessage};
