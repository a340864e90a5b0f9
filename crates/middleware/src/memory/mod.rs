//! In-memory implementations for testing
pub mod buffer;
pub mod transport;

pub use buffer::InMemoryBuffer;
pub use transport::InMemoryTransport;
