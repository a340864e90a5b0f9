//! brx-schema: wire types for browser telemetry
//!
//! Messages arrive as camelCase JSON and are kept immutable after decoding.
//! The same encoding is used for entries parked in the retry buffer.

pub mod codec;
pub mod error;
pub mod error_log;
pub mod perf;

pub use codec::WireMessage;
pub use error::SchemaError;
pub use error_log::{BrowserErrorLog, ErrorCategory};
pub use perf::{BrowserPerfData, PerfDetail};
