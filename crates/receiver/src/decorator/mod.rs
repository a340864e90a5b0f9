//! Copy-on-write views over decoded wire messages.
//!
//! A decorator holds the shared origin and, once something is written, a
//! private shadow copy. Reads go to whichever is current. Nested views borrow
//! their parent and write through the parent's shadow, so a message is cloned
//! at most once no matter how deep the first write lands.

mod cow;
mod error_log;
mod perf;

pub use error_log::ErrorLogDecorator;
pub use perf::{ErrorLogEntryDecorator, PerfDataDecorator, PerfDetailDecorator};

pub(crate) use cow::CowMessage;

/// A decorated record whose page path the exchanger can resolve
pub trait PagePathStandard {
    fn service_id(&self) -> u32;
    fn page_path(&self) -> &str;
    fn page_path_id(&self) -> Option<u32>;
    fn set_page_path_id(&mut self, id: u32);
}
