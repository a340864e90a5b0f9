//! File-backed retry buffer
//!
//! Layout under the buffer directory:
//! - `data-{n:010}.buf`: append-only segments of length-prefixed frames
//! - `offset.log`: append-only log of the read cursor, compacted when large

mod buffer;
mod frame;
mod offset;

pub use buffer::FileBuffer;
pub use offset::Cursor;
