use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("cannot connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("publish to {subject} failed: {reason}")]
    Publish { subject: String, reason: String },
    #[error("subscribe to {subject} failed: {reason}")]
    Subscribe { subject: String, reason: String },
    #[error("flush failed: {0}")]
    Flush(String),
}

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("buffer unavailable at {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("entry of {len} bytes exceeds segment size {max}")]
    EntryTooLarge { len: usize, max: u64 },
    #[error("buffer io task failed: {0}")]
    Task(String),
}
