use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::MetadataError;

/// Default size at which a buffer data segment is rotated (50 MiB)
pub const DEFAULT_DATA_FILE_MAX_SIZE: u64 = 50 * 1024 * 1024;
/// Default size at which the offset log is compacted (10 MiB)
pub const DEFAULT_OFFSET_FILE_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// Default number of data segments retained before the oldest is evicted
pub const DEFAULT_MAX_DATA_FILES: usize = 16;
/// Smallest segment size accepted; anything lower cannot hold a frame header plus payload
pub const MIN_DATA_FILE_MAX_SIZE: u64 = 1024;
/// Largest segment size accepted; frame headers store lengths as u32
pub const MAX_DATA_FILE_MAX_SIZE: u64 = u32::MAX as u64;

/// What the hand-off queue does when it is full
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Refuse the incoming entry
    #[default]
    RejectNew,
    /// Evict the oldest queued entry to make room
    DropOldest,
}

/// Durable retry buffer settings for one telemetry stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferConfig {
    pub path: PathBuf,
    #[serde(default = "default_data_file_max_size")]
    pub data_file_max_size: u64,
    #[serde(default = "default_offset_file_max_size")]
    pub offset_file_max_size: u64,
    #[serde(default = "default_max_data_files")]
    pub max_data_files: usize,
    /// Discard any backlog left from a previous run
    #[serde(default)]
    pub clean_when_restart: bool,
}

fn default_data_file_max_size() -> u64 {
    DEFAULT_DATA_FILE_MAX_SIZE
}

fn default_offset_file_max_size() -> u64 {
    DEFAULT_OFFSET_FILE_MAX_SIZE
}

fn default_max_data_files() -> usize {
    DEFAULT_MAX_DATA_FILES
}

impl BufferConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data_file_max_size: DEFAULT_DATA_FILE_MAX_SIZE,
            offset_file_max_size: DEFAULT_OFFSET_FILE_MAX_SIZE,
            max_data_files: DEFAULT_MAX_DATA_FILES,
            clean_when_restart: false,
        }
    }

    pub fn validate(&self, stream: &str) -> Result<(), MetadataError> {
        if self.path.as_os_str().is_empty() {
            return Err(MetadataError::Validation(format!(
                "{stream}.buffer.path must not be empty"
            )));
        }
        if self.data_file_max_size < MIN_DATA_FILE_MAX_SIZE {
            return Err(MetadataError::Validation(format!(
                "{stream}.buffer.data_file_max_size must be at least {MIN_DATA_FILE_MAX_SIZE}"
            )));
        }
        if self.data_file_max_size > MAX_DATA_FILE_MAX_SIZE {
            return Err(MetadataError::Validation(format!(
                "{stream}.buffer.data_file_max_size must be at most {MAX_DATA_FILE_MAX_SIZE}"
            )));
        }
        if self.offset_file_max_size == 0 {
            return Err(MetadataError::Validation(format!(
                "{stream}.buffer.offset_file_max_size must be positive"
            )));
        }
        if self.max_data_files < 2 {
            return Err(MetadataError::Validation(format!(
                "{stream}.buffer.max_data_files must be at least 2"
            )));
        }
        Ok(())
    }
}

/// Per-stream settings (perf data, error logs)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    pub buffer: BufferConfig,
}
