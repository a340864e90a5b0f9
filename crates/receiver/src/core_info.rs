//! Flattened attribution records built once a page path is resolved.
//!
//! Constructors return `None` unless the decorator already carries a page path
//! id and a time, so an event can never be built from an unresolved record.

use brx_schema::ErrorCategory;
use bytes::Bytes;

use crate::decorator::{ErrorLogDecorator, PagePathStandard, PerfDataDecorator};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Whole minutes since the epoch
#[inline]
pub fn minute_time_bucket(time_ms: i64) -> i64 {
    time_ms.div_euclid(MILLIS_PER_MINUTE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfDataCoreInfo {
    pub unique_id: String,
    pub service_id: u32,
    pub service_version_id: u32,
    pub page_path_id: u32,
    pub page_path: String,
    pub time: i64,
    pub minute_time_bucket: i64,
    pub is_error: bool,
    pub data_binary: Bytes,
}

impl PerfDataCoreInfo {
    pub fn resolve(decorator: &PerfDataDecorator, data_binary: Bytes) -> Option<Self> {
        let page_path_id = decorator.page_path_id()?;
        let time = decorator.time()?;
        Some(Self {
            unique_id: decorator.unique_id().to_string(),
            service_id: decorator.service_id(),
            service_version_id: decorator.service_version_id(),
            page_path_id,
            page_path: decorator.page_path().to_string(),
            time,
            minute_time_bucket: minute_time_bucket(time),
            is_error: decorator.is_error(),
            data_binary,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLogCoreInfo {
    pub unique_id: String,
    pub service_id: u32,
    pub service_version_id: u32,
    pub page_path_id: u32,
    pub page_path: String,
    pub category: ErrorCategory,
    pub time: i64,
    pub minute_time_bucket: i64,
    pub data_binary: Bytes,
}

impl ErrorLogCoreInfo {
    pub fn resolve(decorator: &ErrorLogDecorator, data_binary: Bytes) -> Option<Self> {
        let page_path_id = decorator.page_path_id()?;
        let time = decorator.time()?;
        Some(Self {
            unique_id: decorator.unique_id().to_string(),
            service_id: decorator.service_id(),
            service_version_id: decorator.service_version_id(),
            page_path_id,
            page_path: decorator.page_path().to_string(),
            category: decorator.category(),
            time,
            minute_time_bucket: minute_time_bucket(time),
            data_binary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brx_schema::BrowserPerfData;
    use std::sync::Arc;

    #[test]
    fn test_minute_bucket() {
        assert_eq!(minute_time_bucket(0), 0);
        assert_eq!(minute_time_bucket(59_999), 0);
        assert_eq!(minute_time_bucket(60_000), 1);
        assert_eq!(minute_time_bucket(1_700_000_123_456), 28_333_335);
    }

    #[test]
    fn test_unresolved_record_has_no_core_info() {
        let mut decorator = PerfDataDecorator::new(Arc::new(BrowserPerfData {
            time: Some(120_000),
            ..Default::default()
        }));
        assert!(PerfDataCoreInfo::resolve(&decorator, Bytes::new()).is_none());

        decorator.set_page_path_id(4);
        let core = PerfDataCoreInfo::resolve(&decorator, Bytes::from("x")).unwrap();
        assert_eq!(core.page_path_id, 4);
        assert_eq!(core.minute_time_bucket, 2);
        assert!(!core.is_error);
    }
}
