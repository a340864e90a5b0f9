//! Domain events handed to the aggregation side, one per dimension.

use brx_schema::ErrorCategory;
use bytes::Bytes;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    BrowserAppPerf,
    BrowserAppSingleVersionPerf,
    BrowserAppPagePerf,
    BrowserAppSingleVersionPagePerf,
    BrowserAppErrorLog,
    BrowserAppPageErrorLog,
    BrowserPerfDataRecord,
    BrowserErrorLogRecord,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::BrowserAppPerf => "browser_app_perf",
            Scope::BrowserAppSingleVersionPerf => "browser_app_single_version_perf",
            Scope::BrowserAppPagePerf => "browser_app_page_perf",
            Scope::BrowserAppSingleVersionPagePerf => "browser_app_single_version_page_perf",
            Scope::BrowserAppErrorLog => "browser_app_error_log",
            Scope::BrowserAppPageErrorLog => "browser_app_page_error_log",
            Scope::BrowserPerfDataRecord => "browser_perf_data_record",
            Scope::BrowserErrorLogRecord => "browser_error_log_record",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Navigation timings copied onto every perf dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PerfTimings {
    pub redirect_time: i32,
    pub dns_time: i32,
    pub req_time: i32,
    pub dom_analysis_time: i32,
    pub dom_ready_time: i32,
    pub blank_time: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserAppPerf {
    pub service_id: u32,
    pub name: String,
    /// False when the page load reported errors
    pub status: bool,
    pub timings: PerfTimings,
    pub time_bucket: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserAppSingleVersionPerf {
    pub service_version_id: u32,
    pub service_id: u32,
    pub name: String,
    pub service_name: String,
    pub status: bool,
    pub timings: PerfTimings,
    pub time_bucket: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserAppPagePerf {
    pub page_path_id: u32,
    pub name: String,
    pub service_id: u32,
    pub service_name: String,
    pub status: bool,
    pub timings: PerfTimings,
    pub time_bucket: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserAppSingleVersionPagePerf {
    pub service_version_id: u32,
    pub page_path_id: u32,
    pub service_id: u32,
    pub page_path: String,
    pub service_version_name: String,
    pub service_name: String,
    pub status: bool,
    pub timings: PerfTimings,
    pub time_bucket: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserAppErrorLog {
    pub service_id: u32,
    pub name: String,
    pub category: ErrorCategory,
    pub time_bucket: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserAppPageErrorLog {
    pub page_path_id: u32,
    pub name: String,
    pub service_id: u32,
    pub service_name: String,
    pub category: ErrorCategory,
    pub time_bucket: i64,
}

fn payload_as_text<S: Serializer>(data: &Bytes, s: S) -> Result<S::Ok, S::Error> {
    // Payloads are JSON already; emit them as text rather than a byte array
    s.serialize_str(&String::from_utf8_lossy(data))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserPerfDataRecord {
    pub unique_id: String,
    pub service_id: u32,
    pub service_version_id: u32,
    pub page_path_id: u32,
    pub page_path: String,
    pub time: i64,
    pub time_bucket: i64,
    pub is_error: bool,
    #[serde(serialize_with = "payload_as_text")]
    pub data_binary: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserErrorLogRecord {
    pub unique_id: String,
    pub service_id: u32,
    pub service_version_id: u32,
    pub page_path_id: u32,
    pub page_path: String,
    pub category: ErrorCategory,
    pub time: i64,
    pub time_bucket: i64,
    #[serde(serialize_with = "payload_as_text")]
    pub data_binary: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Source {
    BrowserAppPerf(BrowserAppPerf),
    BrowserAppSingleVersionPerf(BrowserAppSingleVersionPerf),
    BrowserAppPagePerf(BrowserAppPagePerf),
    BrowserAppSingleVersionPagePerf(BrowserAppSingleVersionPagePerf),
    BrowserAppErrorLog(BrowserAppErrorLog),
    BrowserAppPageErrorLog(BrowserAppPageErrorLog),
    BrowserPerfDataRecord(BrowserPerfDataRecord),
    BrowserErrorLogRecord(BrowserErrorLogRecord),
}

impl Source {
    pub fn scope(&self) -> Scope {
        match self {
            Source::BrowserAppPerf(_) => Scope::BrowserAppPerf,
            Source::BrowserAppSingleVersionPerf(_) => Scope::BrowserAppSingleVersionPerf,
            Source::BrowserAppPagePerf(_) => Scope::BrowserAppPagePerf,
            Source::BrowserAppSingleVersionPagePerf(_) => Scope::BrowserAppSingleVersionPagePerf,
            Source::BrowserAppErrorLog(_) => Scope::BrowserAppErrorLog,
            Source::BrowserAppPageErrorLog(_) => Scope::BrowserAppPageErrorLog,
            Source::BrowserPerfDataRecord(_) => Scope::BrowserPerfDataRecord,
            Source::BrowserErrorLogRecord(_) => Scope::BrowserErrorLogRecord,
        }
    }

    /// Key the aggregation side groups this event under
    pub fn entity_id(&self) -> String {
        match self {
            Source::BrowserAppPerf(e) => e.service_id.to_string(),
            Source::BrowserAppSingleVersionPerf(e) => e.service_version_id.to_string(),
            Source::BrowserAppPagePerf(e) => e.page_path_id.to_string(),
            Source::BrowserAppSingleVersionPagePerf(e) => {
                format!("{}_{}", e.service_version_id, e.page_path_id)
            }
            Source::BrowserAppErrorLog(e) => e.service_id.to_string(),
            Source::BrowserAppPageErrorLog(e) => e.page_path_id.to_string(),
            Source::BrowserPerfDataRecord(e) => e.unique_id.clone(),
            Source::BrowserErrorLogRecord(e) => e.unique_id.clone(),
        }
    }

    pub fn time_bucket(&self) -> i64 {
        match self {
            Source::BrowserAppPerf(e) => e.time_bucket,
            Source::BrowserAppSingleVersionPerf(e) => e.time_bucket,
            Source::BrowserAppPagePerf(e) => e.time_bucket,
            Source::BrowserAppSingleVersionPagePerf(e) => e.time_bucket,
            Source::BrowserAppErrorLog(e) => e.time_bucket,
            Source::BrowserAppPageErrorLog(e) => e.time_bucket,
            Source::BrowserPerfDataRecord(e) => e.time_bucket,
            Source::BrowserErrorLogRecord(e) => e.time_bucket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_page_entity_id() {
        let event = Source::BrowserAppSingleVersionPagePerf(BrowserAppSingleVersionPagePerf {
            service_version_id: 70,
            page_path_id: 42,
            service_id: 7,
            page_path: "/checkout".to_string(),
            service_version_name: "v1".to_string(),
            service_name: "shop".to_string(),
            status: true,
            timings: PerfTimings::default(),
            time_bucket: 3,
        });
        assert_eq!(event.entity_id(), "70_42");
        assert_eq!(event.scope(), Scope::BrowserAppSingleVersionPagePerf);
        assert_eq!(event.time_bucket(), 3);
    }

    #[test]
    fn test_serializes_with_scope_tag() {
        let event = Source::BrowserAppErrorLog(BrowserAppErrorLog {
            service_id: 7,
            name: "shop".to_string(),
            category: ErrorCategory::ScriptError,
            time_bucket: 9,
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["scope"], "browser_app_error_log");
        assert_eq!(json["category"], "SCRIPT_ERROR");
        assert_eq!(json["service_id"], 7);
    }

    #[test]
    fn test_record_payload_serialized_as_text() {
        let event = Source::BrowserPerfDataRecord(BrowserPerfDataRecord {
            unique_id: "u".to_string(),
            service_id: 1,
            service_version_id: 2,
            page_path_id: 3,
            page_path: "/".to_string(),
            time: 0,
            time_bucket: 0,
            is_error: true,
            data_binary: Bytes::from(r#"{"uniqueId":"u"}"#),
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data_binary"], r#"{"uniqueId":"u"}"#);
        assert_eq!(json["scope"], "browser_perf_data_record");
    }
}
