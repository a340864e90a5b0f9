use serde::{Deserialize, Serialize};

use crate::codec::WireMessage;
use crate::error_log::BrowserErrorLog;

/// Navigation timing breakdown, all in milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PerfDetail {
    pub redirect_time: i32,
    pub dns_time: i32,
    pub req_time: i32,
    pub dom_analysis_time: i32,
    pub dom_ready_time: i32,
    pub blank_time: i32,
}

/// One page-load performance report with any errors seen during the load
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrowserPerfData {
    pub unique_id: String,
    pub service_id: u32,
    pub service_version_id: u32,
    pub page_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_path_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perf_detail: Option<PerfDetail>,
    #[serde(default)]
    pub logs: Vec<BrowserErrorLog>,
}

impl BrowserPerfData {
    pub fn is_error(&self) -> bool {
        !self.logs.is_empty()
    }
}

impl WireMessage for BrowserPerfData {}
