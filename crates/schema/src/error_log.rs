use serde::{Deserialize, Serialize};

use crate::codec::WireMessage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    AjaxError,
    ResourceError,
    VueError,
    PromiseError,
    ScriptError,
    #[default]
    UnknownError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::AjaxError => "AJAX_ERROR",
            ErrorCategory::ResourceError => "RESOURCE_ERROR",
            ErrorCategory::VueError => "VUE_ERROR",
            ErrorCategory::PromiseError => "PROMISE_ERROR",
            ErrorCategory::ScriptError => "SCRIPT_ERROR",
            ErrorCategory::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error captured in the browser.
///
/// Arrives either standalone on the error-log endpoint or nested inside a
/// [`crate::BrowserPerfData`] report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrowserErrorLog {
    pub unique_id: String,
    pub service_id: u32,
    pub service_version_id: u32,
    pub page_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_path_id: Option<u32>,
    #[serde(default)]
    pub category: ErrorCategory,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub line: i32,
    #[serde(default)]
    pub col: i32,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub error_url: String,
    /// Epoch millis; absent when the client did not stamp the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default)]
    pub first_reported_error: bool,
}

impl WireMessage for BrowserErrorLog {}
