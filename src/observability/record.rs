//! The per-request log record.
//!
//! A [`CapturedRecord`] is built exactly once after a request completes,
//! handed to a [`LogSink`](super::sink::LogSink), and dropped.

use std::fmt;

use axum::http::{HeaderMap, Method, StatusCode, Uri};
use serde::{Deserialize, Serialize};

/// Fixed message carried by every record.
pub const MESSAGE: &str = "handled";

/// Log level assigned to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
}

impl Severity {
    /// Classify a response status: 2xx is informational, anything else
    /// (including a status that was never set) is a warning.
    pub fn from_status(status: Option<StatusCode>) -> Self {
        match status {
            Some(s) if s.is_success() => Severity::Info,
            _ => Severity::Warn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which representation of the request target a deployment logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetField {
    /// `request-url`: path and query, as received.
    #[default]
    Url,
    /// `request-path`: path only.
    Path,
}

impl TargetField {
    pub fn key(&self) -> &'static str {
        match self {
            TargetField::Url => "request-url",
            TargetField::Path => "request-path",
        }
    }

    pub fn render(&self, uri: &Uri) -> String {
        match self {
            TargetField::Url => uri.to_string(),
            TargetField::Path => uri.path().to_string(),
        }
    }
}

/// A single field value handed to a log sink.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Headers(HeaderMap),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Headers(h) => f.write_str(&format_headers(h)),
        }
    }
}

/// Render a multi-valued header map as a JSON object of name to value list.
///
/// Names are sorted; values that are not valid UTF-8 are rendered lossily.
pub fn format_headers(headers: &HeaderMap) -> String {
    let mut map = serde_json::Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| serde_json::Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        map.insert(name.as_str().to_string(), serde_json::Value::Array(values));
    }
    serde_json::Value::Object(map).to_string()
}

/// Immutable snapshot of one handled request.
#[derive(Debug, Clone)]
pub struct CapturedRecord {
    pub method: Method,
    pub target_field: TargetField,
    pub target: String,
    pub request_headers: HeaderMap,
    pub request_body: Vec<u8>,
    pub status: Option<StatusCode>,
    pub response_body: Vec<u8>,
    pub response_headers: HeaderMap,
    pub severity: Severity,
}

impl CapturedRecord {
    pub fn message(&self) -> &'static str {
        MESSAGE
    }

    /// Status as logged; 0 when the handler never set one.
    pub fn status_code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }

    pub fn request_body_text(&self) -> String {
        String::from_utf8_lossy(&self.request_body).into_owned()
    }

    pub fn response_body_text(&self) -> String {
        String::from_utf8_lossy(&self.response_body).into_owned()
    }

    /// The record's fields in emission order.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("request-method", FieldValue::Str(self.method.to_string())),
            (self.target_field.key(), FieldValue::Str(self.target.clone())),
            ("request-headers", FieldValue::Headers(self.request_headers.clone())),
            ("request-body", FieldValue::Str(self.request_body_text())),
            ("response-status", FieldValue::Int(i64::from(self.status_code()))),
            ("response-body", FieldValue::Str(self.response_body_text())),
            ("response-headers", FieldValue::Headers(self.response_headers.clone())),
        ]
    }

    /// Look up a field by key.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.fields().into_iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}
