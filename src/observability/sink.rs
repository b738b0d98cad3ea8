//! Log sinks: where captured records go.
//!
//! The capture core never formats or transports a record itself; it hands the
//! finished [`CapturedRecord`] to a [`LogSink`] supplied at construction time.

use std::sync::{Arc, Mutex};

use crate::capture::lock;

use super::record::{format_headers, CapturedRecord, Severity, TargetField};

/// Receiver of exactly one record per handled request.
///
/// The record carries the severity, the constant message and the ordered
/// field list (see [`CapturedRecord::fields`]).
pub trait LogSink: Send + Sync {
    fn log(&self, record: &CapturedRecord);
}

impl<F> LogSink for F
where
    F: Fn(&CapturedRecord) + Send + Sync,
{
    fn log(&self, record: &CapturedRecord) {
        self(record)
    }
}

macro_rules! emit {
    ($level:expr, $target_key:literal, $rec:expr) => {
        tracing::event!(
            $level,
            "request-method" = %$rec.method,
            $target_key = %$rec.target,
            "request-headers" = %format_headers(&$rec.request_headers),
            "request-body" = %$rec.request_body_text(),
            "response-status" = $rec.status_code(),
            "response-body" = %$rec.response_body_text(),
            "response-headers" = %format_headers(&$rec.response_headers),
            "{}",
            $rec.message()
        )
    };
}

/// Emits each record as a `tracing` event.
///
/// Formatting and transport belong to whichever subscriber is installed,
/// see [`crate::observability::logging::init`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, record: &CapturedRecord) {
        match (record.severity, record.target_field) {
            (Severity::Info, TargetField::Url) => emit!(tracing::Level::INFO, "request-url", record),
            (Severity::Info, TargetField::Path) => emit!(tracing::Level::INFO, "request-path", record),
            (Severity::Warn, TargetField::Url) => emit!(tracing::Level::WARN, "request-url", record),
            (Severity::Warn, TargetField::Path) => emit!(tracing::Level::WARN, "request-path", record),
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records logged so far.
    pub fn records(&self) -> Vec<CapturedRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, record: &CapturedRecord) {
        lock(&self.records).push(record.clone());
    }
}
