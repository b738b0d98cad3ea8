//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! capture middleware (sync core or tower layer)
//!     → record.rs (CapturedRecord: severity, message, ordered fields)
//!     → sink.rs (LogSink: tracing events, in-memory collection, closures)
//!     → logging.rs (subscriber: pretty or JSON, env-filtered)
//! ```
//!
//! # Design Decisions
//! - Every handled request yields exactly one record
//! - Sinks are passed explicitly; nothing reads a global logger
//! - Internal diagnostics (drain failures, lifecycle) go through `tracing` directly

pub mod logging;
pub mod record;
pub mod sink;

pub use record::{CapturedRecord, FieldValue, Severity, TargetField};
pub use sink::{LogSink, MemoryLogSink, TracingLogSink};
