//! Request/response capture middleware that emits one structured log record
//! per handled HTTP request.
//!
//! The [`capture`] module is the core: decorators for a synchronous
//! response sink and request body, and the middleware that ties them to a
//! [`LogSink`](observability::LogSink). The [`http`] module applies the same
//! capture to tower/axum services with streaming bodies.

pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use capture::{CaptureMiddleware, Handler, ResponseSink};
pub use config::HttplogConfig;
pub use http::{CaptureLayer, HttpServer};
pub use lifecycle::Shutdown;
pub use observability::{CapturedRecord, LogSink, MemoryLogSink, Severity, TracingLogSink};
