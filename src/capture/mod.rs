//! Request/response capture core.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → tee.rs (TeeBodyReader duplicates every body read)
//!     → sink.rs (CapturingSink mirrors writes, records status)
//!     → handler runs against the wrapped body and sink
//!     → drain.rs (unread body pulled from the original stream)
//!     → middleware.rs (severity, one CapturedRecord → LogSink)
//! ```
//!
//! # Design Decisions
//! - Header maps are never copied while the handler runs; the handler
//!   mutates the host's own map
//! - Buffering happens before forwarding, so a failed buffer append never
//!   reaches the client
//! - Drain failures are logged at debug level and otherwise ignored: the
//!   response has already been produced

use std::collections::TryReserveError;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

pub mod drain;
pub mod middleware;
pub mod recorder;
pub mod sink;
pub mod tee;

pub use drain::{DrainError, DrainPolicy};
pub use middleware::{CaptureMiddleware, Captured, Handler};
pub use recorder::ResponseRecorder;
pub use sink::{CapturingSink, ResponseSink};
pub use tee::{tee, Body, TeeBodyReader, TeeHandle};

/// Failures that belong to the capture itself rather than the transport.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture buffer could not grow; the write was not forwarded.
    #[error("capture buffer allocation failed: {0}")]
    Buffer(#[from] TryReserveError),
}

/// Lock `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
