//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Ctrl+C (or a test calling Shutdown::trigger)
//!     → broadcast to subscribers
//!     → HttpServer stops accepting, finishes in-flight requests
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
