//! HTTP middleware.

pub mod capture;

pub use capture::{CaptureFuture, CaptureLayer, CaptureService};
