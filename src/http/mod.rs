//! HTTP host integration.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, demo routes)
//!     → middleware/capture.rs (CaptureLayer: one exchange per request)
//!     → request.rs (TeeBody duplicates request frames as the handler reads)
//!     → handler
//!     → response.rs (CaptureBody mirrors response frames, emits the record)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::{CaptureLayer, CaptureService};
pub use request::{tee_body, TeeBody, TeeBodyHandle};
pub use response::CaptureBody;
pub use server::HttpServer;
