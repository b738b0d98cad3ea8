//! Capture orchestration for synchronous handlers.
//!
//! # Per-request sequence
//! ```text
//! request body present? → install tee
//!     → wrap response sink in CapturingSink
//!     → handler.serve(..)            (blocks until the handler returns)
//!     → drain unread request body    (bounded by DrainPolicy)
//!     → classify severity from status
//!     → LogSink::log(record)         (exactly once)
//! ```

use std::sync::Arc;

use axum::http::Request;

use super::drain::DrainPolicy;
use super::sink::{CapturingSink, ResponseSink};
use super::tee::{tee, Body};
use crate::config::CaptureConfig;
use crate::observability::{CapturedRecord, LogSink, Severity, TargetField};

/// A synchronous request handler.
///
/// Handlers read the request body through `req.body_mut()` (or take it out of
/// the request) and write the response through `w`.
pub trait Handler: Send + Sync {
    fn serve(&self, w: &mut dyn ResponseSink, req: &mut Request<Body>);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseSink, &mut Request<Body>) + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseSink, req: &mut Request<Body>) {
        self(w, req)
    }
}

/// Builds capturing handlers that report to one [`LogSink`].
pub struct CaptureMiddleware<L> {
    sink: Arc<L>,
    target_field: TargetField,
    drain: DrainPolicy,
}

impl<L> Clone for CaptureMiddleware<L> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            target_field: self.target_field,
            drain: self.drain,
        }
    }
}

impl<L: LogSink> CaptureMiddleware<L> {
    pub fn new(sink: L) -> Self {
        Self {
            sink: Arc::new(sink),
            target_field: TargetField::default(),
            drain: DrainPolicy::unbounded(),
        }
    }

    /// Build from the `[capture]` configuration section.
    pub fn from_config(sink: L, config: &CaptureConfig) -> Self {
        Self::new(sink)
            .with_target_field(config.target_field)
            .with_drain_policy(config.drain_policy())
    }

    pub fn with_target_field(mut self, target_field: TargetField) -> Self {
        self.target_field = target_field;
        self
    }

    pub fn with_drain_policy(mut self, drain: DrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    pub fn sink(&self) -> &L {
        &self.sink
    }

    pub(crate) fn shared_sink(&self) -> Arc<dyn LogSink>
    where
        L: 'static,
    {
        self.sink.clone()
    }

    pub fn target_field(&self) -> TargetField {
        self.target_field
    }

    pub fn drain_policy(&self) -> &DrainPolicy {
        &self.drain
    }

    /// Decorate `handler`. The result is itself a [`Handler`] and can be
    /// nested or composed like any other.
    pub fn wrap<H: Handler>(&self, handler: H) -> Captured<H, L> {
        Captured {
            handler,
            middleware: self.clone(),
        }
    }

    /// Run `handler` for one request with capture around it.
    pub fn serve_with<H: Handler + ?Sized>(
        &self,
        handler: &H,
        w: &mut dyn ResponseSink,
        req: &mut Request<Body>,
    ) {
        let request_tee = if req.body().is_empty() {
            None
        } else {
            let (reader, handle) = tee(std::mem::take(req.body_mut()));
            *req.body_mut() = Body::from_reader(reader);
            Some(handle)
        };

        let mut sink = CapturingSink::new(w);
        handler.serve(&mut sink, req);

        let request_body = match request_tee {
            Some(handle) => {
                let (body, outcome) = handle.finish(&self.drain);
                if let Err(e) = outcome {
                    tracing::debug!(
                        method = %req.method(),
                        path = %req.uri().path(),
                        error = %e,
                        "Request body drain stopped early"
                    );
                }
                body
            }
            None => Vec::new(),
        };

        let (w, status, response_body) = sink.into_parts();
        let record = CapturedRecord {
            method: req.method().clone(),
            target_field: self.target_field,
            target: self.target_field.render(req.uri()),
            request_headers: req.headers().clone(),
            request_body,
            status,
            response_body,
            response_headers: w.headers().clone(),
            severity: Severity::from_status(status),
        };
        self.sink.log(&record);
    }
}

/// A handler decorated by [`CaptureMiddleware::wrap`].
pub struct Captured<H, L> {
    handler: H,
    middleware: CaptureMiddleware<L>,
}

impl<H, L> Captured<H, L> {
    pub fn inner(&self) -> &H {
        &self.handler
    }
}

impl<H: Handler, L: LogSink> Handler for Captured<H, L> {
    fn serve(&self, w: &mut dyn ResponseSink, req: &mut Request<Body>) {
        self.middleware.serve_with(&self.handler, w, req);
    }
}
