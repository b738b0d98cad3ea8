//! Response body capture and record emission for streaming responses.
//!
//! # Responsibilities
//! - Mirror every response data frame into the capture buffer, unchanged
//! - Track one in-flight exchange and emit its record exactly once
//!
//! # Design Decisions
//! - The unread request body is drained before the response is handed back
//!   (see [`CaptureFuture`](super::middleware::CaptureFuture)), so the record
//!   never waits on a connection the client keeps open
//! - The record is emitted when the response body ends, fails, or is dropped,
//!   whichever comes first
//! - An exchange dropped before its drain ran logs whatever part of the
//!   request body was read

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body::{Body as HttpBody, Frame, SizeHint};
use pin_project_lite::pin_project;

use super::request::RequestCapture;
use crate::capture::{DrainError, DrainPolicy};
use crate::observability::{CapturedRecord, LogSink, Severity};

/// Pending drain of an unread request body.
pub(crate) type RequestDrain = BoxFuture<'static, (Vec<u8>, Result<u64, DrainError>)>;

/// State of one request/response pair until its record is emitted.
pub(crate) struct Exchange {
    sink: Arc<dyn LogSink>,
    drain: DrainPolicy,
    record: Option<CapturedRecord>,
    request: Option<Box<dyn RequestCapture>>,
}

impl Exchange {
    pub(crate) fn new(
        sink: Arc<dyn LogSink>,
        drain: DrainPolicy,
        record: CapturedRecord,
        request: Option<Box<dyn RequestCapture>>,
    ) -> Self {
        Self {
            sink,
            drain,
            record: Some(record),
            request,
        }
    }

    /// Start draining the request body. `None` if there is nothing to drain.
    pub(crate) fn start_drain(&mut self) -> Option<RequestDrain> {
        self.request.take().map(|request| request.finish(self.drain))
    }

    /// Store the drained request body.
    pub(crate) fn set_request_body(&mut self, body: Vec<u8>, outcome: Result<u64, DrainError>) {
        let Some(record) = self.record.as_mut() else {
            return;
        };
        if let Err(e) = outcome {
            tracing::debug!(
                method = %record.method,
                target = %record.target,
                error = %e,
                "Request body drain stopped early"
            );
        }
        record.request_body = body;
    }

    pub(crate) fn set_response(&mut self, status: StatusCode, headers: &HeaderMap) {
        if let Some(record) = self.record.as_mut() {
            record.status = Some(status);
            record.severity = Severity::from_status(Some(status));
            record.response_headers = headers.clone();
        }
    }

    fn append_response(&mut self, data: &[u8]) {
        if let Some(record) = self.record.as_mut() {
            record.response_body.extend_from_slice(data);
        }
    }

    /// Emit the record. Later calls do nothing.
    pub(crate) fn complete(&mut self) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        if let Some(request) = self.request.take() {
            record.request_body = request.captured();
        }
        self.sink.log(&record);
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        self.complete();
    }
}

pin_project! {
    /// Response body handed back to the host.
    pub struct CaptureBody<B> {
        #[pin]
        inner: B,
        exchange: Option<Exchange>,
    }
}

impl<B> CaptureBody<B> {
    pub(crate) fn new(inner: B, exchange: Option<Exchange>) -> Self {
        Self { inner, exchange }
    }
}

impl<B> HttpBody for CaptureBody<B>
where
    B: HttpBody<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let polled = ready!(this.inner.poll_frame(cx));

        match &polled {
            Some(Ok(frame)) => {
                if let (Some(data), Some(exchange)) = (frame.data_ref(), this.exchange.as_mut()) {
                    exchange.append_response(data);
                }
            }
            _ => {
                if let Some(mut exchange) = this.exchange.take() {
                    exchange.complete();
                }
            }
        }
        Poll::Ready(polled)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
