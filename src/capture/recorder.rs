//! In-memory response sink.

use std::io;

use axum::http::{HeaderMap, StatusCode};

use super::ResponseSink;

/// A [`ResponseSink`] that keeps the response in memory.
///
/// Useful for synchronous hosts that assemble a full response before sending
/// it, and for exercising handlers in tests. Status stays unset until
/// [`ResponseSink::write_header`] is called.
#[derive(Debug, Default, Clone)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into an `http` response, defaulting the status to 200.
    pub fn into_response(self) -> axum::http::Response<Vec<u8>> {
        let mut res = axum::http::Response::new(self.body);
        *res.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = self.headers;
        res
    }
}

impl ResponseSink for ResponseRecorder {
    fn headers(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}
