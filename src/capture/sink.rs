//! Response capture.
//!
//! [`ResponseSink`] is the capability a handler writes its response through.
//! [`CapturingSink`] decorates any sink, mirroring every write into a buffer
//! and remembering the status, while leaving the underlying sink's behaviour
//! untouched.

use std::collections::TryReserveError;
use std::io;

use axum::http::{HeaderMap, StatusCode};

use super::CaptureError;

/// The response-writing capability handed to a [`Handler`](super::Handler).
pub trait ResponseSink {
    /// The header map that will be sent with the response.
    fn headers(&mut self) -> &mut HeaderMap;

    /// Write body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Set the response status.
    fn write_header(&mut self, status: StatusCode);

    /// Write the whole buffer, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn headers(&mut self) -> &mut HeaderMap {
        (**self).headers()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn write_header(&mut self, status: StatusCode) {
        (**self).write_header(status)
    }
}

/// Decorates a [`ResponseSink`], recording the body and status.
#[derive(Debug)]
pub struct CapturingSink<S> {
    inner: S,
    status: Option<StatusCode>,
    body: Vec<u8>,
}

impl<S: ResponseSink> CapturingSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            status: None,
            body: Vec::new(),
        }
    }

    /// Last status set through this sink, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Everything written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Return the captured status and body, releasing the inner sink.
    pub fn into_parts(self) -> (S, Option<StatusCode>, Vec<u8>) {
        (self.inner, self.status, self.body)
    }
}

impl<S: ResponseSink> CapturingSink<S> {
    // Reserve before forwarding so a failed append never leaves the client
    // with bytes the capture lacks.
    fn write_reserving(&mut self, buf: &[u8], reserve: Reserve) -> io::Result<usize> {
        reserve(&mut self.body, buf.len()).map_err(buffer_error)?;
        self.body.extend_from_slice(buf);

        self.inner.write(buf)
    }
}

type Reserve = fn(&mut Vec<u8>, usize) -> Result<(), TryReserveError>;

fn buffer_error(e: TryReserveError) -> io::Error {
    io::Error::new(io::ErrorKind::OutOfMemory, CaptureError::Buffer(e))
}

impl<S: ResponseSink> ResponseSink for CapturingSink<S> {
    fn headers(&mut self) -> &mut HeaderMap {
        self.inner.headers()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_reserving(buf, Vec::try_reserve)
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.inner.write_header(status);
    }
}
