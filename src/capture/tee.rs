//! Request body capture.
//!
//! [`tee`] splits a body stream into a [`TeeBodyReader`], which the handler
//! reads as usual, and a [`TeeHandle`], which the middleware keeps. Every byte
//! the handler reads is appended to a shared buffer; once the handler is done,
//! [`TeeHandle::finish`] drains whatever it left behind straight from the
//! original stream and returns the complete body.

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};

use super::drain::{drain, DrainError, DrainPolicy};
use super::lock;

/// A synchronous request body.
///
/// `Body::empty()` means the request carried no body at all, which is
/// different from a body stream that happens to yield zero bytes.
#[derive(Default)]
pub struct Body {
    inner: Option<Box<dyn Read + Send>>,
}

impl Body {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            inner: Some(Box::new(reader)),
        }
    }

    /// Whether the request carries no body.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Read the remaining body into a `Vec`.
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(r) => r.read(buf),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").field("empty", &self.is_empty()).finish()
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Self::from_reader(bytes)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from_reader(s.as_bytes())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::from(s.into_bytes())
    }
}

#[derive(Debug)]
struct TeeState<R> {
    /// `None` once the stream ended or the handle took it for draining.
    inner: Option<R>,
    captured: Vec<u8>,
}

/// Reader half of a tee: reads from the original stream and keeps a copy.
#[derive(Debug)]
pub struct TeeBodyReader<R> {
    state: Arc<Mutex<TeeState<R>>>,
}

/// Middleware half of a tee: owns the capture buffer.
#[derive(Debug)]
pub struct TeeHandle<R> {
    state: Arc<Mutex<TeeState<R>>>,
}

/// Wrap `inner` so that everything read through the returned reader is
/// also recorded by the returned handle.
pub fn tee<R: Read>(inner: R) -> (TeeBodyReader<R>, TeeHandle<R>) {
    let state = Arc::new(Mutex::new(TeeState {
        inner: Some(inner),
        captured: Vec::new(),
    }));
    (
        TeeBodyReader {
            state: Arc::clone(&state),
        },
        TeeHandle { state },
    )
}

impl<R: Read> Read for TeeBodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let Some(inner) = state.inner.as_mut() else {
            return Ok(0);
        };

        let n = inner.read(buf)?;
        state.captured.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl<R: Read> TeeHandle<R> {
    /// Bytes captured so far.
    pub fn captured(&self) -> Vec<u8> {
        lock(&self.state).captured.clone()
    }

    /// Drain the unread remainder of the original stream into the capture and
    /// return the full body.
    ///
    /// The reader half yields end-of-stream from here on. The drain outcome is
    /// returned next to the body; the body holds everything read up to a
    /// failure.
    pub fn finish(self, policy: &DrainPolicy) -> (Vec<u8>, Result<u64, DrainError>) {
        let (inner, mut captured) = {
            let mut state = lock(&self.state);
            (state.inner.take(), std::mem::take(&mut state.captured))
        };

        let outcome = match inner {
            Some(mut inner) => drain(&mut inner, &mut captured, policy),
            None => Ok(0),
        };
        (captured, outcome)
    }
}
