//! Request body capture for streaming bodies.
//!
//! # Responsibilities
//! - Wrap the incoming `http-body` stream in a [`TeeBody`] so every data
//!   frame the handler pulls is also copied into a shared buffer
//! - Hand the middleware a [`TeeBodyHandle`] that can drain whatever the
//!   handler left unread, straight from the original stream
//!
//! # Design Decisions
//! - Bodies that are already at end-of-stream are passed through untouched,
//!   with no buffer
//! - The buffer is shared through an uncontended mutex so a handler may move
//!   or drop the body freely without losing the capture

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use axum::BoxError;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;

use crate::capture::{lock, DrainError, DrainPolicy};

struct TeeState<B> {
    /// `None` once the stream ended or was taken for draining.
    inner: Option<Pin<Box<B>>>,
    captured: Vec<u8>,
}

enum Kind<B> {
    Passthrough(Pin<Box<B>>),
    Tee(Arc<Mutex<TeeState<B>>>),
}

/// Request body seen by the downstream service.
pub struct TeeBody<B> {
    kind: Kind<B>,
}

/// The middleware's side of a [`TeeBody`].
pub struct TeeBodyHandle<B> {
    state: Arc<Mutex<TeeState<B>>>,
}

/// Wrap `body`. Returns no handle when the body is already finished.
pub fn tee_body<B: HttpBody>(body: B) -> (TeeBody<B>, Option<TeeBodyHandle<B>>) {
    if body.is_end_stream() {
        return (
            TeeBody {
                kind: Kind::Passthrough(Box::pin(body)),
            },
            None,
        );
    }

    let state = Arc::new(Mutex::new(TeeState {
        inner: Some(Box::pin(body)),
        captured: Vec::new(),
    }));
    (
        TeeBody {
            kind: Kind::Tee(Arc::clone(&state)),
        },
        Some(TeeBodyHandle { state }),
    )
}

impl<B> HttpBody for TeeBody<B>
where
    B: HttpBody<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let state = match &mut self.get_mut().kind {
            Kind::Passthrough(body) => return body.as_mut().poll_frame(cx),
            Kind::Tee(state) => state,
        };

        let mut guard = lock(state);
        let state = &mut *guard;
        let Some(inner) = state.inner.as_mut() else {
            return Poll::Ready(None);
        };

        let polled = inner.as_mut().poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    state.captured.extend_from_slice(data);
                }
            }
            Poll::Ready(None) => state.inner = None,
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Passthrough(body) => body.is_end_stream(),
            Kind::Tee(state) => lock(state)
                .inner
                .as_ref()
                .map_or(true, |body| body.is_end_stream()),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Passthrough(body) => body.size_hint(),
            Kind::Tee(state) => lock(state)
                .inner
                .as_ref()
                .map_or_else(|| SizeHint::with_exact(0), |body| body.size_hint()),
        }
    }
}

impl<B> TeeBodyHandle<B>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    /// Bytes captured so far.
    pub fn captured(&self) -> Vec<u8> {
        lock(&self.state).captured.clone()
    }

    /// Drain the unread remainder into the capture and return the full body.
    ///
    /// The [`TeeBody`] yields end-of-stream from here on.
    pub async fn finish(self, policy: &DrainPolicy) -> (Vec<u8>, Result<u64, DrainError>) {
        let (inner, mut captured) = {
            let mut state = lock(&self.state);
            (state.inner.take(), std::mem::take(&mut state.captured))
        };

        let outcome = match inner {
            Some(body) => drain_body(body, &mut captured, policy).await,
            None => Ok(0),
        };
        (captured, outcome)
    }
}

async fn drain_body<B>(
    mut body: Pin<Box<B>>,
    buf: &mut Vec<u8>,
    policy: &DrainPolicy,
) -> Result<u64, DrainError>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let drain = async {
        let mut drained: u64 = 0;
        while let Some(frame) = body.frame().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => return Err(DrainError::Io(io::Error::other(e))),
            };
            let Ok(data) = frame.into_data() else {
                continue;
            };

            if let Some(remaining) = policy.remaining(drained) {
                if data.len() as u64 > remaining {
                    buf.extend_from_slice(&data[..remaining as usize]);
                    return Err(DrainError::LimitExceeded {
                        limit: policy.max_bytes.unwrap_or_default(),
                    });
                }
            }

            buf.extend_from_slice(&data);
            drained += data.len() as u64;
        }
        Ok(drained)
    };

    match policy.timeout {
        Some(timeout) => tokio::time::timeout(timeout, drain)
            .await
            .unwrap_or(Err(DrainError::TimedOut(timeout))),
        None => drain.await,
    }
}

/// Type-erased access to a request capture, so the exchange state does not
/// carry the request body type.
pub(crate) trait RequestCapture: Send {
    fn captured(&self) -> Vec<u8>;

    fn finish(
        self: Box<Self>,
        policy: DrainPolicy,
    ) -> BoxFuture<'static, (Vec<u8>, Result<u64, DrainError>)>;
}

impl<B> RequestCapture for TeeBodyHandle<B>
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn captured(&self) -> Vec<u8> {
        TeeBodyHandle::captured(self)
    }

    fn finish(
        self: Box<Self>,
        policy: DrainPolicy,
    ) -> BoxFuture<'static, (Vec<u8>, Result<u64, DrainError>)> {
        Box::pin(async move { TeeBodyHandle::finish(*self, &policy).await })
    }
}
