//! Capture middleware for tower/axum services.
//!
//! Applies the same per-request capture as
//! [`CaptureMiddleware`](crate::capture::CaptureMiddleware) to services with
//! streaming bodies: the request body is teed as the handler reads it, the
//! response body is mirrored as the host writes it out, and one record is
//! emitted once the response is finished.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::http::{HeaderMap, Request, Response};
use axum::BoxError;
use bytes::Bytes;
use http_body::Body as HttpBody;
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::capture::CaptureMiddleware;
use crate::http::request::{tee_body, RequestCapture, TeeBody};
use crate::http::response::{CaptureBody, Exchange, RequestDrain};
use crate::observability::{CapturedRecord, LogSink, Severity};

/// [`Layer`] that wraps services in a [`CaptureService`].
pub struct CaptureLayer<L> {
    middleware: CaptureMiddleware<L>,
}

impl<L> Clone for CaptureLayer<L> {
    fn clone(&self) -> Self {
        Self {
            middleware: self.middleware.clone(),
        }
    }
}

impl<L: LogSink + 'static> CaptureLayer<L> {
    pub fn new(sink: L) -> Self {
        Self::from_middleware(CaptureMiddleware::new(sink))
    }

    /// Reuse the sink, target field and drain policy of `middleware`.
    pub fn from_middleware(middleware: CaptureMiddleware<L>) -> Self {
        Self { middleware }
    }
}

impl<L: LogSink + 'static> CaptureMiddleware<L> {
    /// A tower layer with this middleware's settings.
    pub fn layer(&self) -> CaptureLayer<L> {
        CaptureLayer::from_middleware(self.clone())
    }
}

impl<S, L> Layer<S> for CaptureLayer<L> {
    type Service = CaptureService<S, L>;

    fn layer(&self, inner: S) -> Self::Service {
        CaptureService {
            inner,
            middleware: self.middleware.clone(),
        }
    }
}

/// Service produced by [`CaptureLayer`].
pub struct CaptureService<S, L> {
    inner: S,
    middleware: CaptureMiddleware<L>,
}

impl<S: Clone, L> Clone for CaptureService<S, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            middleware: self.middleware.clone(),
        }
    }
}

impl<S, L, ReqBody, ResBody> Service<Request<ReqBody>> for CaptureService<S, L>
where
    S: Service<Request<TeeBody<ReqBody>>, Response = Response<ResBody>>,
    ReqBody: HttpBody<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: HttpBody<Data = Bytes>,
    L: LogSink + 'static,
{
    type Response = Response<CaptureBody<ResBody>>;
    type Error = S::Error;
    type Future = CaptureFuture<S::Future, ResBody, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let (parts, body) = req.into_parts();
        let (body, handle) = tee_body(body);

        let target_field = self.middleware.target_field();
        let record = CapturedRecord {
            method: parts.method.clone(),
            target_field,
            target: target_field.render(&parts.uri),
            request_headers: parts.headers.clone(),
            request_body: Vec::new(),
            status: None,
            response_body: Vec::new(),
            response_headers: HeaderMap::new(),
            severity: Severity::from_status(None),
        };
        let sink: Arc<dyn LogSink> = self.middleware.shared_sink();
        let exchange = Exchange::new(
            sink,
            *self.middleware.drain_policy(),
            record,
            handle.map(|h| Box::new(h) as Box<dyn RequestCapture>),
        );

        CaptureFuture {
            inner: self.inner.call(Request::from_parts(parts, body)),
            exchange: Some(exchange),
            drain: None,
            result: None,
        }
    }
}

pin_project! {
    /// Response future for [`CaptureService`].
    ///
    /// Once the inner service has answered, the unread request body is
    /// drained before the response is released to the host.
    pub struct CaptureFuture<F, B, E> {
        #[pin]
        inner: F,
        exchange: Option<Exchange>,
        drain: Option<RequestDrain>,
        result: Option<Result<Response<B>, E>>,
    }
}

impl<F, B, E> Future for CaptureFuture<F, B, E>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<CaptureBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if this.result.is_none() {
            let result = ready!(this.inner.poll(cx));
            *this.drain = this.exchange.as_mut().and_then(Exchange::start_drain);
            *this.result = Some(result);
        }

        if let Some(drain) = this.drain.as_mut() {
            let (body, outcome) = ready!(drain.as_mut().poll(cx));
            *this.drain = None;
            if let Some(exchange) = this.exchange.as_mut() {
                exchange.set_request_body(body, outcome);
            }
        }

        let mut exchange = this.exchange.take();
        let result = this
            .result
            .take()
            .expect("CaptureFuture polled after completion");

        Poll::Ready(match result {
            Ok(res) => {
                if let Some(exchange) = exchange.as_mut() {
                    exchange.set_response(res.status(), res.headers());
                }
                Ok(res.map(|body| CaptureBody::new(body, exchange)))
            }
            Err(e) => {
                if let Some(exchange) = exchange.as_mut() {
                    exchange.complete();
                }
                Err(e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::DrainPolicy;
    use crate::observability::{MemoryLogSink, TargetField};
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(logs: &MemoryLogSink) -> Router {
        Router::new()
            .route(
                "/demo",
                post(|body: String| async move {
                    (StatusCode::OK, [("x-example", "example")], body)
                }),
            )
            .route("/ignore", post(|| async { StatusCode::ACCEPTED }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(CaptureLayer::new(logs.clone()))
    }

    #[tokio::test]
    async fn test_echo_exchange() {
        let logs = MemoryLogSink::new();
        let req = Request::post("/demo")
            .header("content-type", "example/example")
            .body(Body::from("Hello World"))
            .unwrap();

        let res = app(&logs).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "Hello World");

        let records = logs.records();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.method, "POST");
        assert_eq!(rec.target, "/demo");
        assert_eq!(rec.request_body, b"Hello World");
        assert_eq!(rec.request_headers.get("content-type").unwrap(), "example/example");
        assert_eq!(rec.status_code(), 200);
        assert_eq!(rec.response_body, b"Hello World");
        assert_eq!(rec.response_headers.get("x-example").unwrap(), "example");
        assert_eq!(rec.severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_unread_request_body_is_drained() {
        let logs = MemoryLogSink::new();
        let req = Request::post("/ignore").body(Body::from("abc")).unwrap();

        let res = app(&logs).oneshot(req).await.unwrap();
        res.into_body().collect().await.unwrap();

        let records = logs.records();
        assert_eq!(records[0].request_body, b"abc");
        assert_eq!(records[0].status_code(), 202);
    }

    #[tokio::test]
    async fn test_not_found_warns() {
        let logs = MemoryLogSink::new();
        let req = Request::get("/missing").body(Body::empty()).unwrap();

        let res = app(&logs).oneshot(req).await.unwrap();
        res.into_body().collect().await.unwrap();

        let records = logs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code(), 404);
        assert!(records[0].response_body.is_empty());
        assert_eq!(records[0].severity, Severity::Warn);
    }

    #[tokio::test]
    async fn test_dropped_response_still_logs_once() {
        let logs = MemoryLogSink::new();
        let req = Request::get("/missing").body(Body::empty()).unwrap();

        let res = app(&logs).oneshot(req).await.unwrap();
        drop(res);

        let records = logs.records();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_settings_come_from_middleware() {
        let logs = MemoryLogSink::new();
        let middleware = CaptureMiddleware::new(logs.clone())
            .with_target_field(TargetField::Path)
            .with_drain_policy(DrainPolicy::unbounded().with_max_bytes(2));
        let app = Router::new()
            .route("/ignore", post(|| async { StatusCode::OK }))
            .layer(middleware.layer());

        let req = Request::post("/ignore?verbose=1")
            .body(Body::from("abcdef"))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        res.into_body().collect().await.unwrap();

        let records = logs.records();
        assert_eq!(records[0].target_field, TargetField::Path);
        assert_eq!(records[0].target, "/ignore");
        assert_eq!(records[0].request_body, b"ab");
    }

    #[tokio::test]
    async fn test_response_waits_for_unread_body() {
        let logs = MemoryLogSink::new();
        let (tx, rx) = tokio::sync::mpsc::channel::<&'static str>(4);
        let frames = futures_util::stream::unfold(rx, |mut rx| async move {
            let chunk = rx.recv().await;
            chunk.map(|c| {
                let frame = http_body::Frame::data(Bytes::from_static(c.as_bytes()));
                (Ok::<_, std::io::Error>(frame), rx)
            })
        });
        let req = Request::post("/ignore")
            .body(Body::new(http_body_util::StreamBody::new(frames)))
            .unwrap();

        tx.send("ab").await.unwrap();
        let mut pending = tokio::spawn(app(&logs).oneshot(req));
        let early = tokio::time::timeout(std::time::Duration::from_millis(50), &mut pending).await;
        assert!(early.is_err(), "response released before the body ended");

        tx.send("cd").await.unwrap();
        drop(tx);
        let res = pending.await.unwrap().unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        drop(res);

        let records = logs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request_body, b"abcd");
    }
}
