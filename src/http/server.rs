//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the bundled demo handlers
//! - Wire up middleware (capture, timeout, tracing)
//! - Bind server to listener and serve until shutdown
//!
//! # Routes
//! - `GET /` → "Hello World"
//! - `POST /echo` → request body echoed back with its content type
//! - `ANY /status/{code}` → empty response with the given status
//! - anything else → 404

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::capture::CaptureMiddleware;
use crate::config::HttplogConfig;
use crate::observability::LogSink;

/// Demo HTTP server with request/response capture.
pub struct HttpServer {
    router: Router,
    config: HttplogConfig,
}

impl HttpServer {
    /// Create a server that reports every request to `sink`.
    pub fn new<L: LogSink + 'static>(config: HttplogConfig, sink: L) -> Self {
        let capture = CaptureMiddleware::from_config(sink, &config.capture);
        let router = Self::build_router(&config, &capture);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The capture layer sits outside the timeout so timed-out requests are
    /// logged with the status the client actually received.
    #[allow(deprecated)]
    fn build_router<L: LogSink + 'static>(
        config: &HttplogConfig,
        capture: &CaptureMiddleware<L>,
    ) -> Router {
        Router::new()
            .route("/", get(hello_handler))
            .route("/echo", post(echo_handler))
            .route("/status/{code}", any(status_handler))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(capture.layer())
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target_field = ?self.config.capture.target_field,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &HttplogConfig {
        &self.config
    }
}

async fn hello_handler() -> &'static str {
    "Hello World"
}

async fn echo_handler(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let mut response = body.into_response();
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type.clone());
    }
    response
}

async fn status_handler(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemoryLogSink;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_route() {
        let logs = MemoryLogSink::new();
        let server = HttpServer::new(HttplogConfig::default(), logs.clone());

        let res = server
            .router()
            .oneshot(Request::get("/status/418").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
        res.into_body().collect().await.unwrap();

        let records = logs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status_code(), 418);
    }

    #[tokio::test]
    async fn test_echo_keeps_content_type() {
        let server = HttpServer::new(HttplogConfig::default(), MemoryLogSink::new());

        let res = server
            .router()
            .oneshot(
                Request::post("/echo")
                    .header("content-type", "example/example")
                    .body(Body::from("ping"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.headers()["content-type"], "example/example");
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "ping");
    }
}
