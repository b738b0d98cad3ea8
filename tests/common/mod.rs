//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use httplog::config::HttplogConfig;
use httplog::{CapturedRecord, HttpServer, LogSink, MemoryLogSink, Shutdown};
use tokio::net::TcpListener;

/// Start the demo server on an ephemeral port.
///
/// Returns the bound address and the shutdown handle; dropping the handle
/// without triggering leaves the server running until the test ends.
#[allow(dead_code)]
pub async fn start_server<L: LogSink + 'static>(config: HttplogConfig, sink: L) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, sink);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

/// Poll `logs` until it holds at least `count` records or two seconds pass.
#[allow(dead_code)]
pub async fn wait_for_records(logs: &MemoryLogSink, count: usize) -> Vec<CapturedRecord> {
    for _ in 0..400 {
        if logs.len() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    logs.records()
}

/// A client that does not pool connections between tests.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
