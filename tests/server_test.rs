//! Integration tests against a real listener.

mod common;

use common::{client, start_server, wait_for_records};
use httplog::config::HttplogConfig;
use httplog::observability::{Severity, TargetField};
use httplog::MemoryLogSink;

#[tokio::test]
async fn test_echo_is_captured_over_the_wire() {
    let logs = MemoryLogSink::new();
    let (addr, shutdown) = start_server(HttplogConfig::default(), logs.clone()).await;

    let res = client()
        .post(format!("http://{}/echo?verbose=1", addr))
        .header("content-type", "example/example")
        .body("Hello World")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Hello World");

    let records = wait_for_records(&logs, 1).await;
    assert_eq!(records.len(), 1);
    let rec = &records[0];
    assert_eq!(rec.method, "POST");
    assert_eq!(rec.target, "/echo?verbose=1");
    assert_eq!(rec.request_body_text(), "Hello World");
    assert_eq!(rec.response_body_text(), "Hello World");
    assert_eq!(rec.request_headers["content-type"], "example/example");
    assert_eq!(rec.response_headers["content-type"], "example/example");
    assert_eq!(rec.severity, Severity::Info);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unread_request_body_is_drained() {
    let logs = MemoryLogSink::new();
    let (addr, shutdown) = start_server(HttplogConfig::default(), logs.clone()).await;

    // `/status/{code}` never looks at the body.
    let res = client()
        .post(format!("http://{}/status/204", addr))
        .body("abc")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let records = wait_for_records(&logs, 1).await;
    assert_eq!(records[0].request_body_text(), "abc");
    assert_eq!(records[0].status_code(), 204);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_route_logs_warning() {
    let logs = MemoryLogSink::new();
    let (addr, shutdown) = start_server(HttplogConfig::default(), logs.clone()).await;

    let res = client()
        .get(format!("http://{}/nowhere", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let records = wait_for_records(&logs, 1).await;
    assert_eq!(records[0].status_code(), 404);
    assert_eq!(records[0].severity, Severity::Warn);
    assert!(records[0].response_body.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_path_target_field_from_config() {
    let config: HttplogConfig = httplog::config::parse_config(
        r#"
        [capture]
        target_field = "path"
        "#,
    )
    .unwrap();
    assert_eq!(config.capture.target_field, TargetField::Path);

    let logs = MemoryLogSink::new();
    let (addr, shutdown) = start_server(config, logs.clone()).await;

    client()
        .get(format!("http://{}/?q=1", addr))
        .send()
        .await
        .unwrap();

    let records = wait_for_records(&logs, 1).await;
    assert!(records[0].field("request-path").is_some());
    assert!(records[0].field("request-url").is_none());
    assert_eq!(records[0].response_body_text(), "Hello World");

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_get_one_record_each() {
    let logs = MemoryLogSink::new();
    let (addr, shutdown) = start_server(HttplogConfig::default(), logs.clone()).await;
    let client = client();

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        let url = format!("http://{}/echo", addr);
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .body(format!("payload-{}", i))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap()
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), format!("payload-{}", i));
    }

    let records = wait_for_records(&logs, 20).await;
    assert_eq!(records.len(), 20);
    for rec in &records {
        assert_eq!(rec.request_body, rec.response_body);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (addr, shutdown) = start_server(HttplogConfig::default(), MemoryLogSink::new()).await;
    assert_eq!(shutdown.receiver_count(), 1);

    shutdown.trigger();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = client()
        .get(format!("http://{}/", addr))
        .timeout(std::time::Duration::from_millis(500))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_large_unread_body_on_kept_alive_connection() {
    let logs = MemoryLogSink::new();
    let (addr, shutdown) = start_server(HttplogConfig::default(), logs.clone()).await;

    // Pooled client: the connection stays open after the response.
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let payload = vec![b'x'; 4 * 1024 * 1024];

    let res = client
        .post(format!("http://{}/status/204", addr))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let records = wait_for_records(&logs, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_body.len(), payload.len());
    assert_eq!(records[0].request_body, payload);

    // Second request reuses the connection and is logged as well.
    client
        .post(format!("http://{}/status/204", addr))
        .body("abc")
        .send()
        .await
        .unwrap();
    let records = wait_for_records(&logs, 2).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].request_body_text(), "abc");

    drop(client);
    shutdown.trigger();
}
