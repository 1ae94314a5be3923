//! End-to-end scenarios against the public crate API
//!
//! Each test stands up a real mock backend on a loopback port, drives the
//! router the way a caller would, and then asserts on what the sink made
//! durable (or counted as dropped).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use predict_proxy::proxy::types::{BackendUrl, LogRecord, ProxyConfig};
use predict_proxy::proxy::ProxyService;
use predict_proxy::sink::storage::MemoryLogStorage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower::ServiceExt;

#[derive(Clone)]
struct BackendState {
    delay: Duration,
}

async fn backend_handler(State(state): State<BackendState>, body: String) -> (StatusCode, String) {
    tokio::time::sleep(state.delay).await;
    (StatusCode::OK, body)
}

async fn spawn_backend(delay: Duration) -> SocketAddr {
    let app = axum::Router::new()
        .route("/predict", axum::routing::post(backend_handler))
        .with_state(BackendState { delay });

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("mock backend addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock backend");
    });

    addr
}

fn proxy_config(backend: SocketAddr, backend_timeout: Duration) -> ProxyConfig {
    ProxyConfig {
        backend_url: BackendUrl::try_new(format!("http://{backend}/predict"))
            .expect("backend url is valid"),
        backend_timeout,
        ..ProxyConfig::default()
    }
}

fn predict_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"week_start": "2024-01-01"}"#))
        .unwrap()
}

async fn wait_for_records(storage: &MemoryLogStorage, n: usize) -> Vec<LogRecord> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let written = storage.written();
        if written.len() >= n {
            return written;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {n} records, have {}",
            written.len()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn slow_backend_success_is_returned_and_eventually_logged() {
    let delay = Duration::from_millis(50);
    let backend = spawn_backend(delay).await;
    let storage = Arc::new(MemoryLogStorage::new());
    let service =
        ProxyService::with_storage(proxy_config(backend, Duration::from_secs(5)), storage.clone());
    let (router, sink) = service.into_router();

    let response = router.oneshot(predict_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let records = wait_for_records(&storage, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(*records[0].status_code.as_ref(), 200);
    // The measured latency covers the backend's full service time
    assert!(*records[0].response_time_ms.as_ref() >= 50);

    sink.shutdown().await;
}

#[tokio::test]
async fn backend_exceeding_timeout_yields_504_and_a_failure_record() {
    let backend = spawn_backend(Duration::from_secs(2)).await;
    let storage = Arc::new(MemoryLogStorage::new());
    let timeout = Duration::from_millis(100);
    let service = ProxyService::with_storage(proxy_config(backend, timeout), storage.clone());
    let (router, sink) = service.into_router();

    let start = Instant::now();
    let response = router.oneshot(predict_request()).await.unwrap();
    let elapsed = start.elapsed();

    // The caller is released at the timeout, not at the backend's pace
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(elapsed >= timeout);
    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");

    let records = wait_for_records(&storage, 1).await;
    assert!(records[0].status_code.is_transport_failure());
    assert!(*records[0].response_time_ms.as_ref() >= 100);

    sink.shutdown().await;
}

#[tokio::test]
async fn storage_outage_never_touches_the_caller() {
    let backend = spawn_backend(Duration::from_millis(0)).await;
    let storage = Arc::new(MemoryLogStorage::new());
    storage.fail_next(u64::MAX);

    let service =
        ProxyService::with_storage(proxy_config(backend, Duration::from_secs(5)), storage.clone());
    let metrics = service.metrics();
    let (router, sink) = service.into_router();

    let start = Instant::now();
    let response = router.oneshot(predict_request()).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");

    // The worker retries its bounded budget, then drops and counts
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if metrics.snapshot().records_dropped_retry_exhausted >= 1 {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "record was never dropped after retry exhaustion"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(storage.written().is_empty());
    assert_eq!(metrics.snapshot().records_dropped_retry_exhausted, 1);

    sink.shutdown().await;
}
