//! Proxy service assembly
//!
//! `ProxyService` wires the hot path, the log sink, and the metrics
//! component behind an Axum router.
//!
//! ## Service lifecycle
//!
//! ```rust,ignore
//! use predict_proxy::proxy::{ProxyService, ProxyConfig};
//! use predict_proxy::proxy::types::StorageUrl;
//!
//! let config = ProxyConfig::default();
//! let storage_url = StorageUrl::try_new("http://logs.internal/append".to_string())?;
//! let service = ProxyService::new(config, storage_url);
//!
//! // Starts the sink worker; keep the controller for shutdown
//! let (router, sink) = service.into_router();
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! sink.shutdown().await;
//! ```

use crate::proxy::handler::{client_address_for, ForwardService};
use crate::proxy::headers::paths;
use crate::proxy::metrics::{MetricsSnapshot, ProxyMetrics};
use crate::proxy::types::{ProxyConfig, ProxyError, StorageUrl};
use crate::sink::queue::LogQueue;
use crate::sink::storage::{HttpLogStorage, LogStorage};
use crate::sink::{spawn_sink, SinkController, SinkHandle};
use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state behind the router
struct AppState {
    forward: ForwardService,
    metrics: Arc<ProxyMetrics>,
}

/// Instrumented prediction proxy service
pub struct ProxyService {
    forward: ForwardService,
    sink_handle: SinkHandle,
    sink_controller: SinkController,
    metrics: Arc<ProxyMetrics>,
}

impl ProxyService {
    /// Create a service persisting records over HTTP
    pub fn new(config: ProxyConfig, storage_url: StorageUrl) -> Self {
        Self::with_storage(config, Arc::new(HttpLogStorage::new(storage_url)))
    }

    /// Create a service with a caller-supplied storage backend
    pub fn with_storage(config: ProxyConfig, storage: Arc<dyn LogStorage>) -> Self {
        let metrics = Arc::new(ProxyMetrics::new());
        let (sink_handle, sink_controller) =
            spawn_sink(config.sink.clone(), storage, Arc::clone(&metrics));
        let forward = ForwardService::new(config, sink_handle.clone(), Arc::clone(&metrics));

        Self {
            forward,
            sink_handle,
            sink_controller,
            metrics,
        }
    }

    /// Process-level counters
    pub fn metrics(&self) -> Arc<ProxyMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The sink's queue, for tests and diagnostics
    pub fn sink_queue(&self) -> Arc<LogQueue> {
        self.sink_handle.queue()
    }

    /// Build the router; the controller shuts the sink down later
    pub fn into_router(self) -> (Router, SinkController) {
        let state = Arc::new(AppState {
            forward: self.forward,
            metrics: self.metrics,
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers(Any);

        let router = Router::new()
            .route(paths::PREDICT, post(predict_handler))
            .route(paths::HEALTH, get(health_handler))
            .route(paths::METRICS, get(metrics_handler))
            .with_state(state)
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        (router, self.sink_controller)
    }
}

/// Axum handler for the prediction route
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Response<Body>, ProxyError> {
    let client_address = client_address_for(&request);
    state.forward.handle(client_address, request).await
}

/// Health check handler
async fn health_handler() -> &'static str {
    "OK"
}

/// Counter snapshot for the monitoring collaborator
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::storage::MemoryLogStorage;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn test_service() -> ProxyService {
        ProxyService::with_storage(ProxyConfig::default(), Arc::new(MemoryLogStorage::new()))
    }

    #[tokio::test]
    async fn health_endpoint_responds_ok() {
        let (router, _sink) = test_service().into_router();

        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri(paths::HEALTH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_counter_snapshot() {
        let (router, _sink) = test_service().into_router();

        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri(paths::METRICS)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["requests_handled"], 0);
        assert_eq!(json["records_dropped_queue_full"], 0);
    }

    #[tokio::test]
    async fn unknown_route_is_not_proxied() {
        let (router, _sink) = test_service().into_router();

        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/other")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
