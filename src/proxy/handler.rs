//! Hot path: validate, forward, time, respond, hand off the outcome
//!
//! The response path owns exactly one slow operation, the backend call.
//! Everything observability-related happens after the response is
//! computed and costs a single non-blocking enqueue; a saturated or dead
//! log sink cannot delay or fail the caller.

use crate::proxy::headers::X_FORWARDED_FOR;
use crate::proxy::metrics::ProxyMetrics;
use crate::proxy::types::*;
use crate::sink::SinkHandle;
use axum::body::Body;
use axum::extract::ConnectInfo;
use http_body_util::BodyExt;
use hyper::{Request, Response, Uri};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Forwarding service for the prediction route
#[derive(Clone)]
pub struct ForwardService {
    config: Arc<ProxyConfig>,
    sink: SinkHandle,
    metrics: Arc<ProxyMetrics>,
    client: hyper_util::client::legacy::Client<
        hyper_util::client::legacy::connect::HttpConnector,
        Body,
    >,
}

impl ForwardService {
    /// Create a new forwarding service
    pub fn new(config: ProxyConfig, sink: SinkHandle, metrics: Arc<ProxyMetrics>) -> Self {
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build_http();

        Self {
            config: Arc::new(config),
            sink,
            metrics,
            client,
        }
    }

    /// Proxy one request to the backend and capture its outcome
    ///
    /// Pre-dispatch rejections (unparseable or oversized body) return a
    /// client error and leave no log record. Every request that reaches
    /// the backend call produces exactly one record, whether the call
    /// succeeded, returned an error status, or failed at transport level.
    pub async fn handle(
        &self,
        client_address: ClientAddress,
        request: Request<Body>,
    ) -> ProxyResult<Response<Body>> {
        let request_id = RequestId::new();
        let started_at = chrono::Utc::now();
        let start = Instant::now();

        let (mut parts, body) = request.into_parts();
        let summary = RequestSummary::from(format!("{} {}", parts.method, parts.uri.path()));

        let body_bytes = http_body_util::Limited::new(body, *self.config.max_request_size.as_ref())
            .collect()
            .await
            .map_err(|e| {
                if e.is::<http_body_util::LengthLimitError>() {
                    self.metrics.record_request_rejected();
                    ProxyError::RequestTooLarge {
                        size: BodySize::from(*self.config.max_request_size.as_ref() + 1),
                        max_size: self.config.max_request_size,
                    }
                } else {
                    ProxyError::Internal(format!("Body collection error: {e}"))
                }
            })?
            .to_bytes();

        // Rejected before dispatch: no backend call, no log record
        if let Err(e) = validate_prediction_input(&body_bytes) {
            self.metrics.record_request_rejected();
            return Err(e);
        }

        parts.uri = resolve_backend_uri(&self.config.backend_url, &parts.uri)?;
        let outgoing = Request::from_parts(parts, Body::from(body_bytes));

        let response = match tokio::time::timeout(
            self.config.backend_timeout,
            self.client.request(outgoing),
        )
        .await
        {
            Err(_elapsed) => {
                self.capture_outcome(
                    request_id,
                    started_at,
                    start,
                    summary,
                    client_address,
                    ObservedStatusCode::transport_failure(),
                    true,
                );
                return Err(ProxyError::BackendTimeout(self.config.backend_timeout));
            }
            Ok(Err(e)) => {
                self.capture_outcome(
                    request_id,
                    started_at,
                    start,
                    summary,
                    client_address,
                    ObservedStatusCode::transport_failure(),
                    true,
                );
                return Err(ProxyError::BackendUnreachable(e.to_string()));
            }
            Ok(Ok(response)) => response,
        };

        let (response_parts, response_body) = response.into_parts();

        let response_bytes = match response_body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                // Connection dropped mid-body: no trustworthy backend status
                self.capture_outcome(
                    request_id,
                    started_at,
                    start,
                    summary,
                    client_address,
                    ObservedStatusCode::transport_failure(),
                    true,
                );
                return Err(ProxyError::BackendUnreachable(format!(
                    "response body error: {e}"
                )));
            }
        };

        let status = response_parts.status;
        let observed = ObservedStatusCode::try_new(status.as_u16())
            .unwrap_or_else(|_| ObservedStatusCode::transport_failure());

        self.capture_outcome(
            request_id,
            started_at,
            start,
            summary,
            client_address,
            observed,
            !status.is_success(),
        );

        // Exact pass-through of the backend's status, headers, and body
        Ok(Response::from_parts(response_parts, Body::from(response_bytes)))
    }

    /// Count the outcome and hand the log record to the sink
    ///
    /// Runs after the caller's response has been computed. The enqueue is
    /// non-blocking; a refused record becomes a counted drop.
    #[allow(clippy::too_many_arguments)]
    fn capture_outcome(
        &self,
        request_id: RequestId,
        started_at: chrono::DateTime<chrono::Utc>,
        start: Instant,
        request_summary: RequestSummary,
        client_address: ClientAddress,
        status_code: ObservedStatusCode,
        backend_failed: bool,
    ) {
        self.metrics.record_request_handled();
        if backend_failed {
            self.metrics.record_backend_failure();
        }

        let record = LogRecord {
            timestamp: started_at,
            request_summary,
            client_address,
            response_time_ms: DurationMillis::from(start.elapsed().as_millis() as u64),
            status_code,
        };

        if !self.sink.enqueue(record) {
            self.metrics.record_queue_full_drop();
            debug!(%request_id, "Log queue full, record dropped");
        }
    }
}

/// Validate the inbound prediction payload
///
/// Well-formed means: parses as JSON and is an object with at least one
/// field. Field names and values are backend domain knowledge and pass
/// through uninspected.
pub fn validate_prediction_input(body: &[u8]) -> ProxyResult<()> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ProxyError::MalformedRequest(format!("body is not valid JSON: {e}")))?;

    match value {
        serde_json::Value::Object(map) if !map.is_empty() => Ok(()),
        serde_json::Value::Object(_) => Err(ProxyError::MalformedRequest(
            "body must contain at least one field".to_string(),
        )),
        _ => Err(ProxyError::MalformedRequest(
            "body must be a JSON object".to_string(),
        )),
    }
}

/// Resolve the outgoing URI from the configured backend URL
///
/// A backend URL that already carries a path is used as-is; a bare base
/// URL has the original request's path and query appended.
pub fn resolve_backend_uri(backend_url: &BackendUrl, original_uri: &Uri) -> ProxyResult<Uri> {
    let backend_uri: Uri = backend_url
        .as_ref()
        .parse()
        .map_err(|_| ProxyError::InvalidBackendUrl(backend_url.as_ref().to_string()))?;

    let final_uri_str = if backend_uri.path() != "/" && !backend_uri.path().is_empty() {
        backend_url.as_ref().to_string()
    } else {
        let path_and_query = original_uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        format!(
            "{}{}",
            backend_url.as_ref().trim_end_matches('/'),
            path_and_query
        )
    };

    final_uri_str
        .parse()
        .map_err(|_| ProxyError::InvalidBackendUrl(final_uri_str))
}

/// Best-available client address for a request
///
/// Prefers the first entry of `X-Forwarded-For` (set by the fronting
/// gateway), then the peer socket address, then a placeholder.
pub fn client_address_for<B>(request: &Request<B>) -> ClientAddress {
    let forwarded = request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let address = forwarded.unwrap_or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    });

    ClientAddress::from(address)
}
