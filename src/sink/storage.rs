//! Storage collaborators the sink drains log records into
//!
//! The storage backend is an opaque append-only write API. Production
//! deployments point `HttpLogStorage` at the analytics store's insert
//! endpoint; tests and local runs use `MemoryLogStorage`.

use crate::proxy::types::{LogRecord, StorageUrl};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by a storage write attempt
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage rejected write with status {status}")]
    WriteRejected { status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only sink for log records
///
/// Implementations must treat a batch as a single write: either the whole
/// batch is durable or the attempt failed. The worker owns retries.
#[async_trait]
pub trait LogStorage: Send + Sync {
    /// Append a batch of records
    async fn append(&self, records: &[LogRecord]) -> StorageResult<()>;
}

/// Wire shape of an append request, matching the store's insert API
#[derive(Serialize)]
struct AppendPayload<'a> {
    rows: &'a [LogRecord],
}

/// HTTP implementation of `LogStorage`
///
/// POSTs `{"rows": [...]}` to the configured endpoint. The endpoint URL
/// carries the dataset/table identity; this client does not know or care
/// about schema beyond the `LogRecord` shape.
pub struct HttpLogStorage {
    endpoint: StorageUrl,
    client: hyper_util::client::legacy::Client<
        hyper_util::client::legacy::connect::HttpConnector,
        Full<Bytes>,
    >,
}

impl HttpLogStorage {
    /// Create a storage client for the given append endpoint
    pub fn new(endpoint: StorageUrl) -> Self {
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build_http();

        Self { endpoint, client }
    }
}

#[async_trait]
impl LogStorage for HttpLogStorage {
    async fn append(&self, records: &[LogRecord]) -> StorageResult<()> {
        let body = serde_json::to_vec(&AppendPayload { rows: records })?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.as_ref())
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| StorageError::Unavailable(format!("invalid append request: {e}")))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::WriteRejected {
                status: response.status().as_u16(),
            })
        }
    }
}

/// In-memory implementation of `LogStorage` for tests and local runs
///
/// Records appended batches and can be told to fail the next N attempts,
/// which is how the retry and drop paths are exercised.
#[derive(Default)]
pub struct MemoryLogStorage {
    records: std::sync::Mutex<Vec<LogRecord>>,
    attempts: std::sync::atomic::AtomicU64,
    fail_remaining: std::sync::atomic::AtomicU64,
}

impl MemoryLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` append attempts with `StorageError::Unavailable`
    pub fn fail_next(&self, n: u64) {
        self.fail_remaining
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }

    /// Total append attempts observed, including failed ones
    pub fn attempts(&self) -> u64 {
        self.attempts.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Snapshot of everything durably written
    pub fn written(&self) -> Vec<LogRecord> {
        self.records.lock().expect("storage mutex poisoned").clone()
    }
}

#[async_trait]
impl LogStorage for MemoryLogStorage {
    async fn append(&self, records: &[LogRecord]) -> StorageResult<()> {
        self.attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let remaining = self.fail_remaining.load(std::sync::atomic::Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining
                .store(remaining - 1, std::sync::atomic::Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }

        self.records
            .lock()
            .expect("storage mutex poisoned")
            .extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::types::{
        ClientAddress, DurationMillis, ObservedStatusCode, RequestSummary,
    };

    fn record() -> LogRecord {
        LogRecord {
            timestamp: chrono::Utc::now(),
            request_summary: RequestSummary::from("POST /predict".to_string()),
            client_address: ClientAddress::from("10.1.2.3".to_string()),
            response_time_ms: DurationMillis::from(87),
            status_code: ObservedStatusCode::try_new(200).unwrap(),
        }
    }

    #[tokio::test]
    async fn http_storage_posts_rows_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/append")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"rows": [{"request_summary": "POST /predict", "status_code": 200}]}"#
                    .to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let storage = HttpLogStorage::new(
            StorageUrl::try_new(format!("{}/append", server.url())).unwrap(),
        );

        storage.append(&[record()]).await.expect("append succeeds");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_storage_maps_error_status_to_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/append")
            .with_status(503)
            .create_async()
            .await;

        let storage = HttpLogStorage::new(
            StorageUrl::try_new(format!("{}/append", server.url())).unwrap(),
        );

        let err = storage.append(&[record()]).await.unwrap_err();
        assert!(matches!(err, StorageError::WriteRejected { status: 503 }));
    }

    #[tokio::test]
    async fn http_storage_maps_connection_error_to_unavailable() {
        // Nothing is listening on this port
        let storage = HttpLogStorage::new(
            StorageUrl::try_new("http://127.0.0.1:1/append".to_string()).unwrap(),
        );

        let err = storage.append(&[record()]).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[tokio::test]
    async fn memory_storage_injects_failures_then_recovers() {
        let storage = MemoryLogStorage::new();
        storage.fail_next(2);

        assert!(storage.append(&[record()]).await.is_err());
        assert!(storage.append(&[record()]).await.is_err());
        assert!(storage.append(&[record()]).await.is_ok());

        assert_eq!(storage.attempts(), 3);
        assert_eq!(storage.written().len(), 1);
    }
}
