//! Type definitions for the proxy module

use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

// ========== Size and Capacity Types ==========

/// Maximum size for inbound request bodies in bytes
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |size: &usize| *size > 0),
)]
pub struct RequestSizeLimit(usize);

/// Size of an HTTP body in bytes
#[nutype(derive(Clone, Copy, Debug, Display, Deserialize, Serialize, From, AsRef))]
pub struct BodySize(usize);

/// Maximum number of log records the sink queue can hold
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |cap: &usize| *cap > 0),
)]
pub struct QueueCapacity(usize);

/// Maximum number of records drained per storage write
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |size: &usize| *size > 0),
)]
pub struct BatchSize(usize);

/// Total attempt ceiling for a single storage batch
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |n: &u32| *n > 0),
)]
pub struct RetryLimit(u32);

// ========== Time Types ==========

/// Duration in milliseconds
#[nutype(derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    From,
    AsRef
))]
pub struct DurationMillis(u64);

// ========== Observation Types ==========

/// Status code observed for a proxied request
///
/// Either a real HTTP status returned by the backend, or the sentinel `0`
/// when the failure was transport-level and no backend status exists
/// (timeout, connection refused, connection dropped mid-body).
#[nutype(
    derive(
        Clone,
        Copy,
        Debug,
        Display,
        PartialEq,
        Eq,
        Deserialize,
        Serialize,
        TryFrom,
        AsRef
    ),
    validate(predicate = |code: &u16| *code == 0 || (100..=599).contains(code)),
)]
pub struct ObservedStatusCode(u16);

impl ObservedStatusCode {
    /// Sentinel for backend failures where no HTTP status was observed
    pub fn transport_failure() -> Self {
        Self::try_new(0).expect("sentinel 0 passes validation")
    }

    /// Whether this observation carries a real backend status
    pub fn is_transport_failure(&self) -> bool {
        *self.as_ref() == 0
    }
}

/// Short human-readable summary of the proxied request (method + path)
#[nutype(derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, From, AsRef))]
pub struct RequestSummary(String);

/// Address the request originated from, as reported by the transport
/// or an `X-Forwarded-For` header
#[nutype(derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, From, AsRef))]
pub struct ClientAddress(String);

/// Request ID for correlating log lines belonging to one invocation
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |id: &Uuid| id.get_version_num() == 7),
)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new RequestId with a v7 UUID
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("now_v7 always yields a v7 UUID")
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend prediction endpoint this proxy forwards to
#[nutype(
    derive(Clone, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
)]
pub struct BackendUrl(String);

/// Append endpoint of the log storage collaborator
#[nutype(
    derive(Clone, Debug, Display, Deserialize, Serialize, TryFrom, AsRef),
    validate(predicate = |s: &str| s.starts_with("http://") || s.starts_with("https://")),
)]
pub struct StorageUrl(String);

// ========== Log Record ==========

/// Immutable structured observation of one proxied request's outcome
///
/// Built exactly once per completed or failed backend attempt, after the
/// response to the caller has been computed. Ownership moves to the sink
/// at enqueue; the sink holds it until it is durably written or dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Wall-clock time the proxy started handling the request
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub request_summary: RequestSummary,
    pub client_address: ClientAddress,
    pub response_time_ms: DurationMillis,
    pub status_code: ObservedStatusCode,
}

// ========== Configuration ==========

/// Proxy configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Backend prediction endpoint
    pub backend_url: BackendUrl,
    /// Timeout for a single backend call
    pub backend_timeout: Duration,
    /// Maximum inbound request body size
    pub max_request_size: RequestSizeLimit,
    /// Log sink configuration
    pub sink: SinkConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backend_url: BackendUrl::try_new("http://127.0.0.1:9000/predict".to_string())
                .expect("default backend url is valid"),
            backend_timeout: Duration::from_secs(30),
            max_request_size: RequestSizeLimit::try_new(1024 * 1024).expect("1MB is valid"),
            sink: SinkConfig::default(),
        }
    }
}

/// Log sink configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Bounded queue capacity; a full queue refuses new records
    pub queue_capacity: QueueCapacity,
    /// Upper bound on records per storage write
    pub batch_size: BatchSize,
    /// Timeout for a single storage write attempt
    pub write_timeout: Duration,
    /// Total attempts per batch before it is dropped and counted
    pub max_retries: RetryLimit,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            queue_capacity: QueueCapacity::try_new(1024).expect("1024 is valid"),
            batch_size: BatchSize::try_new(64).expect("64 is valid"),
            write_timeout: Duration::from_secs(10),
            max_retries: RetryLimit::try_new(3).expect("3 is valid"),
        }
    }
}

// ========== Errors ==========

/// Errors that can occur in the proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Request too large: {size} bytes (max: {max_size} bytes)")]
    RequestTooLarge {
        size: BodySize,
        max_size: RequestSizeLimit,
    },

    #[error("Backend timed out after {0:?}")]
    BackendTimeout(Duration),

    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("Invalid backend URL: {0}")]
    InvalidBackendUrl(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
