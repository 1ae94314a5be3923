//! Process-level counters for the monitoring collaborator
//!
//! One `ProxyMetrics` instance owns every counter in the process; request
//! tasks and the sink worker update it through atomics. The snapshot is
//! served as JSON at the metrics endpoint for the external alerting
//! system to scrape.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by the proxy process
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    requests_handled: AtomicU64,
    requests_rejected: AtomicU64,
    backend_failures: AtomicU64,
    records_dropped_queue_full: AtomicU64,
    records_dropped_retry_exhausted: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests that reached the backend-call stage, successful or not
    pub requests_handled: u64,
    /// Requests rejected before dispatch (malformed or oversized body)
    pub requests_rejected: u64,
    /// Backend timeouts, transport errors, and non-2xx statuses
    pub backend_failures: u64,
    /// Log records refused by a full queue
    pub records_dropped_queue_full: u64,
    /// Log records dropped after exhausting storage write attempts
    pub records_dropped_retry_exhausted: u64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_handled(&self) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_failure(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_full_drop(&self) {
        self.records_dropped_queue_full
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_exhausted_drops(&self, count: u64) {
        self.records_dropped_retry_exhausted
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
            records_dropped_queue_full: self.records_dropped_queue_full.load(Ordering::Relaxed),
            records_dropped_retry_exhausted: self
                .records_dropped_retry_exhausted
                .load(Ordering::Relaxed),
        }
    }
}
