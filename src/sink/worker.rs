//! Background worker draining the log queue into storage

use crate::proxy::metrics::ProxyMetrics;
use crate::proxy::types::{LogRecord, SinkConfig};
use crate::sink::queue::LogQueue;
use crate::sink::storage::LogStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long the worker sleeps when the queue is empty
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Backoff before the second attempt of a failing batch; doubles per attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Bound on the best-effort final flush during shutdown
const SHUTDOWN_FLUSH_WINDOW: Duration = Duration::from_secs(5);

/// Drain worker for the log sink
///
/// Runs as a single background task. Dequeues records in batches, writes
/// each batch to storage with a per-attempt timeout, retries failing
/// batches with exponential backoff up to the configured attempt ceiling,
/// and drops-and-counts batches that exhaust it. Storage trouble never
/// propagates beyond this task.
pub struct SinkWorker {
    queue: Arc<LogQueue>,
    storage: Arc<dyn LogStorage>,
    config: SinkConfig,
    metrics: Arc<ProxyMetrics>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SinkWorker {
    /// Create a new worker; the returned sender requests shutdown
    pub fn new(
        queue: Arc<LogQueue>,
        storage: Arc<dyn LogStorage>,
        config: SinkConfig,
        metrics: Arc<ProxyMetrics>,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = Self {
            queue,
            storage,
            config,
            metrics,
            shutdown_rx,
        };

        (worker, shutdown_tx)
    }

    /// Run the drain loop until shutdown is requested
    pub async fn run(mut self) {
        info!("Log sink worker started");

        loop {
            if self.shutdown_rx.try_recv().is_ok() {
                info!("Log sink worker shutting down");
                break;
            }

            if !self.drain_batch().await {
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        }

        self.final_flush().await;
        info!("Log sink worker stopped");
    }

    /// Drain and write one batch; returns whether any records were taken
    async fn drain_batch(&self) -> bool {
        let batch = self.take_batch();
        if batch.is_empty() {
            return false;
        }

        self.write_with_retry(&batch).await;
        true
    }

    /// Pop up to `batch_size` records off the queue
    fn take_batch(&self) -> Vec<LogRecord> {
        let batch_size = *self.config.batch_size.as_ref();
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.queue.dequeue() {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        batch
    }

    /// Write a batch, retrying up to the attempt ceiling
    ///
    /// A batch that exhausts its attempts is dropped and counted; it is
    /// never re-queued, so a dead storage backend cannot grow memory.
    async fn write_with_retry(&self, batch: &[LogRecord]) {
        let max_attempts = *self.config.max_retries.as_ref();
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(self.config.write_timeout, self.storage.append(batch)).await
            {
                Ok(Ok(())) => {
                    debug!(records = batch.len(), "Batch written to log storage");
                    return;
                }
                Ok(Err(e)) => {
                    warn!(attempt, max_attempts, error = %e, "Log storage write failed");
                }
                Err(_) => {
                    warn!(
                        attempt,
                        max_attempts,
                        timeout_ms = self.config.write_timeout.as_millis() as u64,
                        "Log storage write timed out"
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }

        self.metrics.record_retry_exhausted_drops(batch.len() as u64);
        warn!(
            records = batch.len(),
            "Dropping batch after exhausting storage write attempts"
        );
    }

    /// Best-effort flush of whatever is still queued, within a bounded window
    ///
    /// Each remaining batch gets a single attempt whose timeout never
    /// extends past the window. Every dequeued batch is accounted for:
    /// it is either written or dropped and counted, including a batch
    /// whose write is cut short by the window closing. Shutdown never
    /// waits on a dead storage backend.
    async fn final_flush(&self) {
        let pending = self.queue.len();
        if pending == 0 {
            return;
        }
        info!(pending, "Flushing queued records before shutdown");

        let deadline = tokio::time::Instant::now() + SHUTDOWN_FLUSH_WINDOW;
        loop {
            let batch = self.take_batch();
            if batch.is_empty() {
                break;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                let lost = batch.len() as u64 + self.queue.len() as u64;
                self.metrics.record_retry_exhausted_drops(lost);
                warn!(
                    records = lost,
                    "Shutdown flush window elapsed with records unwritten"
                );
                return;
            }

            let attempt_timeout = self.config.write_timeout.min(remaining);
            match tokio::time::timeout(attempt_timeout, self.storage.append(&batch)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.record_retry_exhausted_drops(batch.len() as u64);
                    warn!(error = %e, records = batch.len(), "Dropping batch during shutdown flush");
                }
                Err(_) => {
                    self.metrics.record_retry_exhausted_drops(batch.len() as u64);
                    warn!(records = batch.len(), "Shutdown flush write timed out");
                }
            }
        }
    }
}
