//! Asynchronous log sink: bounded queue, drain worker, storage backends
//!
//! The sink decouples request latency from log persistence. Producers
//! hand records over through a non-blocking bounded queue; a single
//! background worker drains them to the storage collaborator in batches,
//! absorbing transient write failures with bounded retry.

pub mod queue;
pub mod storage;
pub mod worker;

use crate::proxy::metrics::ProxyMetrics;
use crate::proxy::types::{LogRecord, SinkConfig};
use queue::LogQueue;
use std::sync::Arc;
use std::time::Duration;
use storage::LogStorage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use worker::SinkWorker;

/// Extra grace on top of the worker's own flush window before shutdown
/// gives up on joining it
const SHUTDOWN_JOIN_GRACE: Duration = Duration::from_secs(10);

/// Producer-side handle to the sink
///
/// Cheap to clone; one per request task. Only exposes the non-blocking
/// enqueue, so nothing on the response path can wait on the sink.
#[derive(Clone)]
pub struct SinkHandle {
    queue: Arc<LogQueue>,
}

impl SinkHandle {
    /// Offer a record to the sink; `false` means it was dropped
    pub fn enqueue(&self, record: LogRecord) -> bool {
        self.queue.enqueue(record)
    }

    /// The shared queue, for tests and diagnostics
    pub fn queue(&self) -> Arc<LogQueue> {
        Arc::clone(&self.queue)
    }
}

/// Controller owning the worker's lifecycle
pub struct SinkController {
    shutdown_tx: mpsc::Sender<()>,
    worker: JoinHandle<()>,
}

impl SinkController {
    /// Signal the worker and wait for its best-effort final flush
    pub async fn shutdown(self) {
        // The worker may already be gone; a closed channel is fine
        let _ = self.shutdown_tx.send(()).await;

        if tokio::time::timeout(SHUTDOWN_JOIN_GRACE, self.worker)
            .await
            .is_err()
        {
            warn!("Log sink worker did not stop within the shutdown window");
        }
    }
}

/// Spawn the sink: queue plus one background drain task
pub fn spawn_sink(
    config: SinkConfig,
    storage: Arc<dyn LogStorage>,
    metrics: Arc<ProxyMetrics>,
) -> (SinkHandle, SinkController) {
    let queue = Arc::new(LogQueue::new(config.queue_capacity));

    let (worker, shutdown_tx) = SinkWorker::new(Arc::clone(&queue), storage, config, metrics);
    let worker = tokio::spawn(worker.run());

    (
        SinkHandle { queue },
        SinkController {
            shutdown_tx,
            worker,
        },
    )
}
