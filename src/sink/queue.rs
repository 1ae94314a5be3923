//! Bounded lock-free queue between request tasks and the drain worker

use crate::proxy::types::{LogRecord, QueueCapacity};
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Usage statistics for the log queue
pub struct QueueStats {
    pub total_enqueued: u64,
    pub total_drained: u64,
    pub total_rejected: u64,
}

/// Bounded MPMC queue of log records
///
/// The only state shared between request-handling tasks and the drain
/// worker. Producers never block: `enqueue` either places the record or
/// refuses it immediately when the queue is at capacity. Refusal is the
/// backpressure policy; a refused record is dropped by the caller, never
/// retried against the client's request.
pub struct LogQueue {
    queue: ArrayQueue<LogRecord>,
    enqueued: AtomicU64,
    drained: AtomicU64,
    rejected: AtomicU64,
}

impl LogQueue {
    /// Create a queue holding at most `capacity` records
    pub fn new(capacity: QueueCapacity) -> Self {
        Self {
            queue: ArrayQueue::new(*capacity.as_ref()),
            enqueued: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Offer a record to the queue without blocking
    ///
    /// Returns `true` when the record was accepted. Returns `false` when
    /// the queue is full; the record is dropped and ownership ends here.
    pub fn enqueue(&self, record: LogRecord) -> bool {
        match self.queue.push(record) {
            Ok(()) => {
                self.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_rejected_record) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Take the next record, if any
    pub fn dequeue(&self) -> Option<LogRecord> {
        let record = self.queue.pop();
        if record.is_some() {
            self.drained.fetch_add(1, Ordering::Relaxed);
        }
        record
    }

    /// Number of records currently buffered
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Usage statistics since creation
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total_enqueued: self.enqueued.load(Ordering::Relaxed),
            total_drained: self.drained.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
