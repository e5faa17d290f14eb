//! Migration pipeline
//!
//! A two-task pipeline: a scan producer enumerates and serializes the
//! source keyspace page by page, a restore consumer writes each batch to
//! the destination, and a bounded FIFO queue between them provides
//! backpressure. There is exactly one producer and one consumer per run;
//! the only parallelism is the two ends of the pipe overlapping.

mod consumer;
mod producer;

use std::collections::HashMap;
use std::io::Write;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{MigrateError, Result};
use crate::store::StoreHandle;

/// Default queue capacity, in batches. With one batch per scan page the
/// producer never holds more than capacity + 1 unconsumed pages in flight.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// One scan page's worth of keys and their serialized values.
///
/// Keys are unique within a batch; the same key may reappear in a later
/// batch if the source mutates mid-scan, in which case the later RESTORE
/// overwrites the earlier one.
pub type Batch = HashMap<Bytes, Bytes>;

/// Counters and timing for a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Scan pages consumed from the source.
    pub pages: u64,
    /// Keys captured from the source (dumped and queued).
    pub keys_scanned: u64,
    /// Keys that vanished between SCAN and DUMP and were skipped.
    pub keys_skipped: u64,
    /// Keys written to the destination.
    pub keys_restored: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Owns both store handles and the queue, and runs the pipeline to
/// completion or first fatal error.
pub struct Migrator {
    source: StoreHandle,
    destination: StoreHandle,
    queue_capacity: usize,
}

impl Migrator {
    /// Create a migrator over an already-connected source and destination.
    pub fn new(source: StoreHandle, destination: StoreHandle) -> Self {
        Self {
            source,
            destination,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Override the queue capacity (clamped to at least one batch).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Run the pipeline: producer in a background task, consumer in the
    /// foreground, then join the producer so a panic or late error is
    /// reported rather than lost.
    pub async fn run(self) -> Result<MigrationSummary> {
        let start = Instant::now();
        let (tx, rx) = mpsc::channel::<Batch>(self.queue_capacity);

        let producer = tokio::spawn(producer::run(self.source, tx));

        let mut destination = self.destination;
        let consumer_result = consumer::run(&mut destination, rx).await;

        // Always join: if the consumer failed, the dropped receiver has
        // already unblocked a producer stuck on a full queue.
        let producer_result = match producer.await {
            Ok(result) => result,
            Err(e) => Err(MigrateError::Producer(e.to_string())),
        };

        let keys_restored = consumer_result?;
        let stats = producer_result?;

        let summary = MigrationSummary {
            pages: stats.pages,
            keys_scanned: stats.keys_captured,
            keys_skipped: stats.keys_skipped,
            keys_restored,
            elapsed: start.elapsed(),
        };
        info!(
            pages = summary.pages,
            keys = summary.keys_restored,
            skipped = summary.keys_skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "migration complete"
        );
        Ok(summary)
    }
}

/// Emit one progress character to stdout. `>` per scanned page, `.` per
/// restored batch — a rate signal for the operator, not a correctness
/// mechanism.
fn progress_tick(symbol: char) {
    print!("{}", symbol);
    let _ = std::io::stdout().flush();
}
