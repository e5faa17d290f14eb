//! Scan producer
//!
//! Walks the source keyspace with cursor-driven SCAN pages, serializes
//! each page's keys with one pipelined DUMP round trip, and pushes the
//! resulting batch onto the queue. Dropping the sender on return closes
//! the queue and lets the consumer drain and finish.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use super::{progress_tick, Batch};
use crate::error::Result;
use crate::store::StoreHandle;

/// Per-run producer counters.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ProducerStats {
    pub pages: u64,
    pub keys_captured: u64,
    pub keys_skipped: u64,
}

/// Run the scan loop until the server reports the iteration finished
/// (cursor 0) or a fatal error occurs.
///
/// The final page's batch is always sent, even when empty, so the
/// consumer observes at least one batch per run.
pub(crate) async fn run(
    mut source: StoreHandle,
    tx: mpsc::Sender<Batch>,
) -> Result<ProducerStats> {
    let mut stats = ProducerStats::default();
    let mut cursor = 0u64;

    loop {
        let (next_cursor, keys) = source.scan_page(cursor).await?;
        let dumps = source.dump_pipelined(&keys).await?;

        let batch = assemble_batch(keys, dumps, &mut stats);
        stats.pages += 1;
        stats.keys_captured += batch.len() as u64;
        debug!(
            page = stats.pages,
            keys = batch.len(),
            next_cursor,
            "scanned page"
        );

        if next_cursor == 0 {
            // Final page: send unconditionally, then close the queue by
            // dropping the sender.
            let _ = tx.send(batch).await;
            return Ok(stats);
        }

        if tx.send(batch).await.is_err() {
            // Receiver gone: the consumer failed and its error is the one
            // the orchestrator reports. Stop scanning.
            debug!("queue closed by consumer, stopping scan");
            return Ok(stats);
        }
        progress_tick('>');
        cursor = next_cursor;
    }
}

/// Zip keys with their dump replies, skipping keys that vanished between
/// SCAN and DUMP (nil reply — an accepted race, not an error).
fn assemble_batch(
    keys: Vec<Bytes>,
    dumps: Vec<Option<Bytes>>,
    stats: &mut ProducerStats,
) -> Batch {
    let mut batch = Batch::with_capacity(keys.len());
    for (key, dump) in keys.into_iter().zip(dumps) {
        match dump {
            Some(blob) => {
                batch.insert(key, blob);
            }
            None => {
                debug!(key = ?String::from_utf8_lossy(&key), "key vanished before dump, skipping");
                stats.keys_skipped += 1;
            }
        }
    }
    batch
}
