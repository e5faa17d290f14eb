//! Restore consumer
//!
//! Drains batches off the queue in FIFO order and writes each one to the
//! destination with a single pipelined RESTORE round trip. The loop ends
//! when the queue is closed and drained; any restore error is fatal and
//! leaves the destination partially migrated (no rollback).

use tokio::sync::mpsc;
use tracing::debug;

use super::{progress_tick, Batch};
use crate::error::Result;
use crate::store::StoreHandle;

/// Consume batches until the queue closes. Returns the number of keys
/// restored.
pub(crate) async fn run(
    destination: &mut StoreHandle,
    mut rx: mpsc::Receiver<Batch>,
) -> Result<u64> {
    let mut keys_restored = 0u64;

    while let Some(batch) = rx.recv().await {
        destination.restore_pipelined(&batch).await?;
        keys_restored += batch.len() as u64;
        progress_tick('.');
        debug!(keys = batch.len(), total = keys_restored, "restored batch");
    }

    Ok(keys_restored)
}
