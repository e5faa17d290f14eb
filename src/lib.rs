//! # Keyferry
//!
//! Migrates the full keyspace of one Redis-compatible store to another
//! over the plain client protocol: SCAN enumerates the source in
//! server-driven pages, pipelined DUMP serializes each page in one round
//! trip, and pipelined RESTORE replays the blobs into the destination.
//! The two stores never share a replication protocol.
//!
//! Values are copied binary-exact and persist without TTLs. One pass,
//! no resume: any error is fatal and ends the run.

pub mod error;
pub mod migrate;
pub mod protocol;
pub mod store;

pub use error::{MigrateError, Result};
pub use migrate::{Batch, MigrationSummary, Migrator, DEFAULT_QUEUE_CAPACITY};
pub use store::StoreHandle;
