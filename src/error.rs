//! Error types for the migration pipeline.
//!
//! Every error here is fatal: nothing is retried, and the first failure
//! anywhere in the pipeline terminates the whole run.

/// Errors that can occur during a migration run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MigrateError {
    /// Transport dial or handshake I/O failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The store rejected AUTH.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The store rejected SELECT.
    #[error("database selection failed: {0}")]
    Select(String),

    /// SCAN iteration failed.
    #[error("scan failed: {0}")]
    Scan(String),

    /// DUMP failed for a key that still exists.
    #[error("dump failed: {0}")]
    Dump(String),

    /// The destination rejected a RESTORE.
    #[error("restore failed: {0}")]
    Restore(String),

    /// The producer task panicked or was cancelled.
    #[error("producer task failed: {0}")]
    Producer(String),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
