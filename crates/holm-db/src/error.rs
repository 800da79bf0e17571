use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// No live document under the given key.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The operation did not finish within [`DbOptions::op_timeout`].
    ///
    /// [`DbOptions::op_timeout`]: crate::DbOptions::op_timeout
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The replica key file exists but cannot be used.
    #[error("replica identity error: {0}")]
    Identity(String),

    /// Content store failure.
    #[error("store error: {0}")]
    Store(#[from] holm_store::StoreError),

    /// Log store failure.
    #[error("log error: {0}")]
    Log(#[from] holm_log::LogError),

    /// Replication failure.
    #[error("sync error: {0}")]
    Sync(#[from] holm_sync::SyncError),

    /// I/O error outside the store and log layers (directory setup,
    /// identity file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
