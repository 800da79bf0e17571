use holm_types::Cid;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested payload was not found.
    #[error("payload not found: {0}")]
    NotFound(Cid),

    /// Content hash mismatch on read (data corruption). The offending file
    /// has been moved to quarantine; subsequent reads of other payloads are
    /// unaffected.
    #[error("corrupt payload {id}: {reason}")]
    Corrupt { id: Cid, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage backend cannot be reached or initialized.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
