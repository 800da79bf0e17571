use holm_types::{EntryId, ReplicaId};

/// Errors produced by log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The entry's `prev_id` does not match the current head of the
    /// author's log. Another writer advanced the log first; re-read the
    /// head and retry.
    #[error("concurrent append on log {author}: head is {expected:?}, entry extends {actual:?}")]
    ConcurrentAppend {
        author: ReplicaId,
        expected: Option<EntryId>,
        actual: Option<EntryId>,
    },

    /// An entry id was referenced that the store does not hold for this
    /// author. During replication this signals a chain gap.
    #[error("unknown entry {id} in log {author}")]
    UnknownEntry { author: ReplicaId, id: EntryId },

    /// The stored chain fails verification (broken link or id mismatch).
    #[error("integrity violation in log {author}: {reason}")]
    IntegrityViolation { author: ReplicaId, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for log operations.
pub type LogResult<T> = Result<T, LogError>;
