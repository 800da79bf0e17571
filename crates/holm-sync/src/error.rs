use holm_types::{EntryId, ReplicaId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A fetched batch does not attach to the local chain. The puller
    /// recovers by refetching the author's chain from the root.
    #[error("chain gap for author {author}: batch extends {batch_prev:?}, local head is {local_head:?}")]
    ChainGap {
        author: ReplicaId,
        local_head: Option<EntryId>,
        batch_prev: Option<EntryId>,
    },

    #[error("batch verification failed for author {author}: {reason}")]
    Verification { author: ReplicaId, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("log error: {0}")]
    Log(#[from] holm_log::LogError),

    #[error("store error: {0}")]
    Store(#[from] holm_store::StoreError),
}

pub type SyncResult<T> = Result<T, SyncError>;
