use async_trait::async_trait;
use holm_log::{Head, LogEntry};
use holm_types::{Cid, EntryId, ReplicaId};

use crate::error::SyncResult;

/// Transport interface to a remote Holm replica.
///
/// Three request/response hooks are enough for pull replication: advertise
/// heads, serve a chain suffix, serve a payload. Implementations never
/// verify anything; the puller re-checks every batch locally.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Head advertisement for every log the remote knows.
    async fn heads(&self) -> SyncResult<Vec<Head>>;

    /// Entries of `author`'s chain strictly after `after`, root-first when
    /// `None`. A remote that does not recognize `after` answers with an
    /// error, which the puller treats as a chain gap.
    async fn entries_after(
        &self,
        author: &ReplicaId,
        after: Option<&EntryId>,
    ) -> SyncResult<Vec<LogEntry>>;

    /// Fetch one payload by content id, `None` when the remote lacks it.
    async fn payload(&self, cid: &Cid) -> SyncResult<Option<Vec<u8>>>;
}
