use holm_crypto::HashChainVerifier;
use holm_types::{EntryId, ReplicaId};

use crate::entry::{Head, LogEntry};
use crate::error::{LogError, LogResult};

/// Store of per-replica append-only logs.
///
/// All implementations must satisfy these invariants:
/// - One log per author; entries within a log are totally ordered and
///   chained by id. Logs only grow.
/// - `append` succeeds only when the entry extends the current head.
///   Anything else is a [`LogError::ConcurrentAppend`]: the caller re-reads
///   the head, rebuilds the entry, and retries.
/// - Reads never observe a partially appended entry.
/// - All I/O errors are propagated, never silently ignored.
pub trait LogStore: Send + Sync {
    /// Append an entry to its author's log.
    ///
    /// The entry's `prev_id` must equal the author's current head and its id
    /// must verify against its body; violations return
    /// [`LogError::ConcurrentAppend`] and [`LogError::IntegrityViolation`]
    /// respectively.
    fn append(&self, entry: &LogEntry) -> LogResult<()>;

    /// Id of the latest entry in an author's log (None for empty/unknown).
    fn head(&self, author: &ReplicaId) -> LogResult<Option<EntryId>>;

    /// The latest entry of an author's log (None for empty/unknown).
    ///
    /// Replication seeds batch verification from the tail's id and
    /// timestamp. Backends that mirror logs in memory should override the
    /// default full read.
    fn tail(&self, author: &ReplicaId) -> LogResult<Option<LogEntry>> {
        Ok(self.read_all(author)?.pop())
    }

    /// Entries of an author's log strictly after `after`, oldest first.
    ///
    /// `None` means "from the beginning". An `after` id the store does not
    /// hold for this author is a [`LogError::UnknownEntry`]; replication
    /// treats that as a chain gap and falls back to a full fetch.
    fn entries_since(&self, author: &ReplicaId, after: Option<EntryId>)
        -> LogResult<Vec<LogEntry>>;

    /// All entries of an author's log, oldest first.
    fn read_all(&self, author: &ReplicaId) -> LogResult<Vec<LogEntry>>;

    /// Authors with a log in this store, sorted by id.
    fn authors(&self) -> LogResult<Vec<ReplicaId>>;

    /// Number of entries in an author's log.
    fn len(&self, author: &ReplicaId) -> LogResult<u64>;

    /// Whether the given entry id exists in the author's log.
    fn contains(&self, author: &ReplicaId, id: &EntryId) -> LogResult<bool>;

    /// Force buffered appends to durable storage.
    ///
    /// A no-op for stores that are already durable (or not durable at all);
    /// file-backed stores sync their chain files here on shutdown.
    fn flush(&self) -> LogResult<()> {
        Ok(())
    }

    /// Advertised positions of every log in the store.
    fn heads(&self) -> LogResult<Vec<Head>> {
        self.authors()?
            .into_iter()
            .map(|author| {
                Ok(Head {
                    author,
                    entry: self.head(&author)?,
                    len: self.len(&author)?,
                })
            })
            .collect()
    }

    /// Re-verify the full hash chain of an author's log.
    ///
    /// Walks every entry, recomputing ids and prev links, and checks that
    /// timestamps strictly increase along the chain. Detects tampering in
    /// storage that happened after append-time validation.
    fn verify_chain(&self, author: &ReplicaId) -> LogResult<()> {
        let entries = self.read_all(author)?;
        HashChainVerifier::verify_chain(&entries).map_err(|e| LogError::IntegrityViolation {
            author: *author,
            reason: e.to_string(),
        })?;
        for pair in entries.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(LogError::IntegrityViolation {
                    author: *author,
                    reason: format!(
                        "timestamp not increasing: {} then {}",
                        pair[0].timestamp, pair[1].timestamp
                    ),
                });
            }
        }
        Ok(())
    }
}
