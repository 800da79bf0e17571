use holm_types::Cid;

use crate::error::StoreResult;

/// Counters describing a store's current contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of payloads currently stored.
    pub payload_count: u64,
    /// Total bytes across all stored payloads.
    pub total_bytes: u64,
}

/// Content-addressed payload store.
///
/// All implementations must satisfy these invariants:
/// - Payloads are immutable once written. Content-addressing guarantees this:
///   the same bytes always produce the same [`Cid`].
/// - `put` of identical bytes is idempotent and returns the same id.
/// - Every `get` re-verifies the digest before returning; corrupt data is
///   never handed to a caller.
/// - Concurrent reads are always safe (payloads are immutable).
/// - The store never interprets payload contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ContentStore: Send + Sync {
    /// Store a payload and return its content-addressed id.
    ///
    /// If the payload already exists, this is a no-op (idempotent).
    fn put(&self, payload: &[u8]) -> StoreResult<Cid>;

    /// Read a payload by its content-addressed id.
    ///
    /// Returns `Ok(None)` if the payload does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn get(&self, cid: &Cid) -> StoreResult<Option<Vec<u8>>>;

    /// Check whether a payload exists in the store.
    fn has(&self, cid: &Cid) -> StoreResult<bool>;

    /// Delete a payload by id. Returns `true` if the payload existed.
    ///
    /// This is intended for garbage collection only. Deletion of payloads
    /// still referenced by log entries leaves dangling references.
    fn delete(&self, cid: &Cid) -> StoreResult<bool>;

    /// Current store counters.
    fn stats(&self) -> StoreResult<StoreStats>;

    /// Ids of every payload currently stored, in no particular order.
    ///
    /// Garbage collection walks this to find unreferenced payloads.
    fn cids(&self) -> StoreResult<Vec<Cid>>;

    /// Read multiple payloads in a batch.
    ///
    /// Default implementation calls `get()` for each id. Backends may
    /// override for better performance (e.g., fewer I/O round-trips).
    fn get_batch(&self, cids: &[Cid]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        cids.iter().map(|cid| self.get(cid)).collect()
    }

    /// Store multiple payloads in a batch and return their ids.
    ///
    /// Default implementation calls `put()` for each payload.
    fn put_batch(&self, payloads: &[Vec<u8>]) -> StoreResult<Vec<Cid>> {
        payloads.iter().map(|p| self.put(p)).collect()
    }
}
