use std::collections::HashMap;
use std::sync::RwLock;

use holm_crypto::ContentHasher;
use holm_types::Cid;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ContentStore, StoreStats};

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. All payloads are held in memory behind a
/// `RwLock` for safe concurrent access. Payloads are cloned on read, and the
/// clone is digest-checked like any other backend's read; a corrupted slot is
/// evicted and reported as [`StoreError::Corrupt`].
pub struct InMemoryContentStore {
    payloads: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl InMemoryContentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            payloads: RwLock::new(HashMap::new()),
        }
    }

    /// Number of payloads currently stored.
    pub fn len(&self) -> usize {
        self.payloads.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.payloads.read().expect("lock poisoned").is_empty()
    }

    /// Remove all payloads from the store.
    pub fn clear(&self) {
        self.payloads.write().expect("lock poisoned").clear();
    }

    /// Return a sorted list of all payload ids in the store.
    pub fn all_cids(&self) -> Vec<Cid> {
        let map = self.payloads.read().expect("lock poisoned");
        let mut cids: Vec<Cid> = map.keys().copied().collect();
        cids.sort();
        cids
    }

    /// Overwrite a stored payload in place, bypassing content addressing.
    #[cfg(test)]
    fn tamper(&self, cid: &Cid, bytes: Vec<u8>) {
        self.payloads
            .write()
            .expect("lock poisoned")
            .insert(*cid, bytes);
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryContentStore {
    fn put(&self, payload: &[u8]) -> StoreResult<Cid> {
        let cid = ContentHasher::PAYLOAD.hash(payload);
        let mut map = self.payloads.write().expect("lock poisoned");
        // Idempotent: if already present, skip (content-addressing guarantees
        // the same id always maps to the same bytes).
        map.entry(cid).or_insert_with(|| payload.to_vec());
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> StoreResult<Option<Vec<u8>>> {
        let payload = {
            let map = self.payloads.read().expect("lock poisoned");
            match map.get(cid) {
                Some(payload) => payload.clone(),
                None => return Ok(None),
            }
        };

        if !ContentHasher::PAYLOAD.verify(&payload, cid) {
            self.payloads.write().expect("lock poisoned").remove(cid);
            warn!(cid = %cid.short_hex(), "corrupt payload evicted");
            return Err(StoreError::Corrupt {
                id: *cid,
                reason: "digest mismatch on read".into(),
            });
        }

        Ok(Some(payload))
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        let map = self.payloads.read().expect("lock poisoned");
        Ok(map.contains_key(cid))
    }

    fn delete(&self, cid: &Cid) -> StoreResult<bool> {
        let mut map = self.payloads.write().expect("lock poisoned");
        Ok(map.remove(cid).is_some())
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let map = self.payloads.read().expect("lock poisoned");
        Ok(StoreStats {
            payload_count: map.len() as u64,
            total_bytes: map.values().map(|p| p.len() as u64).sum(),
        })
    }

    fn cids(&self) -> StoreResult<Vec<Cid>> {
        Ok(self.all_cids())
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryContentStore")
            .field("payload_count", &count)
            .finish()
    }
}
