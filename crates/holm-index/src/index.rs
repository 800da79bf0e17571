//! The core index structure folding log entries into per-key winners.
//!
//! [`DocumentIndex`] manages a `BTreeMap<String, IndexSlot>`. It is purely
//! in-memory and holds no lock of its own; the embedding layer decides how
//! to share it. Durability is the log stores' concern: the index can always
//! be rebuilt by replaying the logs.

use std::collections::BTreeMap;

use holm_log::LogEntry;
use tracing::debug;

use crate::slot::IndexSlot;

/// Key-to-winner map over the union of all replica logs.
///
/// `apply` folds one entry at a time: the candidate replaces the incumbent
/// slot only when its `(timestamp, author)` merge key is strictly greater.
/// An equal key keeps the incumbent, so re-applying an entry is a no-op and
/// the fold converges to the same index for any delivery order of the same
/// entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentIndex {
    slots: BTreeMap<String, IndexSlot>,
}

impl DocumentIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    // ---------------------------------------------------------------
    // Merge
    // ---------------------------------------------------------------

    /// Fold one log entry into the index.
    ///
    /// Returns `true` when the entry won its key, `false` when the incumbent
    /// slot outranks it (or the same entry was already applied).
    pub fn apply(&mut self, entry: &LogEntry) -> bool {
        let key = entry.op.key();
        if let Some(incumbent) = self.slots.get(key) {
            if entry.merge_key() <= incumbent.merge_key() {
                return false;
            }
        }
        self.slots
            .insert(key.to_string(), IndexSlot::from_entry(entry));
        true
    }

    /// Drop every slot and refold the index from `entries`.
    ///
    /// Delivery order does not matter; tombstones are restored along with
    /// live slots.
    pub fn rebuild<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = &'a LogEntry>,
    {
        self.slots.clear();
        let mut folded = 0usize;
        for entry in entries {
            self.apply(entry);
            folded += 1;
        }
        debug!(entries = folded, keys = self.slots.len(), "index rebuilt");
    }

    /// Remove tombstoned slots, returning how many were dropped.
    ///
    /// Compaction discards the causal record of the deletions: an older
    /// `Put` replayed afterwards wins the vacated key again. Callers must
    /// only compact once every replica has seen the tombstones.
    pub fn compact(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live());
        let dropped = before - self.slots.len();
        if dropped > 0 {
            debug!(dropped, "tombstoned slots compacted");
        }
        dropped
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// The live slot for `key`. Tombstoned keys read as absent.
    pub fn get(&self, key: &str) -> Option<&IndexSlot> {
        self.slots.get(key).filter(|slot| slot.is_live())
    }

    /// The slot for `key`, tombstoned or not.
    pub fn lookup(&self, key: &str) -> Option<&IndexSlot> {
        self.slots.get(key)
    }

    /// Iterate live `(key, slot)` pairs in key order.
    pub fn all(&self) -> impl Iterator<Item = (&str, &IndexSlot)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_live())
            .map(|(key, slot)| (key.as_str(), slot))
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_live()).count()
    }

    /// Returns `true` when no live documents exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tombstoned slots awaiting [`DocumentIndex::compact`].
    pub fn tombstone_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.tombstoned).count()
    }
}

#[cfg(test)]
mod tests {
    use holm_log::Op;
    use holm_types::{Cid, ReplicaId};
    use proptest::prelude::*;

    use super::*;

    fn author(seed: u8) -> ReplicaId {
        ReplicaId::from_raw([seed; 32])
    }

    fn put(author: ReplicaId, timestamp: u64, key: &str, payload: u8) -> LogEntry {
        LogEntry::create(
            None,
            timestamp,
            author,
            Op::Put {
                key: key.to_string(),
                payload: Cid::from([payload; 32]),
            },
        )
    }

    fn delete(author: ReplicaId, timestamp: u64, key: &str) -> LogEntry {
        LogEntry::create(
            None,
            timestamp,
            author,
            Op::Delete {
                key: key.to_string(),
            },
        )
    }

    #[test]
    fn new_index_is_empty() {
        let idx = DocumentIndex::new();
        assert!(idx.is_empty());
        assert_eq!(idx.len(), 0);
        assert_eq!(idx.tombstone_count(), 0);
        assert!(idx.get("anything").is_none());
    }

    #[test]
    fn first_write_wins_vacant_key() {
        let mut idx = DocumentIndex::new();
        let entry = put(author(1), 1, "doc", 0xaa);

        assert!(idx.apply(&entry));
        let slot = idx.get("doc").unwrap();
        assert_eq!(slot.payload, Some(Cid::from([0xaa; 32])));
        assert_eq!(slot.entry, entry.id);
    }

    #[test]
    fn higher_timestamp_replaces_incumbent() {
        let mut idx = DocumentIndex::new();
        idx.apply(&put(author(1), 1, "doc", 0x01));

        assert!(idx.apply(&put(author(2), 5, "doc", 0x02)));
        assert_eq!(idx.get("doc").unwrap().payload, Some(Cid::from([0x02; 32])));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn stale_write_is_rejected() {
        let mut idx = DocumentIndex::new();
        idx.apply(&put(author(1), 5, "doc", 0x01));

        assert!(!idx.apply(&put(author(2), 3, "doc", 0x02)));
        assert_eq!(idx.get("doc").unwrap().payload, Some(Cid::from([0x01; 32])));
    }

    #[test]
    fn author_breaks_timestamp_ties() {
        let low = author(1);
        let high = author(9);
        assert!(low < high);

        let mut idx = DocumentIndex::new();
        idx.apply(&put(low, 4, "doc", 0x01));
        assert!(idx.apply(&put(high, 4, "doc", 0x02)));
        assert_eq!(idx.get("doc").unwrap().author, high);

        // The lower author at the same timestamp loses no matter the order.
        let mut idx2 = DocumentIndex::new();
        idx2.apply(&put(high, 4, "doc", 0x02));
        assert!(!idx2.apply(&put(low, 4, "doc", 0x01)));
        assert_eq!(idx2.get("doc").unwrap().author, high);
    }

    #[test]
    fn reapply_is_a_noop() {
        let mut idx = DocumentIndex::new();
        let entry = put(author(1), 2, "doc", 0x01);

        assert!(idx.apply(&entry));
        let snapshot = idx.clone();
        assert!(!idx.apply(&entry));
        assert_eq!(idx, snapshot);
    }

    #[test]
    fn delete_installs_tombstone() {
        let mut idx = DocumentIndex::new();
        idx.apply(&put(author(1), 1, "doc", 0x01));
        assert!(idx.apply(&delete(author(1), 2, "doc")));

        assert!(idx.get("doc").is_none());
        let slot = idx.lookup("doc").unwrap();
        assert!(slot.tombstoned);
        assert_eq!(slot.payload, None);
        assert_eq!(idx.len(), 0);
        assert_eq!(idx.tombstone_count(), 1);
    }

    #[test]
    fn newer_put_resurrects_deleted_key() {
        let mut idx = DocumentIndex::new();
        idx.apply(&put(author(1), 1, "doc", 0x01));
        idx.apply(&delete(author(1), 2, "doc"));

        assert!(idx.apply(&put(author(2), 3, "doc", 0x03)));
        assert_eq!(idx.get("doc").unwrap().payload, Some(Cid::from([0x03; 32])));
        assert_eq!(idx.tombstone_count(), 0);
    }

    #[test]
    fn stale_put_cannot_resurrect_deleted_key() {
        let mut idx = DocumentIndex::new();
        idx.apply(&delete(author(1), 5, "doc"));

        assert!(!idx.apply(&put(author(2), 3, "doc", 0x02)));
        assert!(idx.get("doc").is_none());
        assert!(idx.lookup("doc").unwrap().tombstoned);
    }

    #[test]
    fn all_lists_live_keys_sorted() {
        let mut idx = DocumentIndex::new();
        idx.apply(&put(author(1), 1, "cherry", 0x03));
        idx.apply(&put(author(1), 2, "apple", 0x01));
        idx.apply(&put(author(1), 3, "banana", 0x02));
        idx.apply(&delete(author(1), 4, "banana"));

        let keys: Vec<&str> = idx.all().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["apple", "cherry"]);
    }

    #[test]
    fn rebuild_replaces_previous_state() {
        let mut idx = DocumentIndex::new();
        idx.apply(&put(author(1), 1, "old", 0x01));

        let entries = vec![
            put(author(2), 1, "a", 0x0a),
            delete(author(2), 2, "a"),
            put(author(3), 1, "b", 0x0b),
        ];
        idx.rebuild(&entries);

        assert!(idx.lookup("old").is_none());
        assert!(idx.get("a").is_none());
        assert!(idx.lookup("a").unwrap().tombstoned);
        assert_eq!(idx.get("b").unwrap().payload, Some(Cid::from([0x0b; 32])));
    }

    #[test]
    fn rebuild_matches_incremental_fold() {
        let entries = vec![
            put(author(1), 1, "x", 0x01),
            put(author(2), 2, "x", 0x02),
            delete(author(1), 3, "y"),
            put(author(3), 1, "z", 0x03),
        ];

        let mut incremental = DocumentIndex::new();
        for entry in &entries {
            incremental.apply(entry);
        }

        let mut rebuilt = DocumentIndex::new();
        rebuilt.rebuild(&entries);

        assert_eq!(incremental, rebuilt);
    }

    #[test]
    fn compact_drops_only_tombstones() {
        let mut idx = DocumentIndex::new();
        idx.apply(&put(author(1), 1, "keep", 0x01));
        idx.apply(&delete(author(1), 2, "gone"));
        idx.apply(&delete(author(1), 3, "also-gone"));

        assert_eq!(idx.compact(), 2);
        assert_eq!(idx.tombstone_count(), 0);
        assert!(idx.lookup("gone").is_none());
        assert!(idx.get("keep").is_some());
        assert_eq!(idx.compact(), 0);
    }

    #[test]
    fn converges_for_both_delivery_orders() {
        let entries = vec![
            put(author(1), 1, "doc", 0x01),
            put(author(2), 2, "doc", 0x02),
            delete(author(1), 3, "doc"),
            put(author(2), 4, "doc", 0x04),
        ];

        let mut forward = DocumentIndex::new();
        for entry in &entries {
            forward.apply(entry);
        }
        let mut backward = DocumentIndex::new();
        for entry in entries.iter().rev() {
            backward.apply(entry);
        }

        assert_eq!(forward, backward);
        assert_eq!(forward.get("doc").unwrap().payload, Some(Cid::from([0x04; 32])));
    }

    /// Batches of entries with unique `(author, timestamp)` pairs, the
    /// invariant real logs guarantee (an author never reuses a timestamp).
    fn entry_batch_strategy() -> impl Strategy<Value = Vec<LogEntry>> {
        let key = prop::sample::select(vec!["a", "b", "c"]);
        let op = prop::option::of(any::<u8>());
        prop::collection::btree_map((0u8..4, 1u64..16), (key, op), 0..24).prop_map(|specs| {
            specs
                .into_iter()
                .map(|((seed, timestamp), (key, payload))| match payload {
                    Some(byte) => put(author(seed), timestamp, key, byte),
                    None => delete(author(seed), timestamp, key),
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn fold_is_order_independent(entries in entry_batch_strategy()) {
            let mut forward = DocumentIndex::new();
            for entry in &entries {
                forward.apply(entry);
            }

            let mut backward = DocumentIndex::new();
            for entry in entries.iter().rev() {
                backward.apply(entry);
            }

            prop_assert_eq!(&forward, &backward);
        }

        #[test]
        fn fold_is_idempotent_under_replay(entries in entry_batch_strategy()) {
            let mut once = DocumentIndex::new();
            for entry in &entries {
                once.apply(entry);
            }

            let mut twice = DocumentIndex::new();
            for entry in entries.iter().chain(entries.iter()) {
                twice.apply(entry);
            }

            prop_assert_eq!(&once, &twice);
        }

        #[test]
        fn interleaved_delivery_converges(entries in entry_batch_strategy()) {
            let mut forward = DocumentIndex::new();
            for entry in &entries {
                forward.apply(entry);
            }

            // Odd positions first, then even, approximating two replicas
            // draining each other's logs turn by turn.
            let mut interleaved = DocumentIndex::new();
            for entry in entries.iter().skip(1).step_by(2) {
                interleaved.apply(entry);
            }
            for entry in entries.iter().step_by(2) {
                interleaved.apply(entry);
            }

            prop_assert_eq!(&forward, &interleaved);
        }
    }
}
