//! Index slot types describing the winning write for a document key.

use holm_log::LogEntry;
use holm_types::{Cid, EntryId, ReplicaId};
use serde::{Deserialize, Serialize};

/// The winning write for one document key.
///
/// A slot keeps enough of its source entry to rerun the merge decision
/// against any later candidate: `(timestamp, author)` is the merge key,
/// `entry` points back into the author's log, and `payload` addresses the
/// document bytes in the content store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSlot {
    /// Payload of the winning `Put`; `None` for tombstones.
    pub payload: Option<Cid>,
    /// Id of the log entry that installed this slot.
    pub entry: EntryId,
    /// Lamport timestamp of the winning entry.
    pub timestamp: u64,
    /// Author of the winning entry; breaks ties between equal timestamps.
    pub author: ReplicaId,
    /// Whether the key is deleted.
    pub tombstoned: bool,
}

impl IndexSlot {
    /// The slot a log entry would install for its key.
    pub fn from_entry(entry: &LogEntry) -> Self {
        Self {
            payload: entry.op.payload().copied(),
            entry: entry.id,
            timestamp: entry.timestamp,
            author: entry.author,
            tombstoned: entry.op.is_delete(),
        }
    }

    /// The `(timestamp, author)` pair this slot won with.
    pub fn merge_key(&self) -> (u64, ReplicaId) {
        (self.timestamp, self.author)
    }

    /// Returns `true` when the slot binds a live document.
    pub fn is_live(&self) -> bool {
        !self.tombstoned
    }
}
