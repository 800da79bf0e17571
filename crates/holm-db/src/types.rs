use holm_types::{Cid, EntryId};
use serde::Serialize;

/// A document read back from the database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// Key the document is filed under.
    pub key: String,
    /// Content id of the payload.
    pub cid: Cid,
    /// The payload bytes.
    pub value: Vec<u8>,
}

/// Outcome of a successful write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutResult {
    /// Key the document was filed under (generated when the caller passed
    /// none).
    pub key: String,
    /// Content id of the stored payload.
    pub cid: Cid,
    /// Id of the log entry recording the write.
    pub entry: EntryId,
}

/// Counters from one pull round against a remote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Authors whose chains advanced locally.
    pub authors_updated: u64,
    /// Log entries appended.
    pub entries_ingested: u64,
    /// Payloads copied from the remote.
    pub payloads_fetched: u64,
    /// Authors recovered via a full refetch after a chain gap.
    pub gaps_recovered: u64,
}

/// Counters from a garbage-collection pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    /// Payloads deleted because no log entry references them.
    pub swept: u64,
    /// Payloads kept.
    pub retained: u64,
}

/// Point-in-time snapshot of database contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    /// Live documents in the index.
    pub documents: u64,
    /// Tombstoned keys awaiting compaction.
    pub tombstones: u64,
    /// Payloads in the content store.
    pub payloads: u64,
    /// Total payload bytes stored.
    pub payload_bytes: u64,
    /// Replicas with a local chain.
    pub authors: u64,
    /// Log entries across all chains.
    pub entries: u64,
    /// Current Lamport clock value.
    pub clock: u64,
}

/// Findings from a full integrity verification.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Chains walked.
    pub authors_checked: u64,
    /// Entries whose ids and links verified.
    pub entries_checked: u64,
    /// Entry signatures verified (local author only; remote public keys are
    /// not stored).
    pub signatures_checked: u64,
    /// Human-readable descriptions of every problem found.
    pub violations: Vec<String>,
}

impl VerifyReport {
    /// `true` when no violations were found.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}
