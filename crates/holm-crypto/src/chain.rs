use holm_types::EntryId;

use crate::hasher::ContentHasher;

/// Trait for entries that participate in a hash chain.
pub trait ChainLink {
    /// The entry's own id.
    fn entry_id(&self) -> EntryId;
    /// The previous entry's id (None for the first entry of a log).
    fn prev_id(&self) -> Option<EntryId>;
    /// Canonical body bytes for id verification.
    fn body_bytes(&self) -> Vec<u8>;
}

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of log entries forms a valid hash chain:
/// each entry's prev_id matches the previous entry's id, and each entry's
/// id is correctly computed from its body.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a complete chain starting at its first entry.
    ///
    /// Checks:
    /// 1. First entry has no previous id
    /// 2. Each subsequent entry's prev_id matches the previous entry's id
    /// 3. Each entry's id is correct for its body
    pub fn verify_chain(entries: &[impl ChainLink]) -> Result<(), ChainError> {
        if entries.is_empty() {
            return Ok(());
        }
        if entries[0].prev_id().is_some() {
            return Err(ChainError::FirstEntryHasPrev);
        }
        Self::verify_links(None, entries)
    }

    /// Verify a chain suffix against a known predecessor.
    ///
    /// `base` is the id of the entry the suffix is expected to extend
    /// (None when the suffix starts at the beginning of the log). Used when
    /// ingesting a batch fetched from a remote replica: the batch must link
    /// onto the local head or the fetch missed entries.
    pub fn verify_extension(
        base: Option<EntryId>,
        entries: &[impl ChainLink],
    ) -> Result<(), ChainError> {
        if entries.is_empty() {
            return Ok(());
        }
        if entries[0].prev_id() != base {
            return Err(ChainError::BaseMismatch {
                expected: base,
                actual: entries[0].prev_id(),
            });
        }
        Self::verify_links(base, entries)
    }

    fn verify_links(base: Option<EntryId>, entries: &[impl ChainLink]) -> Result<(), ChainError> {
        let mut prev = base;
        for (i, entry) in entries.iter().enumerate() {
            match (entry.prev_id(), prev) {
                (a, b) if a == b => {}
                (Some(_), Some(_)) | (Some(_), None) => {
                    return Err(ChainError::BrokenLink { index: i })
                }
                (None, Some(_)) => return Err(ChainError::MissingPrev { index: i }),
                (None, None) => unreachable!("equal case handled above"),
            }

            let computed = Self::compute_id(&entry.body_bytes(), prev.as_ref());
            if computed != entry.entry_id() {
                return Err(ChainError::IdMismatch { index: i });
            }
            prev = Some(entry.entry_id());
        }
        Ok(())
    }

    /// Compute the expected id for an entry body and optional previous id.
    ///
    /// The digest runs under [`ContentHasher::ENTRY`]: the previous id
    /// (when present) followed by the body.
    pub fn compute_id(body: &[u8], prev_id: Option<&EntryId>) -> EntryId {
        let mut input = Vec::with_capacity(32 + body.len());
        if let Some(prev) = prev_id {
            input.extend_from_slice(prev.as_bytes());
        }
        input.extend_from_slice(body);
        EntryId::from_hash(ContentHasher::ENTRY.digest(&input))
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first entry has a previous id (should be None)")]
    FirstEntryHasPrev,

    #[error("suffix does not extend expected base: expected {expected:?}, got {actual:?}")]
    BaseMismatch {
        expected: Option<EntryId>,
        actual: Option<EntryId>,
    },

    #[error("broken link at index {index}: prev_id does not match")]
    BrokenLink { index: usize },

    #[error("missing prev_id at index {index} (should reference previous entry)")]
    MissingPrev { index: usize },

    #[error("id mismatch at index {index}: computed id differs from stored")]
    IdMismatch { index: usize },
}
