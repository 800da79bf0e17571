use holm_crypto::chain::ChainError;
use holm_crypto::HashChainVerifier;
use holm_log::LogEntry;
use holm_types::{EntryId, ReplicaId};
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// Verifies fetched chain suffixes before they touch the local log.
pub struct SyncVerifier;

impl SyncVerifier {
    /// Check that `entries` is a valid extension of `author`'s chain on top
    /// of `expected_prev` (the local head).
    ///
    /// Checks, in order: every entry is authored by `author`; the batch
    /// attaches to `expected_prev` and links internally with correct
    /// digests; timestamps strictly increase through the batch, starting
    /// above `prev_timestamp` (the tail timestamp of the chain being
    /// extended, `0` for an empty chain). A batch that does not attach is
    /// [`SyncError::ChainGap`], everything else a fetch could get wrong is
    /// [`SyncError::Verification`]. An empty batch is trivially valid.
    pub fn verify_batch(
        author: &ReplicaId,
        expected_prev: Option<EntryId>,
        prev_timestamp: u64,
        entries: &[LogEntry],
    ) -> SyncResult<()> {
        for entry in entries {
            if entry.author != *author {
                return Err(SyncError::Verification {
                    author: *author,
                    reason: format!("entry {} authored by {}", entry.id, entry.author),
                });
            }
        }

        HashChainVerifier::verify_extension(expected_prev, entries).map_err(|e| match e {
            ChainError::BaseMismatch { expected, actual } => {
                warn!(
                    author = %author.short_id(),
                    "fetched batch does not attach to local head"
                );
                SyncError::ChainGap {
                    author: *author,
                    local_head: expected,
                    batch_prev: actual,
                }
            }
            other => SyncError::Verification {
                author: *author,
                reason: other.to_string(),
            },
        })?;

        let mut last = prev_timestamp;
        for entry in entries {
            if entry.timestamp <= last {
                return Err(SyncError::Verification {
                    author: *author,
                    reason: format!(
                        "timestamp not increasing: {} then {}",
                        last, entry.timestamp
                    ),
                });
            }
            last = entry.timestamp;
        }

        Ok(())
    }
}
