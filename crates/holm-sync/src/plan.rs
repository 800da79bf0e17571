use std::collections::HashMap;

use holm_log::Head;
use holm_types::{EntryId, ReplicaId};
use serde::{Deserialize, Serialize};

/// One author's chain suffix to fetch from a remote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSpec {
    /// Whose chain to fetch.
    pub author: ReplicaId,
    /// Resume point: the local head, `None` to fetch from the root.
    pub after: Option<EntryId>,
    /// Local chain length at planning time.
    pub local_len: u64,
    /// Chain length the remote advertised.
    pub remote_len: u64,
}

impl FetchSpec {
    /// Entries the remote claims beyond the local chain.
    pub fn expected(&self) -> u64 {
        self.remote_len.saturating_sub(self.local_len)
    }
}

/// Pull planning: compares head advertisements to decide what to fetch.
pub struct SyncPlanner;

impl SyncPlanner {
    /// Authors where the remote is ahead of (or unknown to) the local side.
    ///
    /// Equal-length chains are never fetched; with append-only logs and one
    /// writer per chain, equal length means equal content once verified.
    pub fn plan_pull(local: &[Head], remote: &[Head]) -> Vec<FetchSpec> {
        let ours: HashMap<ReplicaId, &Head> = local.iter().map(|h| (h.author, h)).collect();

        let mut specs = Vec::new();
        for theirs in remote {
            let (after, local_len) = match ours.get(&theirs.author) {
                Some(head) => (head.entry, head.len),
                None => (None, 0),
            };
            if theirs.len > local_len {
                specs.push(FetchSpec {
                    author: theirs.author,
                    after,
                    local_len,
                    remote_len: theirs.len,
                });
            }
        }
        specs
    }
}
