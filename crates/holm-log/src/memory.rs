use std::collections::HashMap;
use std::sync::RwLock;

use holm_types::{EntryId, ReplicaId};

use crate::entry::LogEntry;
use crate::error::{LogError, LogResult};
use crate::traits::LogStore;

#[derive(Default)]
struct AuthorLog {
    entries: Vec<LogEntry>,
    by_id: HashMap<EntryId, usize>,
}

/// In-memory log store for tests and embedding.
///
/// Logs are held behind a single `RwLock`; the lock's write half is the
/// critical section that makes head-check-then-append atomic.
pub struct InMemoryLogStore {
    logs: RwLock<HashMap<ReplicaId, AuthorLog>>,
}

impl InMemoryLogStore {
    /// Create a new empty log store.
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
        }
    }

    /// Total entries across all logs.
    pub fn total_entries(&self) -> u64 {
        let logs = self.logs.read().expect("lock poisoned");
        logs.values().map(|l| l.entries.len() as u64).sum()
    }
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore for InMemoryLogStore {
    fn append(&self, entry: &LogEntry) -> LogResult<()> {
        let mut logs = self.logs.write().expect("lock poisoned");
        let log = logs.entry(entry.author).or_default();

        let head = log.entries.last().map(|e| e.id);
        if entry.prev_id != head {
            return Err(LogError::ConcurrentAppend {
                author: entry.author,
                expected: head,
                actual: entry.prev_id,
            });
        }
        if !entry.verify_id() {
            return Err(LogError::IntegrityViolation {
                author: entry.author,
                reason: "entry id does not match body".into(),
            });
        }

        log.by_id.insert(entry.id, log.entries.len());
        log.entries.push(entry.clone());
        Ok(())
    }

    fn head(&self, author: &ReplicaId) -> LogResult<Option<EntryId>> {
        let logs = self.logs.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .and_then(|log| log.entries.last())
            .map(|e| e.id))
    }

    fn tail(&self, author: &ReplicaId) -> LogResult<Option<LogEntry>> {
        let logs = self.logs.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .and_then(|log| log.entries.last())
            .cloned())
    }

    fn entries_since(
        &self,
        author: &ReplicaId,
        after: Option<EntryId>,
    ) -> LogResult<Vec<LogEntry>> {
        let logs = self.logs.read().expect("lock poisoned");
        let Some(log) = logs.get(author) else {
            return match after {
                None => Ok(vec![]),
                Some(id) => Err(LogError::UnknownEntry { author: *author, id }),
            };
        };

        match after {
            None => Ok(log.entries.clone()),
            Some(id) => {
                let index = log
                    .by_id
                    .get(&id)
                    .copied()
                    .ok_or(LogError::UnknownEntry { author: *author, id })?;
                Ok(log.entries[index + 1..].to_vec())
            }
        }
    }

    fn read_all(&self, author: &ReplicaId) -> LogResult<Vec<LogEntry>> {
        let logs = self.logs.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .map(|log| log.entries.clone())
            .unwrap_or_default())
    }

    fn authors(&self) -> LogResult<Vec<ReplicaId>> {
        let logs = self.logs.read().expect("lock poisoned");
        let mut authors: Vec<ReplicaId> = logs.keys().copied().collect();
        authors.sort();
        Ok(authors)
    }

    fn len(&self, author: &ReplicaId) -> LogResult<u64> {
        let logs = self.logs.read().expect("lock poisoned");
        Ok(logs.get(author).map(|l| l.entries.len() as u64).unwrap_or(0))
    }

    fn contains(&self, author: &ReplicaId, id: &EntryId) -> LogResult<bool> {
        let logs = self.logs.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .is_some_and(|log| log.by_id.contains_key(id)))
    }
}

impl std::fmt::Debug for InMemoryLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let logs = self.logs.read().expect("lock poisoned");
        f.debug_struct("InMemoryLogStore")
            .field("author_count", &logs.len())
            .finish()
    }
}
