use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use holm_types::{EntryId, ReplicaId};
use tracing::{debug, warn};

use crate::entry::LogEntry;
use crate::error::{LogError, LogResult};
use crate::traits::LogStore;

/// Frame header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// File extension for chain files.
const CHAIN_EXT: &str = "chain";

/// Flush/sync strategy for chain files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::OsDefault
    }
}

/// One author's loaded chain plus its open file handle.
struct AuthorChain {
    entries: Vec<LogEntry>,
    by_id: HashMap<EntryId, usize>,
    file: File,
}

/// Chain-file log store: one append-only file per author.
///
/// Each log lives at `dir/<author-hex>.chain`. Entries are serialized with
/// bincode and framed with a length prefix and CRC32 checksum:
///
/// ```text
/// [4 bytes: entry length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogEntry)]
/// ```
///
/// On open each file is read front-to-back. The first frame that is torn,
/// fails its CRC, or does not decode marks the end of the valid prefix; the
/// file is truncated there, so a crash mid-append never leaves a partial
/// entry visible. Entries are mirrored in memory, making reads lock-and-clone
/// rather than disk I/O.
pub struct FileLogStore {
    dir: PathBuf,
    sync_mode: SyncMode,
    inner: RwLock<HashMap<ReplicaId, AuthorChain>>,
}

impl FileLogStore {
    /// Open (or create) a log store in the given directory, loading every
    /// `*.chain` file found there.
    pub fn open(dir: &Path, sync_mode: SyncMode) -> LogResult<Self> {
        fs::create_dir_all(dir)?;

        let mut logs = HashMap::new();
        for dirent in fs::read_dir(dir)? {
            let path = dirent?.path();
            if path.extension().map_or(true, |ext| ext != CHAIN_EXT) {
                continue;
            }
            let author = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| ReplicaId::from_hex(s).ok());
            let Some(author) = author else {
                warn!(path = %path.display(), "skipping chain file with unrecognized name");
                continue;
            };
            let chain = load_chain(&path, &author)?;
            logs.insert(author, chain);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            sync_mode,
            inner: RwLock::new(logs),
        })
    }

    /// Directory holding the chain files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chain_path(dir: &Path, author: &ReplicaId) -> PathBuf {
        dir.join(format!("{}.{CHAIN_EXT}", author.to_hex()))
    }
}

impl LogStore for FileLogStore {
    fn append(&self, entry: &LogEntry) -> LogResult<()> {
        let mut logs = self.inner.write().expect("lock poisoned");
        let chain = match logs.entry(entry.author) {
            MapEntry::Occupied(o) => o.into_mut(),
            MapEntry::Vacant(v) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(Self::chain_path(&self.dir, &entry.author))?;
                v.insert(AuthorChain {
                    entries: Vec::new(),
                    by_id: HashMap::new(),
                    file,
                })
            }
        };

        let head = chain.entries.last().map(|e| e.id);
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

        let payload =
            bincode::serialize(entry).map_err(|e| LogError::Serialization(e.to_string()))?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        // Single write, then the in-memory mirror. A failure between the two
        // leaves at most a partial frame on disk, which the next open
        // truncates away.
        chain.file.write_all(&frame)?;
        if matches!(self.sync_mode, SyncMode::EveryWrite) {
            chain.file.sync_all()?;
        }

        chain.by_id.insert(entry.id, chain.entries.len());
        chain.entries.push(entry.clone());

        debug!(author = %entry.author.short_id(), timestamp = entry.timestamp, "chain append");
        Ok(())
    }

    fn head(&self, author: &ReplicaId) -> LogResult<Option<EntryId>> {
        let logs = self.inner.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .and_then(|chain| chain.entries.last())
            .map(|e| e.id))
    }

    fn tail(&self, author: &ReplicaId) -> LogResult<Option<LogEntry>> {
        let logs = self.inner.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .and_then(|chain| chain.entries.last())
            .cloned())
    }

    fn entries_since(
        &self,
        author: &ReplicaId,
        after: Option<EntryId>,
    ) -> LogResult<Vec<LogEntry>> {
        let logs = self.inner.read().expect("lock poisoned");
        let Some(chain) = logs.get(author) else {
            return match after {
                None => Ok(vec![]),
                Some(id) => Err(LogError::UnknownEntry { author: *author, id }),
            };
        };

        match after {
            None => Ok(chain.entries.clone()),
            Some(id) => {
                let index = chain
                    .by_id
                    .get(&id)
                    .copied()
                    .ok_or(LogError::UnknownEntry { author: *author, id })?;
                Ok(chain.entries[index + 1..].to_vec())
            }
        }
    }

    fn read_all(&self, author: &ReplicaId) -> LogResult<Vec<LogEntry>> {
        let logs = self.inner.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .map(|chain| chain.entries.clone())
            .unwrap_or_default())
    }

    fn authors(&self) -> LogResult<Vec<ReplicaId>> {
        let logs = self.inner.read().expect("lock poisoned");
        let mut authors: Vec<ReplicaId> = logs.keys().copied().collect();
        authors.sort();
        Ok(authors)
    }

    fn len(&self, author: &ReplicaId) -> LogResult<u64> {
        let logs = self.inner.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .map(|chain| chain.entries.len() as u64)
            .unwrap_or(0))
    }

    fn contains(&self, author: &ReplicaId, id: &EntryId) -> LogResult<bool> {
        let logs = self.inner.read().expect("lock poisoned");
        Ok(logs
            .get(author)
            .is_some_and(|chain| chain.by_id.contains_key(id)))
    }

    fn flush(&self) -> LogResult<()> {
        let logs = self.inner.read().expect("lock poisoned");
        for chain in logs.values() {
            chain.file.sync_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLogStore")
            .field("dir", &self.dir)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}

/// Read a chain file front-to-back, truncating everything from the first
/// invalid frame onwards.
fn load_chain(path: &Path, author: &ReplicaId) -> LogResult<AuthorChain> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    let mut entries = Vec::new();
    let mut by_id = HashMap::new();
    let mut offset: usize = 0;
    let mut valid_end: usize = 0;

    while offset + HEADER_SIZE <= data.len() {
        let length = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let expected_crc = u32::from_le_bytes([
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ]);

        let start = offset + HEADER_SIZE;
        let end = start + length;
        if length == 0 || end > data.len() {
            warn!(offset, length, "torn chain frame");
            break;
        }

        let payload = &data[start..end];
        if crc32fast::hash(payload) != expected_crc {
            warn!(offset, "chain frame CRC mismatch");
            break;
        }

        let entry: LogEntry = match bincode::deserialize(payload) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(offset, error = %e, "undecodable chain frame");
                break;
            }
        };

        by_id.insert(entry.id, entries.len());
        entries.push(entry);
        offset = end;
        valid_end = end;
    }

    // Drop the invalid tail. Frames after a bad one cannot be trusted even
    // if their own CRCs pass: the chain linkage through the bad frame is
    // gone, and the author will re-append from the surviving head.
    if valid_end < data.len() {
        file.set_len(valid_end as u64)?;
        warn!(
            path = %path.display(),
            dropped = data.len() - valid_end,
            "truncated invalid chain tail"
        );
    }

    debug!(author = %author.short_id(), entries = entries.len(), "chain loaded");
    Ok(AuthorChain {
        entries,
        by_id,
        file,
    })
}
