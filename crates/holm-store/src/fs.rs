use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use holm_crypto::ContentHasher;
use holm_types::Cid;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ContentStore, StoreStats};

/// Directory name for quarantined payloads.
const QUARANTINE_DIR: &str = "quarantine";

/// Fanout-directory content store.
///
/// Payloads live under `root/<ab>/<cdef...>` where `ab` is the first two hex
/// characters of the payload's [`Cid`] and the file name is the remaining 62.
/// Writes stage through a uniquely named temp file in the same directory and
/// rename into place, so a crash never leaves a partially written payload at
/// its final path.
///
/// Reads re-verify the digest. A payload whose bytes no longer match its id
/// is moved to `root/quarantine/` and reported as [`StoreError::Corrupt`];
/// all other payloads remain readable.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Create or open a store rooted at the given directory.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root).map_err(|e| {
            StoreError::Unavailable(format!("cannot create {}: {e}", root.display()))
        })?;
        fs::create_dir_all(root.join(QUARANTINE_DIR)).map_err(|e| {
            StoreError::Unavailable(format!("cannot create quarantine dir: {e}"))
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of payloads currently sitting in quarantine.
    pub fn quarantined_count(&self) -> StoreResult<u64> {
        let mut count = 0;
        for entry in fs::read_dir(self.root.join(QUARANTINE_DIR))? {
            if entry?.file_type()?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn blob_path(&self, cid: &Cid) -> PathBuf {
        let hex = cid.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    /// Move a corrupt payload file out of the primary tree.
    ///
    /// Failure to quarantine is logged but not propagated: the caller still
    /// gets the corruption error either way.
    fn quarantine(&self, cid: &Cid, path: &Path) {
        let dest = self.root.join(QUARANTINE_DIR).join(cid.to_hex());
        match fs::rename(path, &dest) {
            Ok(()) => warn!(cid = %cid.short_hex(), "corrupt payload quarantined"),
            Err(e) => warn!(cid = %cid.short_hex(), error = %e, "failed to quarantine corrupt payload"),
        }
    }
}

impl ContentStore for FsContentStore {
    fn put(&self, payload: &[u8]) -> StoreResult<Cid> {
        let cid = ContentHasher::PAYLOAD.hash(payload);
        let path = self.blob_path(&cid);
        // Idempotent: content-addressing guarantees an existing file holds
        // the same bytes.
        if path.exists() {
            return Ok(cid);
        }

        let parent = path.parent().expect("blob path always has a parent");
        fs::create_dir_all(parent)?;

        // Stage under a unique name in the same directory, then rename into
        // place. Concurrent writers of the same payload each stage their own
        // file; whichever persists last replaces identical bytes.
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(payload)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(cid = %cid.short_hex(), len = payload.len(), "payload stored");
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> StoreResult<Option<Vec<u8>>> {
        let path = self.blob_path(cid);
        let payload = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !ContentHasher::PAYLOAD.verify(&payload, cid) {
            self.quarantine(cid, &path);
            return Err(StoreError::Corrupt {
                id: *cid,
                reason: "digest mismatch on read".into(),
            });
        }

        Ok(Some(payload))
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        Ok(self.blob_path(cid).exists())
    }

    fn delete(&self, cid: &Cid) -> StoreResult<bool> {
        match fs::remove_file(self.blob_path(cid)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let mut stats = StoreStats::default();
        for fanout in fs::read_dir(&self.root)? {
            let fanout = fanout?;
            if !fanout.file_type()?.is_dir() {
                continue;
            }
            if fanout.file_name() == QUARANTINE_DIR {
                continue;
            }
            let prefix = fanout.file_name().to_string_lossy().into_owned();
            for entry in fs::read_dir(fanout.path())? {
                let entry = entry?;
                let meta = entry.metadata()?;
                if !meta.is_file() {
                    continue;
                }
                // Staging files from in-flight or crashed writes are not
                // payloads; only names completing the fanout hex count.
                let name = entry.file_name().to_string_lossy().into_owned();
                if Cid::from_hex(&format!("{prefix}{name}")).is_err() {
                    continue;
                }
                stats.payload_count += 1;
                stats.total_bytes += meta.len();
            }
        }
        Ok(stats)
    }

    fn cids(&self) -> StoreResult<Vec<Cid>> {
        let mut cids = Vec::new();
        for fanout in fs::read_dir(&self.root)? {
            let fanout = fanout?;
            if !fanout.file_type()?.is_dir() || fanout.file_name() == QUARANTINE_DIR {
                continue;
            }
            let prefix = fanout.file_name().to_string_lossy().into_owned();
            for entry in fs::read_dir(fanout.path())? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                match Cid::from_hex(&format!("{prefix}{name}")) {
                    Ok(cid) => cids.push(cid),
                    // Temp files and stray names are not payloads.
                    Err(_) => continue,
                }
            }
        }
        Ok(cids)
    }
}

impl std::fmt::Debug for FsContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsContentStore")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};

    #[test]
    fn put_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let cid = store.put(b"hello disk").unwrap();
        let read_back = store.get(&cid).unwrap().expect("should exist");
        assert_eq!(read_back, b"hello disk");
    }

    #[test]
    fn fanout_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let cid = store.put(b"layout").unwrap();
        let hex = cid.to_hex();
        let expected = dir.path().join(&hex[..2]).join(&hex[2..]);
        assert!(expected.is_file());
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let cid1 = store.put(b"repeat").unwrap();
        let cid2 = store.put(b"repeat").unwrap();
        assert_eq!(cid1, cid2);
        assert_eq!(store.stats().unwrap().payload_count, 1);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let cid = {
            let store = FsContentStore::open(dir.path()).unwrap();
            store.put(b"durable").unwrap()
        };

        let store = FsContentStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&cid).unwrap().unwrap(), b"durable");
    }

    #[test]
    fn get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let cid = ContentHasher::PAYLOAD.hash(b"never stored");
        assert!(store.get(&cid).unwrap().is_none());
    }

    #[test]
    fn delete_removes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let cid = store.put(b"to-delete").unwrap();
        assert!(store.delete(&cid).unwrap());
        assert!(!store.has(&cid).unwrap());
        assert!(!store.delete(&cid).unwrap());
    }

    #[test]
    fn corrupt_payload_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let good = store.put(b"good payload").unwrap();
        let bad = store.put(b"soon corrupt").unwrap();

        // Flip one byte of the stored file.
        let hex = bad.to_hex();
        let path = dir.path().join(&hex[..2]).join(&hex[2..]);
        {
            let mut file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .unwrap();
            file.seek(SeekFrom::Start(0)).unwrap();
            file.write_all(b"X").unwrap();
            file.sync_all().unwrap();
        }

        let err = store.get(&bad).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        // The file was moved to quarantine; re-reading reports absence.
        assert_eq!(store.quarantined_count().unwrap(), 1);
        assert!(store.get(&bad).unwrap().is_none());

        // Other payloads are untouched.
        assert_eq!(store.get(&good).unwrap().unwrap(), b"good payload");
    }

    #[test]
    fn stats_count_files_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        store.put(b"12345").unwrap(); // 5 bytes
        store.put(b"123456789").unwrap(); // 9 bytes

        let stats = store.stats().unwrap();
        assert_eq!(stats.payload_count, 2);
        assert_eq!(stats.total_bytes, 14);
    }

    #[test]
    fn cids_lists_stored_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let a = store.put(b"first").unwrap();
        let b = store.put(b"second").unwrap();
        // Stray temp file should not be reported.
        let hex = a.to_hex();
        fs::write(dir.path().join(&hex[..2]).join("leftover.tmp"), b"junk").unwrap();

        let mut cids = store.cids().unwrap();
        cids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(cids, expected);
    }

    #[test]
    fn stats_ignore_leftover_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();

        let cid = store.put(b"real").unwrap();
        let hex = cid.to_hex();
        // Crashed writes leave uniquely named staging files behind.
        fs::write(dir.path().join(&hex[..2]).join(".tmpQh7c2f"), b"junk").unwrap();
        fs::write(dir.path().join(&hex[..2]).join("deadbeef.tmp"), b"junk").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.payload_count, 1);
        assert_eq!(stats.total_bytes, 4);
    }

    #[test]
    fn concurrent_puts_of_one_payload_all_succeed() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsContentStore::open(dir.path()).unwrap());

        // Same payload from several threads at once; each writer stages
        // under its own unique name, so none can lose another's temp file.
        for round in 0..8u8 {
            let payload = vec![round; 64];
            let barrier = Arc::new(Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    let payload = payload.clone();
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        store.put(&payload).unwrap()
                    })
                })
                .collect();

            let cids: Vec<Cid> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert!(cids.windows(2).all(|w| w[0] == w[1]));
            assert_eq!(store.get(&cids[0]).unwrap().unwrap(), payload);
        }
        assert_eq!(store.stats().unwrap().payload_count, 8);
    }
}
