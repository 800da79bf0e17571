//! The database facade tying the layers together.
//!
//! A [`Database`] owns one replica identity, a content store, a log store,
//! and the in-memory document index folded from every chain. All mutation
//! goes through the local author's chain; remote state arrives only via
//! [`Database::sync_with`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use holm_crypto::{SigningKey, VerifyingKey};
use holm_index::DocumentIndex;
use holm_log::{FileLogStore, InMemoryLogStore, LogEntry, LogError, LogStore, Op, SyncMode};
use holm_store::{ContentStore, FsContentStore, InMemoryContentStore, StoreError};
use holm_sync::{LocalTransport, SyncError, SyncPlanner, SyncTransport, SyncVerifier};
use holm_types::{Cid, EntryId, LamportClock, ReplicaId};
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::identity;
use crate::types::{DbStats, Document, GcReport, PutResult, SyncReport, VerifyReport};

/// Payload directory inside a database directory.
const BLOBS_DIR: &str = "blobs";

/// Chain-file directory inside a database directory.
const CHAINS_DIR: &str = "chains";

/// Replica identity file inside a database directory.
const REPLICA_KEY_FILE: &str = "replica.key";

/// First retry delay for a contended append, in milliseconds.
const BACKOFF_BASE_MS: u64 = 10;

/// Retry delay ceiling, in milliseconds (before jitter).
const BACKOFF_CAP_MS: u64 = 250;

/// Tunables for a [`Database`].
#[derive(Clone, Copy, Debug)]
pub struct DbOptions {
    /// Upper bound on one document or sync operation.
    pub op_timeout: Duration,
    /// Chain-file durability mode.
    pub sync_mode: SyncMode,
    /// Retries for a contended local append before giving up.
    pub append_retries: u32,
    /// Sign new entries with the replica key.
    pub sign_entries: bool,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(5),
            sync_mode: SyncMode::default(),
            append_retries: 4,
            sign_entries: true,
        }
    }
}

/// Embedded document database: one replica of a multi-writer store.
///
/// Writes append to this replica's own chain and never touch other chains;
/// reads serve from the index folded over all chains. Two databases that
/// have seen the same set of entries hold the same documents, whatever
/// order the entries arrived in.
pub struct Database {
    options: DbOptions,
    key: SigningKey,
    author: ReplicaId,
    clock: LamportClock,
    store: Arc<dyn ContentStore>,
    log: Arc<dyn LogStore>,
    index: RwLock<DocumentIndex>,
    /// Serializes appends per author: local writes against each other, and
    /// each remote chain's ingest against itself.
    guards: Mutex<HashMap<ReplicaId, Arc<tokio::sync::Mutex<()>>>>,
    /// Document and sync operations hold the read half across their critical
    /// sections; gc and verify quiesce the database with the write half.
    fence: tokio::sync::RwLock<()>,
}

impl Database {
    /// Open (or create) a database directory with default options.
    pub fn open(dir: &Path) -> DbResult<Self> {
        Self::open_with(dir, DbOptions::default())
    }

    /// Open (or create) a database directory.
    ///
    /// Layout: `blobs/` holds payloads, `chains/` one append-only file per
    /// author, `replica.key` the identity. The index is rebuilt by replaying
    /// the chains and the Lamport clock resumes past the highest timestamp
    /// on record.
    pub fn open_with(dir: &Path, options: DbOptions) -> DbResult<Self> {
        fs::create_dir_all(dir)?;
        let key = identity::load_or_create(&dir.join(REPLICA_KEY_FILE))?;
        let store: Arc<dyn ContentStore> = Arc::new(FsContentStore::open(&dir.join(BLOBS_DIR))?);
        let log: Arc<dyn LogStore> =
            Arc::new(FileLogStore::open(&dir.join(CHAINS_DIR), options.sync_mode)?);

        let (index, entries, max_timestamp) = fold_logs(log.as_ref())?;
        let author = key.replica_id();
        info!(
            author = %author.short_id(),
            entries,
            documents = index.len(),
            "database opened"
        );

        Ok(Self {
            options,
            key,
            author,
            clock: LamportClock::resume(max_timestamp),
            store,
            log,
            index: RwLock::new(index),
            guards: Mutex::new(HashMap::new()),
            fence: tokio::sync::RwLock::new(()),
        })
    }

    /// Fully in-memory database with a throwaway identity, for tests and
    /// short-lived embedding.
    pub fn in_memory() -> Self {
        Self::in_memory_with(DbOptions::default())
    }

    pub fn in_memory_with(options: DbOptions) -> Self {
        let key = SigningKey::generate();
        let author = key.replica_id();
        Self {
            options,
            key,
            author,
            clock: LamportClock::new(),
            store: Arc::new(InMemoryContentStore::new()),
            log: Arc::new(InMemoryLogStore::new()),
            index: RwLock::new(DocumentIndex::new()),
            guards: Mutex::new(HashMap::new()),
            fence: tokio::sync::RwLock::new(()),
        }
    }

    // ---- Document operations ----

    /// Store a payload under `key`, generating a fresh key when none is
    /// given, and record the write on this replica's chain.
    pub async fn put(&self, key: Option<String>, value: &[u8]) -> DbResult<PutResult> {
        self.bounded(async {
            let _ops = self.fence.read().await;
            let key = match key {
                Some(key) => key,
                None => generated_key(),
            };
            let guard = self.author_guard(&self.author);
            let _guard = guard.lock().await;

            let store = Arc::clone(&self.store);
            let payload = value.to_vec();
            let cid = run_blocking(move || Ok(store.put(&payload)?)).await?;
            let entry = self
                .append_local(Op::Put {
                    key: key.clone(),
                    payload: cid,
                })
                .await?;
            self.index.write().expect("lock poisoned").apply(&entry);

            debug!(key = %key, cid = %cid.short_hex(), "document written");
            Ok(PutResult {
                key,
                cid,
                entry: entry.id,
            })
        })
        .await
    }

    /// The live document under `key`, or `None`.
    pub async fn get(&self, key: &str) -> DbResult<Option<Document>> {
        self.bounded(async {
            let _ops = self.fence.read().await;
            let cid = {
                let index = self.index.read().expect("lock poisoned");
                match index.get(key).and_then(|slot| slot.payload) {
                    Some(cid) => cid,
                    None => return Ok(None),
                }
            };
            let value = self.store.get(&cid)?.ok_or(StoreError::NotFound(cid))?;
            Ok(Some(Document {
                key: key.to_string(),
                cid,
                value,
            }))
        })
        .await
    }

    /// Fetch a payload directly by content id, bypassing the index.
    ///
    /// Serves any payload the store holds, including superseded document
    /// versions still referenced by the logs.
    pub async fn get_by_cid(&self, cid: &Cid) -> DbResult<Option<Vec<u8>>> {
        self.bounded(async {
            let _ops = self.fence.read().await;
            Ok(self.store.get(cid)?)
        })
        .await
    }

    /// Every live document, in key order.
    pub async fn all(&self) -> DbResult<Vec<Document>> {
        self.bounded(async {
            let _ops = self.fence.read().await;
            let live: Vec<(String, Cid)> = {
                let index = self.index.read().expect("lock poisoned");
                index
                    .all()
                    .filter_map(|(key, slot)| slot.payload.map(|cid| (key.to_string(), cid)))
                    .collect()
            };

            let mut documents = Vec::with_capacity(live.len());
            for (key, cid) in live {
                let value = self.store.get(&cid)?.ok_or(StoreError::NotFound(cid))?;
                documents.push(Document { key, cid, value });
            }
            Ok(documents)
        })
        .await
    }

    /// Tombstone `key` on this replica's chain.
    ///
    /// Returns [`DbError::NotFound`] when the key is not live here; deleting
    /// blind would spray tombstones for keys that never existed.
    pub async fn delete(&self, key: &str) -> DbResult<EntryId> {
        self.bounded(async {
            let _ops = self.fence.read().await;
            let guard = self.author_guard(&self.author);
            let _guard = guard.lock().await;

            let live = {
                let index = self.index.read().expect("lock poisoned");
                index.get(key).is_some()
            };
            if !live {
                return Err(DbError::NotFound(key.to_string()));
            }

            let entry = self
                .append_local(Op::Delete {
                    key: key.to_string(),
                })
                .await?;
            self.index.write().expect("lock poisoned").apply(&entry);

            debug!(key = %key, "document tombstoned");
            Ok(entry.id)
        })
        .await
    }

    // ---- Replication ----

    /// Pull every chain the remote is ahead on, verifying and ingesting the
    /// suffixes.
    ///
    /// Payloads referenced by fetched entries are copied and digest-checked
    /// before any entry is appended, so the index never points at a payload
    /// the store does not hold. A batch that fails to attach to the local
    /// chain triggers a refetch of that author's full chain; the local
    /// prefix must then match entry for entry, and only the surplus suffix
    /// is ingested.
    pub async fn sync_with(&self, remote: &dyn SyncTransport) -> DbResult<SyncReport> {
        self.bounded(async {
            let _ops = self.fence.read().await;
            let local = self.log.heads()?;
            let remote_heads = remote.heads().await?;
            let plan = SyncPlanner::plan_pull(&local, &remote_heads);

            let mut report = SyncReport::default();
            for spec in plan {
                debug!(
                    author = %spec.author.short_id(),
                    expected = spec.expected(),
                    "pulling chain suffix"
                );
                self.pull_author(remote, &spec.author, &mut report).await?;
            }

            info!(
                authors = report.authors_updated,
                entries = report.entries_ingested,
                payloads = report.payloads_fetched,
                "sync finished"
            );
            Ok(report)
        })
        .await
    }

    /// A [`SyncTransport`] serving this database's logs and payloads, for
    /// same-process replication and tests.
    pub fn as_transport(&self) -> LocalTransport {
        LocalTransport::new(Arc::clone(&self.log), Arc::clone(&self.store))
    }

    async fn pull_author(
        &self,
        remote: &dyn SyncTransport,
        author: &ReplicaId,
        report: &mut SyncReport,
    ) -> DbResult<()> {
        let guard = self.author_guard(author);
        let _guard = guard.lock().await;

        // The plan was drawn before this guard was held; re-read the tail in
        // case another pull advanced the chain. Its timestamp seeds batch
        // verification, so a suffix cannot slip below the local chain.
        let local_tail = self.log.tail(author)?;
        let local_head = local_tail.as_ref().map(|e| e.id);
        let local_ts = local_tail.as_ref().map_or(0, |e| e.timestamp);

        let batch = match remote.entries_after(author, local_head.as_ref()).await {
            Ok(batch) => batch,
            // The remote does not know our head: it was rebuilt, or the
            // chains diverged. Fall back to a full fetch.
            Err(SyncError::Log(LogError::UnknownEntry { .. })) => {
                return self.resync_author(remote, author, report).await;
            }
            Err(e) => return Err(e.into()),
        };
        if batch.is_empty() {
            return Ok(());
        }

        match SyncVerifier::verify_batch(author, local_head, local_ts, &batch) {
            Ok(()) => self.ingest_batch(remote, author, &batch, report).await,
            Err(SyncError::ChainGap { .. }) => self.resync_author(remote, author, report).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Refetch an author's chain from the root after a gap.
    async fn resync_author(
        &self,
        remote: &dyn SyncTransport,
        author: &ReplicaId,
        report: &mut SyncReport,
    ) -> DbResult<()> {
        warn!(author = %author.short_id(), "refetching full chain after gap");
        let full = remote.entries_after(author, None).await?;
        SyncVerifier::verify_batch(author, None, 0, &full)?;

        // The fetched chain must extend what we already hold; a mismatched
        // prefix is a fork, which replication does not resolve.
        let local = self.log.read_all(author)?;
        if full.len() < local.len() {
            return Err(SyncError::Verification {
                author: *author,
                reason: "remote chain is shorter than local".into(),
            }
            .into());
        }
        for (ours, theirs) in local.iter().zip(full.iter()) {
            if ours.id != theirs.id {
                return Err(SyncError::Verification {
                    author: *author,
                    reason: format!("chains diverge at entry {}", ours.id),
                }
                .into());
            }
        }

        let suffix = &full[local.len()..];
        if suffix.is_empty() {
            return Ok(());
        }
        report.gaps_recovered += 1;
        self.ingest_batch(remote, author, suffix, report).await
    }

    /// Copy payloads, then append entries and fold them into the index.
    async fn ingest_batch(
        &self,
        remote: &dyn SyncTransport,
        author: &ReplicaId,
        batch: &[LogEntry],
        report: &mut SyncReport,
    ) -> DbResult<()> {
        for entry in batch {
            let Some(cid) = entry.op.payload() else {
                continue;
            };
            if self.store.has(cid)? {
                continue;
            }
            let payload =
                remote
                    .payload(cid)
                    .await?
                    .ok_or_else(|| SyncError::Verification {
                        author: *author,
                        reason: format!("remote is missing payload {cid}"),
                    })?;
            let store = Arc::clone(&self.store);
            let expected = *cid;
            let stored = run_blocking(move || Ok(store.put(&payload)?)).await?;
            if stored != expected {
                return Err(SyncError::Verification {
                    author: *author,
                    reason: format!("payload digest mismatch for {expected}"),
                }
                .into());
            }
            report.payloads_fetched += 1;
        }

        // Appends run as one batch on the blocking pool; the index lock is
        // taken only afterwards, for the entries that landed.
        let log = Arc::clone(&self.log);
        let entries = batch.to_vec();
        let (appended, failure) = run_blocking(move || {
            let mut appended = Vec::with_capacity(entries.len());
            let mut failure = None;
            for entry in entries {
                if let Err(e) = log.append(&entry) {
                    failure = Some(e);
                    break;
                }
                appended.push(entry);
            }
            Ok((appended, failure))
        })
        .await?;

        {
            let mut index = self.index.write().expect("lock poisoned");
            for entry in &appended {
                self.clock.observe(entry.timestamp);
                index.apply(entry);
                report.entries_ingested += 1;
            }
        }
        if let Some(e) = failure {
            return Err(e.into());
        }
        report.authors_updated += 1;
        debug!(author = %author.short_id(), entries = batch.len(), "chain suffix ingested");
        Ok(())
    }

    // ---- Maintenance ----

    /// Re-verify everything: chain links and ids, local signatures, the
    /// index against a fresh replay, and payload presence for live
    /// documents.
    ///
    /// Quiesces the database while it runs and is not subject to
    /// [`DbOptions::op_timeout`].
    pub async fn verify(&self) -> DbResult<VerifyReport> {
        let _fence = self.fence.write().await;
        let mut report = VerifyReport::default();
        let verifying_key = self.key.verifying_key();

        for author in self.log.authors()? {
            report.authors_checked += 1;
            let entries = self.log.read_all(&author)?;

            match self.log.verify_chain(&author) {
                Ok(()) => report.entries_checked += entries.len() as u64,
                Err(e) => report.violations.push(e.to_string()),
            }

            // Remote public keys are not stored, so signatures can only be
            // checked for the local author.
            if author == self.author {
                for entry in &entries {
                    if entry.signature.is_none() {
                        continue;
                    }
                    if entry.verify_signature(&verifying_key) {
                        report.signatures_checked += 1;
                    } else {
                        report
                            .violations
                            .push(format!("bad signature on entry {}", entry.id));
                    }
                }
            }
        }

        let (replayed, _, _) = fold_logs(self.log.as_ref())?;
        {
            let index = self.index.read().expect("lock poisoned");
            if *index != replayed {
                report
                    .violations
                    .push("index does not match log replay".to_string());
            }
            for (key, slot) in index.all() {
                let Some(cid) = slot.payload else {
                    continue;
                };
                if !self.store.has(&cid)? {
                    report
                        .violations
                        .push(format!("payload {cid} for key {key} is missing"));
                }
            }
        }

        if report.is_valid() {
            debug!(
                authors = report.authors_checked,
                entries = report.entries_checked,
                "verification clean"
            );
        } else {
            warn!(
                violations = report.violations.len(),
                "verification found problems"
            );
        }
        Ok(report)
    }

    /// Delete payloads no log entry references.
    ///
    /// Payloads of superseded document versions are retained: the logs still
    /// reference them, and peers pulling a full chain fetch every payload it
    /// names. Swept payloads are strays from writes that stored bytes but
    /// never landed an entry. Quiesces the database while it runs.
    pub async fn gc(&self) -> DbResult<GcReport> {
        // Every write holds the fence from payload store to log append, so
        // acquiring the write half means no payload is awaiting its entry.
        let _fence = self.fence.write().await;

        let log = Arc::clone(&self.log);
        let store = Arc::clone(&self.store);
        let report = run_blocking(move || {
            let mut referenced: HashSet<Cid> = HashSet::new();
            for author in log.authors()? {
                for entry in log.read_all(&author)? {
                    if let Some(cid) = entry.op.payload() {
                        referenced.insert(*cid);
                    }
                }
            }

            let mut report = GcReport::default();
            for cid in store.cids()? {
                if referenced.contains(&cid) {
                    report.retained += 1;
                } else {
                    store.delete(&cid)?;
                    report.swept += 1;
                }
            }
            Ok(report)
        })
        .await?;

        info!(
            swept = report.swept,
            retained = report.retained,
            "gc finished"
        );
        Ok(report)
    }

    /// Current contents as counters.
    pub async fn stats(&self) -> DbResult<DbStats> {
        let _ops = self.fence.read().await;
        let store = self.store.stats()?;
        let authors = self.log.authors()?;
        let mut entries = 0u64;
        for author in &authors {
            entries += self.log.len(author)?;
        }
        let (documents, tombstones) = {
            let index = self.index.read().expect("lock poisoned");
            (index.len() as u64, index.tombstone_count() as u64)
        };
        Ok(DbStats {
            documents,
            tombstones,
            payloads: store.payload_count,
            payload_bytes: store.total_bytes,
            authors: authors.len() as u64,
            entries,
            clock: self.clock.current(),
        })
    }

    /// Drop tombstoned slots from the index, returning how many went.
    ///
    /// See [`DocumentIndex::compact`] for when this is safe: a replica that
    /// has not seen a tombstone yet can resurrect the key afterwards.
    pub async fn compact(&self) -> DbResult<usize> {
        let _ops = self.fence.read().await;
        Ok(self.index.write().expect("lock poisoned").compact())
    }

    /// Flush chain files. Call before dropping a database whose options
    /// rely on OS buffering.
    pub fn close(&self) -> DbResult<()> {
        self.log.flush()?;
        info!(author = %self.author.short_id(), "database closed");
        Ok(())
    }

    // ---- Accessors ----

    /// This replica's id.
    pub fn author(&self) -> ReplicaId {
        self.author
    }

    /// Public half of the replica key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// The options the database was opened with.
    pub fn options(&self) -> &DbOptions {
        &self.options
    }

    /// Direct handle to the content store.
    pub fn content_store(&self) -> Arc<dyn ContentStore> {
        Arc::clone(&self.store)
    }

    /// Direct handle to the log store.
    pub fn log_store(&self) -> Arc<dyn LogStore> {
        Arc::clone(&self.log)
    }

    // ---- Internals ----

    /// Run `fut` under the operation timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = DbResult<T>>) -> DbResult<T> {
        match tokio::time::timeout(self.options.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DbError::Timeout(self.options.op_timeout)),
        }
    }

    fn author_guard(&self, author: &ReplicaId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guards = self.guards.lock().expect("lock poisoned");
        Arc::clone(guards.entry(*author).or_default())
    }

    /// Append one operation to the local chain, retrying contended appends
    /// with jittered backoff.
    async fn append_local(&self, op: Op) -> DbResult<LogEntry> {
        let mut attempt = 0u32;
        loop {
            let head = self.log.head(&self.author)?;
            let mut entry = LogEntry::create(head, self.clock.tick(), self.author, op.clone());
            if self.options.sign_entries {
                entry = entry.signed(&self.key);
            }
            match self.append_blocking(entry.clone()).await {
                Ok(()) => return Ok(entry),
                Err(DbError::Log(LogError::ConcurrentAppend { .. }))
                    if attempt < self.options.append_retries =>
                {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "local append contended, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run one append on the blocking pool; chain files may fsync here.
    async fn append_blocking(&self, entry: LogEntry) -> DbResult<()> {
        let log = Arc::clone(&self.log);
        run_blocking(move || Ok(log.append(&entry)?)).await
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("author", &self.author)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Replay every chain into a fresh index.
///
/// Returns the index plus the entry count and highest timestamp seen; the
/// open path resumes the Lamport clock from the latter.
fn fold_logs(log: &dyn LogStore) -> DbResult<(DocumentIndex, u64, u64)> {
    let mut index = DocumentIndex::new();
    let mut entries = 0u64;
    let mut max_timestamp = 0u64;
    for author in log.authors()? {
        for entry in log.read_all(&author)? {
            max_timestamp = max_timestamp.max(entry.timestamp);
            index.apply(&entry);
            entries += 1;
        }
    }
    Ok((index, entries, max_timestamp))
}

/// Fresh key for documents stored without one. UUIDv7 keeps generated keys
/// roughly time-ordered in the index.
fn generated_key() -> String {
    Uuid::now_v7().to_string()
}

/// Run a blocking storage call on the dedicated blocking pool.
///
/// Chain appends may fsync and blob writes hit the filesystem; off the
/// executor, timers ([`DbOptions::op_timeout`] included) keep firing while
/// a disk write stalls.
async fn run_blocking<T, F>(f: F) -> DbResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DbResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(DbError::Io(io::Error::new(io::ErrorKind::Other, e))),
    }
}

/// Exponential backoff with random jitter, capped at [`BACKOFF_CAP_MS`].
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1 << attempt.min(6));
    let capped = exp.min(BACKOFF_CAP_MS);
    // Thread-local RNG, created and dropped here so calling futures stay
    // `Send`.
    let jitter = rand::thread_rng().gen_range(0..=capped / 2);
    Duration::from_millis(capped + jitter)
}
