use std::sync::Arc;

use async_trait::async_trait;
use holm_log::{Head, LogEntry, LogStore};
use holm_store::ContentStore;
use holm_types::{Cid, EntryId, ReplicaId};

use crate::error::SyncResult;
use crate::transport::SyncTransport;

/// In-process transport serving another replica's stores directly.
///
/// The default transport for embedded use and tests: two [`LocalTransport`]s
/// over two replicas' stores replicate through ordinary function calls. A
/// network transport implements the same trait against a wire protocol.
#[derive(Clone)]
pub struct LocalTransport {
    log: Arc<dyn LogStore>,
    store: Arc<dyn ContentStore>,
}

impl LocalTransport {
    pub fn new(log: Arc<dyn LogStore>, store: Arc<dyn ContentStore>) -> Self {
        Self { log, store }
    }
}

#[async_trait]
impl SyncTransport for LocalTransport {
    async fn heads(&self) -> SyncResult<Vec<Head>> {
        Ok(self.log.heads()?)
    }

    async fn entries_after(
        &self,
        author: &ReplicaId,
        after: Option<&EntryId>,
    ) -> SyncResult<Vec<LogEntry>> {
        Ok(self.log.entries_since(author, after.copied())?)
    }

    async fn payload(&self, cid: &Cid) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.store.get(cid)?)
    }
}
