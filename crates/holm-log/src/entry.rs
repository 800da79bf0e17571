use holm_crypto::chain::ChainLink;
use holm_crypto::{HashChainVerifier, Signature, SigningKey, VerifyingKey};
use holm_types::{Cid, EntryId, ReplicaId};
use serde::{Deserialize, Serialize};

/// A single operation recorded in a replica's log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Bind a key to a payload stored in the content store.
    Put { key: String, payload: Cid },
    /// Tombstone a key. The binding is removed but the tombstone itself
    /// persists, so a late-arriving older `Put` cannot resurrect the key.
    Delete { key: String },
}

impl Op {
    /// The document key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            Op::Put { key, .. } => key,
            Op::Delete { key } => key,
        }
    }

    /// The payload id, for `Put` operations.
    pub fn payload(&self) -> Option<&Cid> {
        match self {
            Op::Put { payload, .. } => Some(payload),
            Op::Delete { .. } => None,
        }
    }

    /// Returns `true` for tombstone operations.
    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete { .. })
    }
}

/// One entry of a replica's append-only log.
///
/// The `id` is the BLAKE3 digest of the entry's canonical body bytes with
/// the previous entry's id folded in, which chains entries together: editing
/// any field of any entry changes its id and breaks every later link.
///
/// `timestamp` is a Lamport clock value, not wall-clock time. Together with
/// `author` it forms the merge key used by the document index: the pair is
/// unique across all replicas because an author never reuses a timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Chain id of this entry.
    pub id: EntryId,
    /// Id of the preceding entry in the same log (None for the first).
    pub prev_id: Option<EntryId>,
    /// Lamport timestamp assigned by the author.
    pub timestamp: u64,
    /// The replica that wrote this entry.
    pub author: ReplicaId,
    /// The recorded operation.
    pub op: Op,
    /// Optional Ed25519 signature over the entry id.
    pub signature: Option<Signature>,
}

impl LogEntry {
    /// Build a new entry extending `prev_id`, computing its chain id.
    pub fn create(prev_id: Option<EntryId>, timestamp: u64, author: ReplicaId, op: Op) -> Self {
        let body = encode_body(timestamp, &author, &op);
        let id = HashChainVerifier::compute_id(&body, prev_id.as_ref());
        Self {
            id,
            prev_id,
            timestamp,
            author,
            op,
            signature: None,
        }
    }

    /// Attach a signature over the entry id.
    ///
    /// The id already commits to every field and to the whole chain prefix,
    /// so signing it covers the entry's full context.
    pub fn signed(mut self, key: &SigningKey) -> Self {
        self.signature = Some(key.sign_entry(&self.id));
        self
    }

    /// Recompute the id from the entry's fields and compare with the stored
    /// one. Returns `false` if any field was tampered with.
    pub fn verify_id(&self) -> bool {
        let body = encode_body(self.timestamp, &self.author, &self.op);
        HashChainVerifier::compute_id(&body, self.prev_id.as_ref()) == self.id
    }

    /// Verify the entry's signature against the given public key.
    ///
    /// Returns `false` when the entry is unsigned or the signature does not
    /// check out.
    pub fn verify_signature(&self, key: &VerifyingKey) -> bool {
        match &self.signature {
            Some(sig) => key.verify_entry(&self.id, sig).is_ok(),
            None => false,
        }
    }

    /// The `(timestamp, author)` pair used by the document index to decide
    /// which of two concurrent writes wins. Lexicographic comparison;
    /// strictly-greater wins.
    pub fn merge_key(&self) -> (u64, ReplicaId) {
        (self.timestamp, self.author)
    }
}

impl ChainLink for LogEntry {
    fn entry_id(&self) -> EntryId {
        self.id
    }

    fn prev_id(&self) -> Option<EntryId> {
        self.prev_id
    }

    fn body_bytes(&self) -> Vec<u8> {
        encode_body(self.timestamp, &self.author, &self.op)
    }
}

/// Canonical byte encoding of the hashed entry fields.
///
/// Fixed hand-rolled layout rather than serde output, so entry ids stay
/// stable across serializer upgrades:
///
/// ```text
/// [timestamp: u64 LE] [author: 32 bytes] [op tag: 1 byte]
/// [key len: u32 LE] [key bytes] [payload cid: 32 bytes, Put only]
/// ```
fn encode_body(timestamp: u64, author: &ReplicaId, op: &Op) -> Vec<u8> {
    let mut buf = Vec::with_capacity(77 + op.key().len());
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(author.as_bytes());
    match op {
        Op::Put { key, payload } => {
            buf.push(0);
            buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(payload.as_bytes());
        }
        Op::Delete { key } => {
            buf.push(1);
            buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
            buf.extend_from_slice(key.as_bytes());
        }
    }
    buf
}

/// Advertised position of one replica's log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    /// The log's author.
    pub author: ReplicaId,
    /// Id of the latest entry (None for an empty log).
    pub entry: Option<EntryId>,
    /// Number of entries in the log.
    pub len: u64,
}
