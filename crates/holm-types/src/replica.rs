use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Material used to derive a [`ReplicaId`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaMaterial {
    /// Derived from an ed25519 public key (32 bytes). Used when the replica
    /// holds a signing key; the id then commits to that key.
    PublicKey([u8; 32]),
    /// Derived from a raw 32-byte seed. Used for unsigned replicas.
    Seed([u8; 32]),
}

/// Stable identity of one replica's append log.
///
/// A `ReplicaId` is derived deterministically from [`ReplicaMaterial`] using
/// BLAKE3. The same material always produces the same identity, so a replica
/// that persists its key material keeps its log identity across restarts.
/// Every log entry carries the id of the replica that authored it, and the
/// merge tie-break orders by `(timestamp, author)` — which is why the id
/// implements `Ord`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId {
    hash: [u8; 32],
}

impl ReplicaId {
    /// Derive a `ReplicaId` from replica material.
    pub fn derive(material: &ReplicaMaterial) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"holm-replica-v1:");
        match material {
            ReplicaMaterial::PublicKey(pk) => {
                hasher.update(b"pubkey:");
                hasher.update(pk);
            }
            ReplicaMaterial::Seed(seed) => {
                hasher.update(b"seed:");
                hasher.update(seed);
            }
        }
        Self {
            hash: *hasher.finalize().as_bytes(),
        }
    }

    /// Create an ephemeral (random) ReplicaId for tests and demos.
    pub fn ephemeral() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self::derive(&ReplicaMaterial::Seed(bytes))
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("r:{}", hex::encode(&self.hash[..4]))
    }

    /// Parse from a hex string (64 hex characters).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("r:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self { hash: arr })
    }

    /// Create from a raw 32-byte hash. Use `derive()` for production code.
    pub fn from_raw(hash: [u8; 32]) -> Self {
        Self { hash }
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicaId({})", self.short_id())
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let material = ReplicaMaterial::Seed([42u8; 32]);
        let id1 = ReplicaId::derive(&material);
        let id2 = ReplicaId::derive(&material);
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_material_produces_different_ids() {
        let id1 = ReplicaId::derive(&ReplicaMaterial::Seed([1; 32]));
        let id2 = ReplicaId::derive(&ReplicaMaterial::Seed([2; 32]));
        assert_ne!(id1, id2);
    }

    #[test]
    fn different_material_types_produce_different_ids() {
        let bytes = [7u8; 32];
        let seed = ReplicaId::derive(&ReplicaMaterial::Seed(bytes));
        let pubkey = ReplicaId::derive(&ReplicaMaterial::PublicKey(bytes));
        assert_ne!(seed, pubkey);
    }

    #[test]
    fn ephemeral_ids_are_unique() {
        let id1 = ReplicaId::ephemeral();
        let id2 = ReplicaId::ephemeral();
        assert_ne!(id1, id2);
    }

    #[test]
    fn short_id_format() {
        let id = ReplicaId::derive(&ReplicaMaterial::Seed([0; 32]));
        let short = id.short_id();
        assert!(short.starts_with("r:"));
        assert_eq!(short.len(), 10); // "r:" + 8 hex chars
    }

    #[test]
    fn hex_roundtrip() {
        let id = ReplicaId::derive(&ReplicaMaterial::Seed([99; 32]));
        let hex = id.to_hex();
        let parsed = ReplicaId::from_hex(&hex).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn hex_roundtrip_with_prefix() {
        let id = ReplicaId::derive(&ReplicaMaterial::Seed([99; 32]));
        let prefixed = format!("r:{}", id.to_hex());
        let parsed = ReplicaId::from_hex(&prefixed).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_roundtrip() {
        let id = ReplicaId::derive(&ReplicaMaterial::PublicKey([10; 32]));
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ReplicaId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ordering_is_consistent() {
        let id1 = ReplicaId::from_raw([0; 32]);
        let id2 = ReplicaId::from_raw([1; 32]);
        assert!(id1 < id2);
    }
}
