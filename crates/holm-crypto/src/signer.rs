//! Replica signing keys.
//!
//! Signatures cover entry ids, never raw messages. An id already commits
//! to the entry body and to the whole chain prefix, so one signature over
//! it binds both the content and the position.

use std::fmt;

use ed25519_dalek::{Signer, Verifier};
use holm_types::{EntryId, ReplicaId, ReplicaMaterial};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A signature that did not check out.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("signature does not verify for entry {entry}")]
pub struct SignatureError {
    /// The entry id the signature was checked against.
    pub entry: EntryId,
}

/// Private half of a replica identity.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a fresh key from the system RNG.
    pub fn generate() -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Rebuild a key from the 32 secret bytes of a replica key file.
    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(&secret),
        }
    }

    /// The 32 secret bytes, for persisting to a replica key file.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.inner.as_bytes()
    }

    /// Public half of this key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// The replica identity this key signs for.
    pub fn replica_id(&self) -> ReplicaId {
        self.verifying_key().replica_id()
    }

    /// Sign an entry id.
    pub fn sign_entry(&self, entry: &EntryId) -> Signature {
        Signature(self.inner.sign(entry.as_bytes()))
    }
}

/// Public half of a replica identity.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// The replica identity derived from this key.
    ///
    /// The derivation commits to the public key bytes, so one replica id
    /// names exactly one key.
    pub fn replica_id(&self) -> ReplicaId {
        ReplicaId::derive(&ReplicaMaterial::PublicKey(self.inner.to_bytes()))
    }

    /// Check a signature over an entry id.
    pub fn verify_entry(
        &self,
        entry: &EntryId,
        signature: &Signature,
    ) -> Result<(), SignatureError> {
        self.inner
            .verify(entry.as_bytes(), &signature.0)
            .map_err(|_| SignatureError { entry: *entry })
    }
}

/// Detached Ed25519 signature over an entry id.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

// On the wire a signature is its 64 raw bytes, in every format.
impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <Vec<u8>>::deserialize(deserializer)?;
        let raw: [u8; 64] = raw
            .try_into()
            .map_err(|_| D::Error::custom("signature must be 64 bytes"))?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&raw)))
    }
}

// Secret material stays out of logs; the replica id is safe to show.
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({})", self.replica_id())
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", self.replica_id())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0.to_bytes()[..6]))
    }
}
