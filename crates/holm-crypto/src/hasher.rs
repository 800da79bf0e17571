use holm_types::Cid;

/// Domain-separated BLAKE3 hasher.
///
/// Every digest starts with a domain tag, so equal bytes hashed in
/// different roles can never collide: a stored payload and entry material
/// with identical content get different digests.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hashes document payloads. The resulting [`Cid`] addresses the
    /// payload in the content store.
    pub const PAYLOAD: Self = Self {
        domain: "holm-payload-v1",
    };

    /// Hashes log entry material. Entry ids run the previous id and the
    /// canonical body through this domain; see
    /// [`crate::chain::HashChainVerifier::compute_id`].
    pub const ENTRY: Self = Self {
        domain: "holm-entry-v1",
    };

    /// Raw 32-byte digest of `domain || ":" || data`.
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Digest `data` into a content id.
    pub fn hash(&self, data: &[u8]) -> Cid {
        Cid::from_hash(self.digest(data))
    }

    /// Whether `data` hashes to `expected` under this domain.
    pub fn verify(&self, data: &[u8], expected: &Cid) -> bool {
        self.hash(data) == *expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        let id1 = ContentHasher::PAYLOAD.hash(data);
        let id2 = ContentHasher::PAYLOAD.hash(data);
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let payload_hash = ContentHasher::PAYLOAD.hash(data);
        let entry_hash = ContentHasher::ENTRY.hash(data);
        assert_ne!(payload_hash, entry_hash);
    }

    #[test]
    fn different_data_produces_different_hashes() {
        let id1 = ContentHasher::PAYLOAD.hash(b"document one");
        let id2 = ContentHasher::PAYLOAD.hash(b"document two");
        assert_ne!(id1, id2);
    }

    #[test]
    fn digest_matches_manual_domain_prefixing() {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"holm-payload-v1:");
        hasher.update(b"data");
        let manual = *hasher.finalize().as_bytes();
        assert_eq!(ContentHasher::PAYLOAD.digest(b"data"), manual);
    }

    #[test]
    fn verify_correct_data() {
        let data = b"test data";
        let id = ContentHasher::PAYLOAD.hash(data);
        assert!(ContentHasher::PAYLOAD.verify(data, &id));
    }

    #[test]
    fn verify_incorrect_data() {
        let id = ContentHasher::PAYLOAD.hash(b"original");
        assert!(!ContentHasher::PAYLOAD.verify(b"tampered", &id));
    }
}
