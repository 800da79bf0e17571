//! Cryptographic primitives for the Holm document store.
//!
//! Domain-separated BLAKE3 hashing for payloads and log entries, hash
//! chain verification, and optional Ed25519 entry signing. Everything
//! wraps established libraries; there is no custom cryptography.

pub mod chain;
pub mod hasher;
pub mod signer;

pub use chain::{ChainError, ChainLink, HashChainVerifier};
pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
