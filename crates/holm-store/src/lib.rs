//! Content-addressed payload storage for the Holm document store.
//!
//! This crate implements a hash-keyed payload store analogous to git's
//! `.git/objects/` directory. Every document payload is stored as an
//! immutable blob identified by its BLAKE3 hash (domain-separated, see
//! `holm-crypto`). Identical payloads are stored once.
//!
//! # Storage Backends
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - [`InMemoryContentStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsContentStore`] -- fanout-directory store (`ab/cdef...`), one file
//!   per payload, written via temp-file-then-rename
//!
//! # Design Rules
//!
//! 1. Payloads are immutable once written (content-addressing guarantees this).
//! 2. Every read re-verifies the digest; corrupt payloads are quarantined,
//!    never returned.
//! 3. Concurrent reads are always safe (payloads are immutable).
//! 4. The store never interprets payload contents -- it is a pure blob store.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::FsContentStore;
pub use memory::InMemoryContentStore;
pub use traits::{ContentStore, StoreStats};
