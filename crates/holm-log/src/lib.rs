//! Per-replica append-only logs for the Holm document store.
//!
//! Every replica owns exactly one log and is the only writer to it. Entries
//! form a hash chain: each entry's id is the BLAKE3 digest of its body and
//! the previous entry's id, so any tampering or reordering is detectable.
//! Other replicas' logs are replicated verbatim and verified on ingest.
//!
//! # Storage Backends
//!
//! All backends implement the [`LogStore`] trait:
//!
//! - [`InMemoryLogStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileLogStore`] -- one length-and-CRC-framed chain file per author;
//!   a torn final frame (crash mid-write) is detected and truncated on open
//!
//! # Design Rules
//!
//! 1. Entries are immutable once appended; logs only grow.
//! 2. `append` enforces that the entry extends the current head; a stale
//!    `prev_id` is a [`LogError::ConcurrentAppend`] and the caller retries.
//! 3. `entries_since` with an id the store does not know is a
//!    [`LogError::UnknownEntry`]; replication treats that as a chain gap.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod entry;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use entry::{Head, LogEntry, Op};
pub use error::{LogError, LogResult};
pub use file::{FileLogStore, SyncMode};
pub use memory::InMemoryLogStore;
pub use traits::LogStore;
