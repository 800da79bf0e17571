//! Embedded database facade for the Holm document store.
//!
//! [`Database`] composes the lower layers into a document API: payloads go
//! to the content store, every write lands on this replica's hash-chained
//! log, and reads serve from a last-writer-wins index folded over all
//! replicated logs. Replication is pull-based over [`SyncTransport`]
//! implementations.
//!
//! # Key Types
//!
//! - [`Database`] -- the facade: open a directory or run in memory
//! - [`DbOptions`] -- tunables: timeout, durability, append retries, signing
//! - [`Document`] / [`PutResult`] -- read and write results
//! - [`SyncReport`] / [`GcReport`] / [`DbStats`] / [`VerifyReport`] --
//!   counters from replication and maintenance
//! - [`DbError`] -- unified error over the store, log, and sync layers
//!
//! # On-Disk Layout
//!
//! ```text
//! <dir>/
//!   replica.key          32-byte Ed25519 secret (the replica identity)
//!   blobs/               content-addressed payloads, fanout directories
//!   blobs/quarantine/    payloads that failed digest verification
//!   chains/<author>.chain  one framed append-only log per author
//! ```
//!
//! [`SyncTransport`]: holm_sync::SyncTransport

pub mod database;
pub mod error;
pub mod identity;
pub mod types;

// Re-export primary types at crate root for ergonomic imports.
pub use database::{Database, DbOptions};
pub use error::{DbError, DbResult};
pub use types::{DbStats, Document, GcReport, PutResult, SyncReport, VerifyReport};

// Re-exported so embedders can configure durability without depending on
// the log crate directly.
pub use holm_log::SyncMode;
