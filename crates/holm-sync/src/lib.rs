//! Replication interface for the Holm document store.
//!
//! Replicas exchange per-author chain suffixes: a puller compares head
//! advertisements, fetches the entries it is missing, and verifies every
//! batch before it touches the local log: attachment to the local tail,
//! internal linkage, entry digests, and authorship.
//!
//! The transport is pluggable. [`LocalTransport`] serves another replica's
//! stores in-process for tests and embedding; anything that can answer the
//! three [`SyncTransport`] requests can stand in for it.

pub mod error;
pub mod local;
pub mod plan;
pub mod transport;
pub mod verifier;

pub use error::{SyncError, SyncResult};
pub use local::LocalTransport;
pub use plan::{FetchSpec, SyncPlanner};
pub use transport::SyncTransport;
pub use verifier::SyncVerifier;
