//! Foundation types for the Holm document store.
//!
//! This crate provides the identity and ordering primitives used throughout
//! the Holm system. Every other Holm crate depends on `holm-types`.
//!
//! # Key Types
//!
//! - [`Cid`] — Content identifier: BLAKE3 digest naming an immutable payload
//! - [`EntryId`] — Digest identifying one log entry and binding it into a chain
//! - [`ReplicaId`] — Persistent identity of one authoring replica
//! - [`LamportClock`] — Logical clock producing the timestamps the merge
//!   rule orders writes by

pub mod cid;
pub mod clock;
pub mod error;
pub mod replica;

pub use cid::{Cid, EntryId};
pub use clock::LamportClock;
pub use error::TypeError;
pub use replica::{ReplicaId, ReplicaMaterial};
