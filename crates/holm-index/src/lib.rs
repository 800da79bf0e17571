//! Document index for the Holm document store.
//!
//! Maps each document key to the log entry that currently wins it, under a
//! deterministic last-writer-wins rule keyed on `(timestamp, author)`. The
//! index is a cache over the replica logs: it can be dropped and rebuilt by
//! replaying them, in any order, and always converges to the same state.
//!
//! # Key Types
//!
//! - [`DocumentIndex`] -- The in-memory key-to-winner map (BTreeMap-backed)
//! - [`IndexSlot`] -- The winning write for one key, live or tombstoned

pub mod index;
pub mod slot;

pub use index::DocumentIndex;
pub use slot::IndexSlot;
