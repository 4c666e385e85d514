//! # Converge Ledger — core
//!
//! The append-only storage engine and its adjacent integrity and
//! subscription machinery. This crate is never authoritative: it durably
//! remembers the ordered history an external engine produces, exposes that
//! history for retrieval and live observation, and supports snapshot/restore
//! so execution can migrate between processes or nodes. It never validates
//! payload semantics, resolves write conflicts, or coordinates writers.
//!
//! ## Layout
//! - [`hash`] — SHA-256 primitives and canonical entry framing.
//! - [`merkle`] — root computation and inclusion proofs over leaf hashes.
//! - [`lamport`] — per-context logical clock.
//! - [`entry`] — the `Entry` record and `get` filter options.
//! - [`tables`] — in-memory Entries/Sequences/Lamport tables.
//! - [`store`] — the transactional facade: append, get, snapshot, load.
//! - [`snapshot`] — the versioned, compressed snapshot codec.
//! - [`watch`] — per-context subscription fan-out with filtered delivery.
//! - [`error`] — the error kinds every operation can surface.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod entry;
pub mod error;
pub mod hash;
pub mod lamport;
pub mod merkle;
pub mod snapshot;
pub mod store;
pub mod tables;
pub mod watch;

pub use entry::{Entry, GetOptions};
pub use error::{LedgerError, Result};
pub use lamport::LamportClock;
pub use snapshot::{SnapshotBlob, SnapshotMetadata};
pub use store::{LoadOptions, Store};
pub use watch::WatchRegistry;
