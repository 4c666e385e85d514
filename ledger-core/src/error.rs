//! Error kinds for the ledger core.
//!
//! Every operation returns an explicit [`Result`]; nothing here is used as
//! exception-style control flow. The transport adaptor performs the single
//! translation to wire-level status codes at its own boundary.

use thiserror::Error;

/// Result type for ledger core operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// All error kinds the ledger core can surface.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// `append`'s payload exceeded `max_payload_bytes`.
    #[error("payload too large: {actual} bytes (max {max})")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        actual: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// `load` rejected a structurally invalid or truncated blob.
    #[error("invalid snapshot format: {0}")]
    InvalidSnapshotFormat(String),

    /// `load` saw a version newer than this codec supports.
    #[error("unsupported snapshot version: {found} (max supported {max_supported})")]
    UnsupportedSnapshotVersion {
        /// Version decoded from the blob.
        found: u32,
        /// Highest version this codec can read.
        max_supported: u32,
    },

    /// `load` was called with `fail_if_exists = true` against a non-empty context.
    #[error("context already exists: {0}")]
    ContextAlreadyExists(String),

    /// `load`'s Merkle root did not match the blob's recorded root.
    #[error("integrity verification failed for context {context_id}: expected root {expected}, computed {computed}")]
    IntegrityVerificationFailed {
        /// Context the load targeted.
        context_id: String,
        /// Root recorded in the blob.
        expected: String,
        /// Root recomputed from the blob's entries.
        computed: String,
    },

    /// An entry's stored `content_hash` does not match its recomputed hash.
    #[error("hash mismatch for entry {entry_id}: stored {stored}, computed {computed}")]
    HashMismatch {
        /// Id of the offending entry.
        entry_id: String,
        /// Hash recorded on the entry.
        stored: String,
        /// Hash recomputed from the entry's semantic fields.
        computed: String,
    },

    /// Merkle proof/verification requested an index outside `[0, n)`.
    #[error("invalid leaf index {index} for {len} leaves")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Number of leaves available.
        len: usize,
    },

    /// `append` transaction could not complete.
    #[error("append failed: {0}")]
    AppendFailed(String),

    /// `get` transaction could not complete.
    #[error("get failed: {0}")]
    GetFailed(String),

    /// `snapshot` transaction could not complete.
    #[error("snapshot failed: {0}")]
    SnapshotFailed(String),

    /// `load` transaction could not complete.
    #[error("load failed: {0}")]
    LoadFailed(String),

    /// Sequence counter read/write failed.
    #[error("sequence operation failed: {0}")]
    SequenceFailed(String),

    /// Lamport clock read/write failed.
    #[error("lamport time operation failed: {0}")]
    LamportTimeFailed(String),

    /// Catch-all for transaction aborts, lock timeouts, and other internal
    /// conditions that are not a caller input error.
    #[error("internal error: {0}")]
    Internal(String),
}
