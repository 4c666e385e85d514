//! The Entry data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::{from_hex, hash_entry, to_hex};

/// An immutable record representing one append to one context.
///
/// Once committed, no field changes. `content_hash` and `lamport_clock`
/// are `None` only on entries restored from a legacy (v1) snapshot that
/// never carried them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque 128-bit random identifier, hex-encoded.
    pub id: String,
    /// The owning context.
    pub context_id: String,
    /// Categorical tag, e.g. "facts", "intents", "evaluations".
    pub key: String,
    /// Opaque payload bytes; the ledger never interprets this.
    pub payload: Vec<u8>,
    /// Strictly increasing per-context sequence number, starting at 1.
    pub sequence: u64,
    /// Wall-clock capture at creation, nanoseconds since epoch. Informational only.
    pub appended_at_ns: i128,
    /// Bounded string-to-string mapping; not part of the integrity hash.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Per-context logical time; absent only for unconverted legacy-snapshot entries.
    #[serde(default)]
    pub lamport_clock: Option<u64>,
    /// Hex-encoded SHA-256 over the semantic fields; absent only for
    /// unconverted legacy-snapshot entries.
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl Entry {
    /// Generates a fresh opaque id: a v4 UUID, hex-encoded without hyphens.
    pub fn new_id() -> String {
        hex::encode(uuid::Uuid::new_v4().as_bytes())
    }

    /// Recomputes the content hash over this entry's semantic fields.
    pub fn compute_content_hash(&self) -> String {
        let h = hash_entry(
            &self.context_id,
            &self.key,
            &self.payload,
            self.sequence,
            self.appended_at_ns,
        );
        to_hex(&h)
    }

    /// Validates that `content_hash`, if present, matches recomputation.
    ///
    /// Returns `Ok(true)` when the hash matches, `Ok(false)` when it does
    /// not, and `Err` if the stored hash isn't valid hex. Entries without a
    /// stored hash (legacy snapshots) are not checked and return `Ok(true)`.
    pub fn verify_hash(&self) -> Result<bool, hex::FromHexError> {
        match &self.content_hash {
            None => Ok(true),
            Some(stored) => {
                from_hex(stored)?;
                Ok(*stored == self.compute_content_hash())
            }
        }
    }
}

/// Filters for [`crate::store::Store::get`]. All filters are optional and
/// compose with AND.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Restrict to entries with this key (string-equal).
    pub key: Option<String>,
    /// Only entries with sequence strictly greater than this value.
    pub after_sequence: Option<u64>,
    /// Cap the returned count. `None` or `Some(0)` means no cap.
    pub limit: Option<usize>,
}

impl GetOptions {
    /// An unfiltered, uncapped read.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a single key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Only sequences strictly greater than `seq`.
    pub fn after(mut self, seq: u64) -> Self {
        self.after_sequence = Some(seq);
        self
    }

    /// Cap the returned count.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entry {
        Entry {
            id: Entry::new_id(),
            context_id: "ctx".into(),
            key: "facts".into(),
            payload: b"p1".to_vec(),
            sequence: 1,
            appended_at_ns: 1000,
            metadata: BTreeMap::new(),
            lamport_clock: Some(1),
            content_hash: None,
        }
    }

    #[test]
    fn new_id_is_32_hex_chars() {
        let id = Entry::new_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn verify_hash_passes_without_stored_hash() {
        let e = sample();
        assert!(e.verify_hash().unwrap());
    }

    #[test]
    fn verify_hash_detects_tamper() {
        let mut e = sample();
        e.content_hash = Some(e.compute_content_hash());
        assert!(e.verify_hash().unwrap());

        e.payload = b"tampered".to_vec();
        assert!(!e.verify_hash().unwrap());
    }
}
