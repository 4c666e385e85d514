//! Versioned snapshot codec.
//!
//! A snapshot is a self-describing, schema-validated envelope — decoded
//! with `serde_json`, never a format that can execute embedded code — that
//! is then lz4-compressed into the opaque blob callers pass around. `lz4`
//! is adopted from the broader example pack for this: the nearest sibling
//! crate writes its own projection snapshots uncompressed to disk and has
//! no compression dependency to generalize from, so this is a pack-
//! enrichment (see DESIGN.md).

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::Entry;
use crate::error::{LedgerError, Result};
use crate::hash::{hash_entry, to_hex, Hash32};
use crate::merkle;

/// Current (highest) snapshot format version this codec produces.
pub const CURRENT_VERSION: u32 = 2;

/// Highest version this codec can read; reading a newer version fails closed.
pub const MAX_SUPPORTED_VERSION: u32 = 2;

/// Opaque, compressed snapshot bytes. Clients must not interpret the
/// contents; they may only pass it back to `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBlob(pub Vec<u8>);

/// Metadata returned alongside a snapshot's blob by `Store::snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Wall-clock time the snapshot was produced, nanoseconds since epoch.
    pub created_at_ns: i128,
    /// Number of entries captured.
    pub entry_count: usize,
    /// Format version written.
    pub version: u32,
    /// Hex-encoded Merkle root over the captured entries' content hashes.
    pub merkle_root: String,
}

/// A successfully decoded snapshot, ready to be written by `Store::load`.
#[derive(Debug, Clone)]
pub struct DecodedSnapshot {
    /// Format version the blob was encoded at.
    pub version: u32,
    /// Context the snapshot was taken from.
    pub source_context_id: String,
    /// Captured entries, in ascending sequence order.
    pub entries: Vec<Entry>,
    /// Sequence counter at capture time.
    pub sequence: u64,
    /// Merkle root recorded in the blob. `None` for legacy v1 snapshots.
    pub merkle_root: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct EnvelopeV2 {
    version: u32,
    context_id: String,
    entries: Vec<Entry>,
    sequence: u64,
    merkle_root: String,
    created_at_ns: i128,
}

#[derive(Serialize, Deserialize)]
struct EnvelopeV1 {
    version: u32,
    context_id: String,
    entries: Vec<Entry>,
    sequence: u64,
}

/// Encodes `entries` (already ordered ascending by sequence) for
/// `context_id` at `sequence` into a compressed v2 blob, and returns the
/// metadata describing it.
pub fn encode(
    context_id: &str,
    entries: &[Entry],
    sequence: u64,
    created_at_ns: i128,
) -> Result<(SnapshotBlob, SnapshotMetadata)> {
    let leaves: Vec<_> = entries.iter().map(entry_leaf_hash).collect();
    let root = merkle::root(&leaves);
    let merkle_root = to_hex(&root);

    let envelope = EnvelopeV2 {
        version: CURRENT_VERSION,
        context_id: context_id.to_string(),
        entries: entries.to_vec(),
        sequence,
        merkle_root: merkle_root.clone(),
        created_at_ns,
    };

    let json = serde_json::to_vec(&envelope)
        .map_err(|e| LedgerError::Internal(format!("snapshot encode failed: {e}")))?;
    let compressed = compress(&json)?;

    Ok((
        SnapshotBlob(compressed),
        SnapshotMetadata {
            created_at_ns,
            entry_count: entries.len(),
            version: CURRENT_VERSION,
            merkle_root,
        },
    ))
}

/// Decodes a blob, validating its version before interpreting its shape.
pub fn decode(blob: &SnapshotBlob) -> Result<DecodedSnapshot> {
    let json = decompress(&blob.0)?;

    let value: Value = serde_json::from_slice(&json)
        .map_err(|e| LedgerError::InvalidSnapshotFormat(format!("not valid JSON: {e}")))?;

    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| LedgerError::InvalidSnapshotFormat("missing version field".to_string()))?
        as u32;

    if version > MAX_SUPPORTED_VERSION {
        return Err(LedgerError::UnsupportedSnapshotVersion {
            found: version,
            max_supported: MAX_SUPPORTED_VERSION,
        });
    }

    match version {
        2 => {
            let envelope: EnvelopeV2 = serde_json::from_value(value).map_err(|e| {
                LedgerError::InvalidSnapshotFormat(format!("malformed v2 envelope: {e}"))
            })?;
            Ok(DecodedSnapshot {
                version,
                source_context_id: envelope.context_id,
                entries: envelope.entries,
                sequence: envelope.sequence,
                merkle_root: Some(envelope.merkle_root),
            })
        }
        1 => {
            let envelope: EnvelopeV1 = serde_json::from_value(value).map_err(|e| {
                LedgerError::InvalidSnapshotFormat(format!("malformed v1 envelope: {e}"))
            })?;
            Ok(DecodedSnapshot {
                version,
                source_context_id: envelope.context_id,
                entries: envelope.entries,
                sequence: envelope.sequence,
                merkle_root: None,
            })
        }
        other => Err(LedgerError::InvalidSnapshotFormat(format!(
            "unknown version {other}"
        ))),
    }
}

/// Recomputes a leaf hash directly from an entry's semantic fields
/// (`context_id`, `key`, `payload`, `sequence`, `appended_at_ns`) rather
/// than trusting the entry's stored `content_hash`. A blob carries whatever
/// bytes a caller hands `load`; leaves built from the stored hash would let
/// a tampered payload slip through alongside a stale, untouched hash field.
fn entry_leaf_hash(e: &Entry) -> Hash32 {
    hash_entry(&e.context_id, &e.key, &e.payload, e.sequence, e.appended_at_ns)
}

/// Recomputes the Merkle root over a decoded snapshot's entries and
/// compares it to the root recorded in the blob. Legacy (v1) snapshots
/// carry no root and are not checked; callers should treat that as "no
/// integrity claim made" and leave those fields null rather than backfill them.
pub fn verify_integrity(decoded: &DecodedSnapshot) -> Result<()> {
    let Some(expected) = &decoded.merkle_root else {
        return Ok(());
    };

    let leaves: Vec<_> = decoded.entries.iter().map(entry_leaf_hash).collect();

    let computed = to_hex(&merkle::root(&leaves));
    if &computed != expected {
        return Err(LedgerError::IntegrityVerificationFailed {
            context_id: decoded.source_context_id.clone(),
            expected: expected.clone(),
            computed,
        });
    }
    Ok(())
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = lz4::EncoderBuilder::new()
        .build(Vec::new())
        .map_err(|e| LedgerError::Internal(format!("lz4 encoder init failed: {e}")))?;
    encoder
        .write_all(data)
        .map_err(|e| LedgerError::Internal(format!("lz4 compression failed: {e}")))?;
    let (buf, result) = encoder.finish();
    result.map_err(|e| LedgerError::Internal(format!("lz4 compression failed: {e}")))?;
    Ok(buf)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = lz4::Decoder::new(data)
        .map_err(|e| LedgerError::InvalidSnapshotFormat(format!("not a valid lz4 blob: {e}")))?;
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| LedgerError::InvalidSnapshotFormat(format!("truncated lz4 blob: {e}")))?;
    Ok(out)
}
