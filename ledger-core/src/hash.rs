//! Pure SHA-256 utilities and canonical entry serialization.
//!
//! Nothing here can fail; these are framing and digest functions only.

use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest.
pub type Hash32 = [u8; 32];

/// Raw SHA-256 over `bytes`.
pub fn hash(bytes: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// The Merkle internal-node combine rule: `hash(left || right)`.
pub fn combine(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(left);
    buf.extend_from_slice(right);
    hash(&buf)
}

/// Appends `field` to `out`, prefixed with its length as a big-endian `u64`.
///
/// Length-prefixing makes the concatenation self-delimiting: no two distinct
/// field sequences can serialize to the same byte string, which is what
/// makes [`hash_entry`] collision-sensitive to any single field.
fn push_framed(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u64).to_be_bytes());
    out.extend_from_slice(field);
}

/// Computes the content hash over an entry's semantic fields.
///
/// The hash input is deliberately bounded to `{context_id, key, payload,
/// sequence, appended_at_ns}` — `metadata`, `id`, `lamport_clock`, and
/// `content_hash` itself are excluded.
pub fn hash_entry(
    context_id: &str,
    key: &str,
    payload: &[u8],
    sequence: u64,
    appended_at_ns: i128,
) -> Hash32 {
    let mut buf = Vec::with_capacity(
        8 + context_id.len() + 8 + key.len() + 8 + payload.len() + 8 + 16,
    );
    push_framed(&mut buf, context_id.as_bytes());
    push_framed(&mut buf, key.as_bytes());
    push_framed(&mut buf, payload);
    push_framed(&mut buf, &sequence.to_be_bytes());
    push_framed(&mut buf, &appended_at_ns.to_be_bytes());
    hash(&buf)
}

/// Hex-encodes a digest for wire/storage representation.
pub fn to_hex(h: &Hash32) -> String {
    hex::encode(h)
}

/// Decodes a hex digest back to raw bytes.
pub fn from_hex(s: &str) -> Result<Hash32, hex::FromHexError> {
    let bytes = hex::decode(s)?;
    bytes
        .try_into()
        .map_err(|_| hex::FromHexError::InvalidStringLength)
}
