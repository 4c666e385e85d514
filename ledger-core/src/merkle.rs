//! Merkle root computation and inclusion proofs over an ordered leaf list.
//!
//! Builds on a single `hash_merkle(left, right)` combine primitive to form
//! a full bottom-up tree with Bitcoin-style odd-trailing duplication and
//! index-addressed inclusion proofs.

use crate::error::{LedgerError, Result};
use crate::hash::{combine, hash, Hash32};

/// Which side of the current node a proof step's sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Side {
    /// Sibling is to the left: next = combine(sibling, current).
    Left,
    /// Sibling is to the right: next = combine(current, sibling).
    Right,
}

/// One step of an inclusion proof: a sibling hash and which side it sits on.
pub type ProofStep = (Side, Hash32);

/// Computes the Merkle root over an ordered list of leaf hashes.
///
/// - Empty list: `hash("")`.
/// - Single leaf: `combine(leaf, leaf)` (self-paired).
/// - Otherwise: pair adjacent hashes bottom-up, duplicating a trailing odd
///   element, until one node remains.
pub fn root(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return hash(b"");
    }
    if leaves.len() == 1 {
        return combine(&leaves[0], &leaves[0]);
    }

    let mut level: Vec<Hash32> = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

fn next_level(level: &[Hash32]) -> Vec<Hash32> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0;
    while i < level.len() {
        let left = level[i];
        let right = if i + 1 < level.len() {
            level[i + 1]
        } else {
            level[i]
        };
        next.push(combine(&left, &right));
        i += 2;
    }
    next
}

/// Generates an inclusion proof for leaf `index` in a list of `n` leaves.
///
/// Returns steps ordered from the leaf level to the root. Odd-trailing
/// duplication applies identically to proof construction: a duplicated
/// sibling is still emitted as a proof step (its hash equals the current
/// node's), keeping verification uniform.
pub fn prove(leaves: &[Hash32], index: usize) -> Result<Vec<ProofStep>> {
    let n = leaves.len();
    if index >= n {
        return Err(LedgerError::InvalidIndex { index, len: n });
    }
    if n == 1 {
        // Self-paired root: the sole proof step is the leaf paired with itself.
        return Ok(vec![(Side::Right, leaves[0])]);
    }

    let mut steps = Vec::new();
    let mut level: Vec<Hash32> = leaves.to_vec();
    let mut idx = index;

    while level.len() > 1 {
        let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        let sibling = if sibling_idx < level.len() {
            level[sibling_idx]
        } else {
            level[idx]
        };
        let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
        steps.push((side, sibling));

        level = next_level(&level);
        idx /= 2;
    }

    Ok(steps)
}

/// Verifies that `leaf` at the position implied by `proof` folds to `expected_root`.
pub fn verify(leaf: &Hash32, proof: &[ProofStep], expected_root: &Hash32) -> bool {
    let mut current = *leaf;
    for (side, sibling) in proof {
        current = match side {
            Side::Left => combine(sibling, &current),
            Side::Right => combine(&current, sibling),
        };
    }
    &current == expected_root
}

/// Proof size never exceeds `ceil(log2(n)) + 1` steps.
pub fn max_proof_len(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    (usize::BITS - (n - 1).leading_zeros()) as usize + 1
}
