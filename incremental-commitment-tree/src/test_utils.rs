//! Shared test utilities for the commitment tree crate.

use crate::{Blake3Node, Hashable, MerklePath};

/// Create a deterministic test leaf from an index.
pub fn test_leaf(index: u64) -> Blake3Node {
    Blake3Node::from_commitment(&index.to_le_bytes())
}

/// Root of a depth-`depth` tree holding `leaves`, computed by plain recursion
/// over the full leaf array padded with empty leaves.
pub fn reference_root(leaves: &[Blake3Node], depth: usize) -> Blake3Node {
    let mut level: Vec<Blake3Node> = (0..1usize << depth)
        .map(|i| leaves.get(i).copied().unwrap_or_else(Blake3Node::empty_leaf))
        .collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| Blake3Node::combine(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

/// Authentication path for `leaves[position]` in a depth-`depth` tree,
/// computed from the full leaf array.
pub fn reference_path(
    leaves: &[Blake3Node],
    depth: usize,
    position: usize,
) -> MerklePath<Blake3Node> {
    let mut level: Vec<Blake3Node> = (0..1usize << depth)
        .map(|i| leaves.get(i).copied().unwrap_or_else(Blake3Node::empty_leaf))
        .collect();
    let mut index = position;
    let mut auth_path = Vec::with_capacity(depth);
    let mut position_bits = Vec::with_capacity(depth);
    for _ in 0..depth {
        auth_path.push(level[index ^ 1]);
        position_bits.push(index & 1 == 1);
        level = level
            .chunks(2)
            .map(|pair| Blake3Node::combine(&pair[0], &pair[1]))
            .collect();
        index >>= 1;
    }
    auth_path.reverse();
    position_bits.reverse();
    MerklePath::from_parts(auth_path, position_bits).expect("lengths match")
}
