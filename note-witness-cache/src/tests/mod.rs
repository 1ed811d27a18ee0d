
use incremental_commitment_tree::{
    Blake3Node, NoteCommitmentTree, TESTING_TREE_DEPTH, TestingCommitmentTree,
};
use tracing_subscriber::EnvFilter;

use crate::{
    BlockCommitment, ConnectedBlock, NoteOutPoint, NoteWitnessCache, WitnessCache,
    WitnessCacheConfig,
};

pub(crate) type TestingCache = WitnessCache<Blake3Node, TESTING_TREE_DEPTH>;

/// Route cache logs to the test output; set `RUST_LOG` to see them.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a deterministic test leaf from an index.
pub(crate) fn test_leaf(index: u64) -> Blake3Node {
    Blake3Node::from_commitment(&index.to_le_bytes())
}

/// Deterministic outpoint.
pub(crate) fn outpoint(n: u8) -> NoteOutPoint {
    NoteOutPoint::new([n; 32], u32::from(n) % 3)
}

/// Block at `height` holding `foreign` leaves, then one leaf per owned note.
pub(crate) fn block(
    height: u64,
    first_leaf: u64,
    foreign: u64,
    owned: &[NoteOutPoint],
) -> ConnectedBlock<Blake3Node> {
    let mut block = ConnectedBlock::new(height);
    let mut next = first_leaf;
    for _ in 0..foreign {
        block = block.with_commitment(BlockCommitment::foreign(test_leaf(next)));
        next += 1;
    }
    for note in owned {
        block = block.with_commitment(BlockCommitment::owned(test_leaf(next), *note));
        next += 1;
    }
    block
}

pub(crate) fn new_cache(retained_depth: usize) -> NoteWitnessCache {
    init_tracing();
    NoteWitnessCache::new(WitnessCacheConfig::new(retained_depth).unwrap())
}

pub(crate) fn new_testing_cache(retained_depth: usize) -> TestingCache {
    init_tracing();
    TestingCache::new(WitnessCacheConfig::new(retained_depth).unwrap())
}

pub(crate) fn new_tree() -> NoteCommitmentTree {
    NoteCommitmentTree::new()
}

pub(crate) fn new_testing_tree() -> TestingCommitmentTree {
    TestingCommitmentTree::new()
}
