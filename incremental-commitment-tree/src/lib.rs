//! Fixed-depth incremental Merkle tree for shielded note commitments.
//!
//! The tree is append-only and stores only its frontier: a leaf pair plus one
//! optional subtree root per level. Memory stays at `O(depth)` however many
//! leaves have been appended. Membership of an individual leaf is proven with
//! a [`Witness`], which is created right after the leaf is appended and then
//! advanced with every later leaf.
//!
//! # Core types
//!
//! - [`CommitmentTree`]: the frontier (append, root, is_complete, codec).
//! - [`Witness`]: incremental witness for one leaf (append, root, path,
//!   codec).
//! - [`MerklePath`]: authentication path consumed by a membership verifier.
//! - [`Hashable`] / [`HashSer`]: digest capability and fixed-size encoding.
//! - [`Blake3Node`]: the shipped digest.

mod error;
mod hash;
mod path;
pub(crate) mod serialization;
mod tree;
mod witness;

#[cfg(test)]
pub(crate) mod test_utils;
#[cfg(test)]
mod tests;

pub use error::CommitmentTreeError;
pub use hash::{Blake3Node, EmptyRoots, HashSer, Hashable};
pub use path::MerklePath;
pub use tree::CommitmentTree;
pub use witness::Witness;

/// Depth of the note commitment tree used on the ledger.
pub const NOTE_COMMITMENT_TREE_DEPTH: u8 = 20;

/// Shallow depth used by tests and tooling that want to exercise capacity.
pub const TESTING_TREE_DEPTH: u8 = 4;

/// The ledger note commitment tree.
pub type NoteCommitmentTree = CommitmentTree<Blake3Node, NOTE_COMMITMENT_TREE_DEPTH>;

/// Witness into a [`NoteCommitmentTree`].
pub type NoteWitness = Witness<Blake3Node, NOTE_COMMITMENT_TREE_DEPTH>;

/// Depth-4 tree for tests.
pub type TestingCommitmentTree = CommitmentTree<Blake3Node, TESTING_TREE_DEPTH>;

/// Witness into a [`TestingCommitmentTree`].
pub type TestingWitness = Witness<Blake3Node, TESTING_TREE_DEPTH>;
