//! Forward-advancing membership witness for one leaf.
//!
//! A witness stores the tree exactly as it was right after its leaf was
//! appended, and then records only what later appends contribute to the
//! leaf's authentication path. Every later append lands in the leftmost empty
//! slot of that snapshot. Those slots are filled one at a time, lowest first:
//! a slot at level 0 is filled by a single leaf, a slot at level `d` by a
//! complete subtree of `2^d` leaves, accumulated in `cursor` until it is
//! complete and then pushed to `filled`.

use std::io::{Read, Write};

use integer_encoding::{VarIntReader, VarIntWriter};

use crate::{
    CommitmentTreeError,
    hash::{HashSer, Hashable},
    path::MerklePath,
    serialization::{malformed_input, read_presence, write_presence},
    tree::CommitmentTree,
};

/// Incremental witness for the leaf most recently appended to `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness<H, const DEPTH: u8> {
    snapshot: CommitmentTree<H, DEPTH>,
    filled: Vec<H>,
    cursor: Option<CommitmentTree<H, DEPTH>>,
    // Always `snapshot.next_depth(filled.len())`.
    cursor_depth: usize,
}

impl<H: Hashable, const DEPTH: u8> Witness<H, DEPTH> {
    /// Start witnessing the most recently appended leaf of `tree`.
    pub fn from_tree(tree: CommitmentTree<H, DEPTH>) -> Result<Self, CommitmentTreeError> {
        if tree.is_empty() {
            return Err(CommitmentTreeError::EmptyTree);
        }
        let cursor_depth = tree.next_depth(0);
        Ok(Self {
            snapshot: tree,
            filled: Vec::new(),
            cursor: None,
            cursor_depth,
        })
    }

    /// Tree state at the moment the witnessed leaf was appended.
    pub fn snapshot(&self) -> &CommitmentTree<H, DEPTH> {
        &self.snapshot
    }

    /// The witnessed leaf. Always `Some` for a constructed witness.
    pub fn element(&self) -> Option<&H> {
        self.snapshot.last()
    }

    /// Leaf index of the witnessed leaf.
    pub fn position(&self) -> u64 {
        self.snapshot.size().saturating_sub(1)
    }

    /// Number of leaves in the global tree this witness has caught up with.
    pub fn tree_size(&self) -> u64 {
        let filled_leaves: u64 = (0..self.filled.len())
            .map(|i| 1u64 << self.snapshot.next_depth(i))
            .sum();
        let cursor_leaves = self.cursor.as_ref().map_or(0, CommitmentTree::size);
        self.snapshot.size() + filled_leaves + cursor_leaves
    }

    /// Advance the witness by one leaf appended to the global tree after the
    /// witnessed leaf.
    ///
    /// Returns [`CommitmentTreeError::CapacityExceeded`] if the global tree
    /// would overflow. The witness is unchanged on error.
    pub fn append(&mut self, leaf: H) -> Result<(), CommitmentTreeError> {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.append(leaf)?;
            if cursor.is_complete(self.cursor_depth) {
                let subtree_root = cursor.root_at(self.cursor_depth, Vec::new());
                self.push_filled(subtree_root);
            }
            return Ok(());
        }

        if self.cursor_depth >= DEPTH as usize {
            return Err(CommitmentTreeError::CapacityExceeded {
                capacity: self.snapshot.capacity(),
            });
        }
        if self.cursor_depth == 0 {
            self.push_filled(leaf);
        } else {
            let mut cursor = CommitmentTree::new();
            cursor.append(leaf)?;
            self.cursor = Some(cursor);
        }
        Ok(())
    }

    /// Record a completed slot and move on to the next empty one.
    fn push_filled(&mut self, hash: H) {
        self.filled.push(hash);
        self.cursor = None;
        self.cursor_depth = self.snapshot.next_depth(self.filled.len());
    }

    /// Root of the global tree as of the last append.
    pub fn root(&self) -> H {
        self.snapshot.root_at(DEPTH as usize, self.partial_path())
    }

    /// Authentication path of the witnessed leaf against [`Witness::root`].
    pub fn path(&self) -> Result<MerklePath<H>, CommitmentTreeError> {
        self.snapshot.path_with(self.partial_path())
    }

    /// Fillers for the empty slots of the snapshot, lowest level first.
    fn partial_path(&self) -> Vec<H> {
        let mut uncles = self.filled.clone();
        if let Some(cursor) = &self.cursor {
            uncles.push(cursor.root_at(self.cursor_depth, Vec::new()));
        }
        uncles
    }

    /// Rebuild a witness from decoded parts, re-deriving the cursor depth.
    fn from_parts(
        snapshot: CommitmentTree<H, DEPTH>,
        filled: Vec<H>,
        cursor: Option<CommitmentTree<H, DEPTH>>,
    ) -> Result<Self, CommitmentTreeError> {
        if snapshot.is_empty() {
            return Err(CommitmentTreeError::MalformedWitness(
                "snapshot tree is empty".to_string(),
            ));
        }
        if let Some(last) = filled.len().checked_sub(1) {
            let depth = snapshot.next_depth(last);
            if depth >= DEPTH as usize {
                return Err(CommitmentTreeError::MalformedWitness(format!(
                    "{} filled subtrees do not fit a tree of depth {}",
                    filled.len(),
                    DEPTH
                )));
            }
        }

        let cursor_depth = snapshot.next_depth(filled.len());
        if let Some(cursor) = &cursor {
            if cursor_depth == 0 || cursor_depth >= DEPTH as usize {
                return Err(CommitmentTreeError::MalformedWitness(format!(
                    "cursor present at invalid depth {}",
                    cursor_depth
                )));
            }
            if cursor.is_empty() {
                return Err(CommitmentTreeError::MalformedWitness(
                    "cursor tree is empty".to_string(),
                ));
            }
            if cursor.size() >= 1u64 << cursor_depth {
                return Err(CommitmentTreeError::MalformedWitness(format!(
                    "cursor holds {} leaves, subtree at depth {} is already complete",
                    cursor.size(),
                    cursor_depth
                )));
            }
        }

        Ok(Self {
            snapshot,
            filled,
            cursor,
            cursor_depth,
        })
    }
}

impl<H: Hashable + HashSer, const DEPTH: u8> Witness<H, DEPTH> {
    /// Write the canonical encoding. The cursor depth is not written; it is
    /// derived again on read.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), CommitmentTreeError> {
        self.snapshot.write(writer)?;
        writer.write_varint(self.filled.len() as u64)?;
        for hash in &self.filled {
            hash.hash_write(writer)?;
        }
        write_presence(self.cursor.is_some(), writer)?;
        if let Some(cursor) = &self.cursor {
            cursor.write(writer)?;
        }
        Ok(())
    }

    /// Read and validate a canonical encoding.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, CommitmentTreeError> {
        let snapshot = CommitmentTree::read(reader)?;
        let filled_count: u64 = reader.read_varint()?;
        if filled_count > DEPTH as u64 {
            return Err(CommitmentTreeError::MalformedWitness(format!(
                "{} filled subtrees exceed tree depth {}",
                filled_count, DEPTH
            )));
        }
        let mut filled = Vec::with_capacity(filled_count as usize);
        for _ in 0..filled_count {
            filled.push(H::hash_read(reader)?);
        }
        let cursor = if read_presence(reader)? {
            Some(CommitmentTree::read(reader)?)
        } else {
            None
        };
        Self::from_parts(snapshot, filled, cursor)
    }

    /// Encode to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CommitmentTreeError> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Decode from bytes. The whole input must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, CommitmentTreeError> {
        let mut reader = bytes;
        let witness = Self::read(&mut reader).map_err(|e| match e {
            CommitmentTreeError::MalformedTree(msg) => {
                CommitmentTreeError::MalformedWitness(format!("embedded tree: {}", msg))
            }
            other => malformed_input(other, CommitmentTreeError::MalformedWitness),
        })?;
        if !reader.is_empty() {
            return Err(CommitmentTreeError::MalformedWitness(format!(
                "{} trailing bytes after witness",
                reader.len()
            )));
        }
        Ok(witness)
    }
}
