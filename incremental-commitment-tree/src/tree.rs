//! Frontier-only incremental Merkle tree of fixed depth.
//!
//! Only the rightmost path of the tree is kept: the current leaf pair and one
//! optional collapsed subtree per level above it. Appending behaves like
//! incrementing a binary counter. The pair fills up first; when a leaf
//! arrives at a full pair, the pair is hashed and carried up through
//! `parents` until it lands in an empty slot, and the new leaf starts a fresh
//! pair.

use std::{
    collections::VecDeque,
    io::{Read, Write},
};

use crate::{
    CommitmentTreeError,
    hash::{EmptyRoots, HashSer, Hashable},
    path::MerklePath,
    serialization::{malformed_input, read_slot, write_slot},
    witness::Witness,
};

/// Hands out explicit filler digests first, then default empty roots.
pub(crate) struct PathFiller<'a, H> {
    queue: VecDeque<H>,
    empty: &'a EmptyRoots<H>,
}

impl<'a, H: Hashable> PathFiller<'a, H> {
    pub(crate) fn new(fillers: Vec<H>, empty: &'a EmptyRoots<H>) -> Self {
        Self {
            queue: fillers.into(),
            empty,
        }
    }

    pub(crate) fn next(&mut self, level: usize) -> H {
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.empty.at(level))
    }
}

/// An append-only binary Merkle tree of depth `DEPTH` holding at most
/// `2^DEPTH` leaves.
///
/// The state is `(left, right, parents)`. `parents[i]` is the root of a
/// completed subtree of height `i + 1` that sits to the left of the current
/// pair. `parents` is kept canonical: never longer than `DEPTH - 1` and never
/// ending in an absent slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentTree<H, const DEPTH: u8> {
    left: Option<H>,
    right: Option<H>,
    parents: Vec<Option<H>>,
}

impl<H, const DEPTH: u8> CommitmentTree<H, DEPTH> {
    const VALID_DEPTH: () = assert!(
        DEPTH >= 1 && DEPTH < 64,
        "commitment tree depth must be between 1 and 63"
    );

    /// Create a new empty tree.
    pub fn new() -> Self {
        let () = Self::VALID_DEPTH;
        Self {
            left: None,
            right: None,
            parents: Vec::new(),
        }
    }

    /// Depth of the tree.
    pub fn depth(&self) -> u8 {
        DEPTH
    }

    /// Maximum number of leaves, `2^DEPTH`.
    pub fn capacity(&self) -> u64 {
        1u64 << DEPTH
    }

    /// Whether no leaf has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.left.is_none()
    }

    /// Number of leaves appended so far, read off the occupied slots.
    pub fn size(&self) -> u64 {
        let pair = match (&self.left, &self.right) {
            (None, _) => 0,
            (Some(_), None) => 1,
            (Some(_), Some(_)) => 2,
        };
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_some())
            .fold(pair, |size, (level, _)| size + (1u64 << (level + 1)))
    }

    /// The most recently appended leaf.
    pub fn last(&self) -> Option<&H> {
        self.right.as_ref().or(self.left.as_ref())
    }
}

impl<H, const DEPTH: u8> Default for CommitmentTree<H, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hashable, const DEPTH: u8> CommitmentTree<H, DEPTH> {
    /// Rebuild a tree from its slots, enforcing the canonical form.
    ///
    /// Trailing absent parents are trimmed. Every state that passes these
    /// checks is reachable by some sequence of appends: the leaf count is the
    /// binary number spelled by the parents above the pair.
    pub fn from_parts(
        left: Option<H>,
        right: Option<H>,
        mut parents: Vec<Option<H>>,
    ) -> Result<Self, CommitmentTreeError> {
        let () = Self::VALID_DEPTH;
        while matches!(parents.last(), Some(None)) {
            parents.pop();
        }
        if parents.len() >= DEPTH as usize {
            return Err(CommitmentTreeError::MalformedTree(format!(
                "tree has {} parents, at most {} allowed at depth {}",
                parents.len(),
                DEPTH - 1,
                DEPTH
            )));
        }
        if left.is_none() && right.is_some() {
            return Err(CommitmentTreeError::MalformedTree(
                "right leaf present without left leaf".to_string(),
            ));
        }
        if left.is_none() && !parents.is_empty() {
            return Err(CommitmentTreeError::MalformedTree(
                "parents present without left leaf".to_string(),
            ));
        }
        Ok(Self {
            left,
            right,
            parents,
        })
    }

    /// Root of an empty tree of this depth.
    pub fn empty_root() -> H {
        H::empty_root(DEPTH as usize)
    }

    /// Append a leaf at the next free position.
    ///
    /// Fails with [`CommitmentTreeError::CapacityExceeded`] once `2^DEPTH`
    /// leaves are held; the tree is left unchanged in that case.
    pub fn append(&mut self, leaf: H) -> Result<(), CommitmentTreeError> {
        if self.is_complete(DEPTH as usize) {
            return Err(CommitmentTreeError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        let Some(left) = &self.left else {
            self.left = Some(leaf);
            return Ok(());
        };
        let Some(right) = &self.right else {
            self.right = Some(leaf);
            return Ok(());
        };

        let mut carry = H::combine(left, right);
        self.left = Some(leaf);
        self.right = None;

        // Not complete, so the carry stops at or below level DEPTH - 2.
        let mut level = 0;
        loop {
            match self.parents.get_mut(level) {
                None => {
                    self.parents.push(Some(carry));
                    break;
                }
                Some(slot) => match slot.take() {
                    None => {
                        *slot = Some(carry);
                        break;
                    }
                    Some(parent) => carry = H::combine(&parent, &carry),
                },
            }
            level += 1;
        }
        Ok(())
    }

    /// Current root, with every empty subtree replaced by its default digest.
    pub fn root(&self) -> H {
        self.root_at(DEPTH as usize, Vec::new())
    }

    /// Authentication path for the most recently appended leaf.
    pub fn path(&self) -> Result<MerklePath<H>, CommitmentTreeError> {
        self.path_with(Vec::new())
    }

    /// Authentication path for the leaf at `position`.
    ///
    /// A frontier only retains enough to prove its latest leaf; older
    /// positions must be proven through a [`Witness`] created when they were
    /// appended.
    pub fn path_for(&self, position: u64) -> Result<MerklePath<H>, CommitmentTreeError> {
        let size = self.size();
        if size == 0 {
            return Err(CommitmentTreeError::EmptyTree);
        }
        if position != size - 1 {
            return Err(CommitmentTreeError::PositionNotWitnessable { position, size });
        }
        self.path()
    }

    /// Start a witness for the most recently appended leaf.
    pub fn witness(&self) -> Result<Witness<H, DEPTH>, CommitmentTreeError> {
        Witness::from_tree(self.clone())
    }

    /// Whether the subtree of height `depth` rooted at the left edge of the
    /// frontier has no empty slot left.
    ///
    /// `is_complete(DEPTH)` means the tree is full.
    pub fn is_complete(&self, depth: usize) -> bool {
        let Some(parent_levels) = depth.checked_sub(1) else {
            return false;
        };
        self.left.is_some()
            && self.right.is_some()
            && self.parents.len() == parent_levels
            && self.parents.iter().all(Option::is_some)
    }

    /// Level of the `skip`-th empty slot of the frontier, counting from the
    /// leaf pair upward. Levels past the stored parents are all empty.
    pub(crate) fn next_depth(&self, mut skip: usize) -> usize {
        if self.left.is_none() {
            if skip == 0 {
                return 0;
            }
            skip -= 1;
        }
        if self.right.is_none() {
            if skip == 0 {
                return 0;
            }
            skip -= 1;
        }

        let mut depth = 1;
        for parent in &self.parents {
            if parent.is_none() {
                if skip == 0 {
                    return depth;
                }
                skip -= 1;
            }
            depth += 1;
        }
        depth + skip
    }

    /// Root of the subtree of height `depth`, filling empty slots from
    /// `fillers` first and from default digests afterwards.
    pub(crate) fn root_at(&self, depth: usize, fillers: Vec<H>) -> H {
        let empty = EmptyRoots::new(depth);
        let mut filler = PathFiller::new(fillers, &empty);

        let left = self.left.clone().unwrap_or_else(|| filler.next(0));
        let right = self.right.clone().unwrap_or_else(|| filler.next(0));
        let mut root = H::combine(&left, &right);

        let mut level = 1;
        for parent in &self.parents {
            root = match parent {
                Some(parent) => H::combine(parent, &root),
                None => H::combine(&root, &filler.next(level)),
            };
            level += 1;
        }
        while level < depth {
            root = H::combine(&root, &filler.next(level));
            level += 1;
        }
        root
    }

    /// Authentication path of the latest leaf, filling empty sibling slots
    /// from `fillers` first.
    pub(crate) fn path_with(&self, fillers: Vec<H>) -> Result<MerklePath<H>, CommitmentTreeError> {
        let left = self.left.as_ref().ok_or(CommitmentTreeError::EmptyTree)?;
        let empty = EmptyRoots::new(DEPTH as usize);
        let mut filler = PathFiller::new(fillers, &empty);

        let mut auth_path = Vec::with_capacity(DEPTH as usize);
        let mut position_bits = Vec::with_capacity(DEPTH as usize);

        if self.right.is_some() {
            position_bits.push(true);
            auth_path.push(left.clone());
        } else {
            position_bits.push(false);
            auth_path.push(filler.next(0));
        }

        let mut level = 1;
        for parent in &self.parents {
            match parent {
                Some(parent) => {
                    position_bits.push(true);
                    auth_path.push(parent.clone());
                }
                None => {
                    position_bits.push(false);
                    auth_path.push(filler.next(level));
                }
            }
            level += 1;
        }
        while level < DEPTH as usize {
            position_bits.push(false);
            auth_path.push(filler.next(level));
            level += 1;
        }

        // root-most sibling first
        auth_path.reverse();
        position_bits.reverse();
        MerklePath::from_parts(auth_path, position_bits)
    }
}

impl<H: Hashable + HashSer, const DEPTH: u8> CommitmentTree<H, DEPTH> {
    /// Write the canonical encoding: left, right, then exactly `DEPTH - 1`
    /// parent slots from the lowest level up.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), CommitmentTreeError> {
        write_slot(self.left.as_ref(), writer)?;
        write_slot(self.right.as_ref(), writer)?;
        for level in 0..(DEPTH as usize - 1) {
            let parent = self.parents.get(level).and_then(Option::as_ref);
            write_slot(parent, writer)?;
        }
        Ok(())
    }

    /// Read a canonical encoding and validate it.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, CommitmentTreeError> {
        let left = read_slot(reader)?;
        let right = read_slot(reader)?;
        let mut parents = Vec::with_capacity(DEPTH as usize - 1);
        for _ in 0..(DEPTH as usize - 1) {
            parents.push(read_slot(reader)?);
        }
        Self::from_parts(left, right, parents)
    }

    /// Encode to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CommitmentTreeError> {
        let mut buf = Vec::with_capacity(Self::encoded_len_hint());
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Decode from bytes. The whole input must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, CommitmentTreeError> {
        let mut reader = bytes;
        let tree = Self::read(&mut reader)
            .map_err(|e| malformed_input(e, CommitmentTreeError::MalformedTree))?;
        if !reader.is_empty() {
            return Err(CommitmentTreeError::MalformedTree(format!(
                "{} trailing bytes after tree",
                reader.len()
            )));
        }
        Ok(tree)
    }

    fn encoded_len_hint() -> usize {
        (DEPTH as usize + 1) * 33
    }
}
