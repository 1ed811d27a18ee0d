//! Digest capability used by the tree and its witnesses.
//!
//! The tree never hashes raw data itself: it only needs an order-sensitive
//! two-to-one `combine` and a fixed "uncommitted" leaf value from which the
//! default digest of every empty subtree is derived:
//!
//! `empty_root(0) = empty_leaf()`
//! `empty_root(k) = combine(empty_root(k - 1), empty_root(k - 1))`
//!
//! [`Blake3Node`] is the digest shipped with the crate. Internal nodes hash
//! `blake3(0x01 || left || right)`; commitments created from raw note data
//! hash `blake3(0x00 || data)`, so a leaf can never collide with a merge.

use std::{
    fmt,
    io::{self, Read, Write},
};

/// Domain tag prepended to leaf inputs in [`Blake3Node::from_commitment`].
const LEAF_TAG: u8 = 0x00;
/// Domain tag prepended to merge inputs in [`Blake3Node::combine`].
const INTERNAL_TAG: u8 = 0x01;

/// A fixed-size digest that can be combined pairwise into a parent digest.
pub trait Hashable: Clone + Eq + fmt::Debug {
    /// Value of an uncommitted leaf. Root of the empty subtree at level 0.
    fn empty_leaf() -> Self;

    /// Combine a left and right child into their parent. Must be
    /// deterministic and order-sensitive.
    fn combine(left: &Self, right: &Self) -> Self;

    /// Default digest of an empty subtree of height `level`.
    ///
    /// This recomputes the whole chain; code that needs several levels uses
    /// [`EmptyRoots`] instead.
    fn empty_root(level: usize) -> Self {
        let mut root = Self::empty_leaf();
        for _ in 0..level {
            root = Self::combine(&root, &root);
        }
        root
    }
}

/// Trait for digests that can be serialized to and from a fixed 32-byte
/// representation.
///
/// Keeps the canonical codecs generic over the digest type.
pub trait HashSer: Sized {
    /// Read a digest from exactly 32 bytes.
    fn hash_read<R: Read>(reader: &mut R) -> io::Result<Self>;
    /// Write a digest as exactly 32 bytes.
    fn hash_write<W: Write>(&self, writer: &mut W) -> io::Result<()>;
}

/// Default digests for empty subtrees of every level `0..=depth`.
#[derive(Debug, Clone)]
pub struct EmptyRoots<H> {
    roots: Vec<H>,
}

impl<H: Hashable> EmptyRoots<H> {
    /// Precompute the empty roots for levels `0..=depth`.
    pub fn new(depth: usize) -> Self {
        let mut roots = Vec::with_capacity(depth + 1);
        let mut current = H::empty_leaf();
        roots.push(current.clone());
        for _ in 0..depth {
            current = H::combine(&current, &current);
            roots.push(current.clone());
        }
        Self { roots }
    }

    /// Empty root at `level`. Levels above the precomputed depth are derived
    /// on the fly.
    pub fn at(&self, level: usize) -> H {
        match self.roots.get(level) {
            Some(root) => root.clone(),
            None => H::empty_root(level),
        }
    }

    /// Highest precomputed level.
    pub fn depth(&self) -> usize {
        self.roots.len() - 1
    }
}

/// A 32-byte Blake3 Merkle node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Blake3Node([u8; 32]);

impl Blake3Node {
    /// Wrap raw digest bytes. No validation is needed: every 32-byte string
    /// is a valid node.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash raw note commitment data into a leaf: `blake3(0x00 || data)`.
    pub fn from_commitment(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[LEAF_TAG]);
        hasher.update(data);
        Self(*hasher.finalize().as_bytes())
    }

    /// The raw digest bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Hashable for Blake3Node {
    fn empty_leaf() -> Self {
        Self([0u8; 32])
    }

    fn combine(left: &Self, right: &Self) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[INTERNAL_TAG]);
        hasher.update(&left.0);
        hasher.update(&right.0);
        Self(*hasher.finalize().as_bytes())
    }
}

impl HashSer for Blake3Node {
    fn hash_read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(Self(buf))
    }

    fn hash_write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl From<[u8; 32]> for Blake3Node {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Blake3Node> for [u8; 32] {
    fn from(node: Blake3Node) -> Self {
        node.0
    }
}

impl fmt::Debug for Blake3Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3Node({})", hex::encode(self.0))
    }
}

impl fmt::Display for Blake3Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
