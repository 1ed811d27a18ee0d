//! Authentication paths handed to the membership verifier.

use std::io::{Read, Write};

use integer_encoding::{VarIntReader, VarIntWriter};

use crate::{
    CommitmentTreeError,
    hash::{HashSer, Hashable},
    serialization::malformed_input,
};

/// Upper bound on path length accepted by the decoder (deepest supported
/// tree).
const MAX_PATH_LEN: u64 = 63;

/// Sibling digests and position bits proving one leaf under a root.
///
/// Both vectors are ordered root-most level first. `position_bits[i]` is
/// `true` when the node on the path at that level is a right child, i.e.
/// its sibling `auth_path[i]` sits on the left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath<H> {
    auth_path: Vec<H>,
    position_bits: Vec<bool>,
}

impl<H> MerklePath<H> {
    /// Build a path from its parts. Both sequences must have the same length.
    pub fn from_parts(
        auth_path: Vec<H>,
        position_bits: Vec<bool>,
    ) -> Result<Self, CommitmentTreeError> {
        if auth_path.len() != position_bits.len() {
            return Err(CommitmentTreeError::MalformedWitness(format!(
                "path has {} siblings but {} position bits",
                auth_path.len(),
                position_bits.len()
            )));
        }
        Ok(Self {
            auth_path,
            position_bits,
        })
    }

    /// Sibling digests, root-most first.
    pub fn auth_path(&self) -> &[H] {
        &self.auth_path
    }

    /// Position bits, root-most first.
    pub fn position_bits(&self) -> &[bool] {
        &self.position_bits
    }

    /// Number of levels covered by the path.
    pub fn len(&self) -> usize {
        self.auth_path.len()
    }

    /// Whether the path covers no level at all.
    pub fn is_empty(&self) -> bool {
        self.auth_path.is_empty()
    }

    /// Leaf index encoded by the position bits.
    pub fn position(&self) -> u64 {
        self.position_bits
            .iter()
            .fold(0u64, |position, &bit| (position << 1) | u64::from(bit))
    }
}

impl<H: Hashable> MerklePath<H> {
    /// Recompute the root implied by this path for `leaf`.
    pub fn root(&self, leaf: &H) -> H {
        self.auth_path
            .iter()
            .zip(&self.position_bits)
            .rev()
            .fold(leaf.clone(), |node, (sibling, &is_right)| {
                if is_right {
                    H::combine(sibling, &node)
                } else {
                    H::combine(&node, sibling)
                }
            })
    }

    /// Whether `leaf` is proven under `anchor` by this path.
    pub fn verify(&self, leaf: &H, anchor: &H) -> bool {
        &self.root(leaf) == anchor
    }
}

impl<H: HashSer> MerklePath<H> {
    /// Write the path: sibling count, siblings, bit count, packed bits.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), CommitmentTreeError> {
        writer.write_varint(self.auth_path.len() as u64)?;
        for sibling in &self.auth_path {
            sibling.hash_write(writer)?;
        }
        writer.write_varint(self.position_bits.len() as u64)?;
        let mut packed = vec![0u8; self.position_bits.len().div_ceil(8)];
        for (i, &bit) in self.position_bits.iter().enumerate() {
            if bit {
                packed[i / 8] |= 0x80 >> (i % 8);
            }
        }
        writer.write_all(&packed)?;
        Ok(())
    }

    /// Read a path written by [`MerklePath::write`].
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, CommitmentTreeError> {
        let node_count: u64 = reader.read_varint()?;
        if node_count > MAX_PATH_LEN {
            return Err(CommitmentTreeError::MalformedWitness(format!(
                "path length {} exceeds maximum {}",
                node_count, MAX_PATH_LEN
            )));
        }
        let mut auth_path = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            auth_path.push(H::hash_read(reader)?);
        }

        let bit_count: u64 = reader.read_varint()?;
        if bit_count != node_count {
            return Err(CommitmentTreeError::MalformedWitness(format!(
                "path has {} siblings but {} position bits",
                node_count, bit_count
            )));
        }
        let mut packed = vec![0u8; (bit_count as usize).div_ceil(8)];
        reader.read_exact(&mut packed)?;
        let position_bits = (0..bit_count as usize)
            .map(|i| packed[i / 8] & (0x80 >> (i % 8)) != 0)
            .collect();

        Self::from_parts(auth_path, position_bits)
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
        let path = Self::read(&mut reader)
            .map_err(|e| malformed_input(e, CommitmentTreeError::MalformedWitness))?;
        if !reader.is_empty() {
            return Err(CommitmentTreeError::MalformedWitness(format!(
                "{} trailing bytes after path",
                reader.len()
            )));
        }
        Ok(path)
    }
}
