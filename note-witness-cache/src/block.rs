use crate::NoteOutPoint;

/// One note commitment of a block, in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockCommitment<H> {
    /// The commitment appended to the global tree.
    pub leaf: H,
    /// Set when note detection recognised the output as one of ours.
    pub note: Option<NoteOutPoint>,
}

impl<H> BlockCommitment<H> {
    /// A commitment that does not belong to the wallet.
    pub fn foreign(leaf: H) -> Self {
        Self { leaf, note: None }
    }

    /// A commitment of a note the wallet owns.
    pub fn owned(leaf: H, note: NoteOutPoint) -> Self {
        Self {
            leaf,
            note: Some(note),
        }
    }
}

/// A block being connected to the chain tip, reduced to what the witness
/// cache needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedBlock<H> {
    /// Height of the block.
    pub height: u64,
    /// Note commitments of the block, in the order they enter the tree.
    pub commitments: Vec<BlockCommitment<H>>,
}

impl<H> ConnectedBlock<H> {
    /// A block with no commitments.
    pub fn new(height: u64) -> Self {
        Self {
            height,
            commitments: Vec::new(),
        }
    }

    /// Builder-style append of a commitment.
    pub fn with_commitment(mut self, commitment: BlockCommitment<H>) -> Self {
        self.commitments.push(commitment);
        self
    }

    /// Number of leaves the block appends.
    pub fn leaf_count(&self) -> usize {
        self.commitments.len()
    }

    /// Notes of the wallet created by this block.
    pub fn owned_notes(&self) -> impl Iterator<Item = &NoteOutPoint> {
        self.commitments.iter().filter_map(|c| c.note.as_ref())
    }
}
