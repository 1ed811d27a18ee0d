use std::fmt;

use bincode::{Decode, Encode};

/// Identity of a shielded output: the transaction that created it and the
/// output's index inside that transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteOutPoint {
    /// Id of the transaction carrying the output.
    pub txid: [u8; 32],
    /// Position of the output within the transaction.
    pub output_index: u32,
}

impl NoteOutPoint {
    /// Create an outpoint.
    pub const fn new(txid: [u8; 32], output_index: u32) -> Self {
        Self { txid, output_index }
    }
}

impl fmt::Display for NoteOutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.txid), self.output_index)
    }
}

impl fmt::Debug for NoteOutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteOutPoint({})", self)
    }
}
