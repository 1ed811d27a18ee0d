use incremental_commitment_tree::CommitmentTreeError;
use thiserror::Error;

use crate::NoteOutPoint;

/// Errors raised by the witness cache and its persistence layer.
#[derive(Debug, Error)]
pub enum WitnessCacheError {
    #[error("note {0} has no witness at the current tip")]
    NoteNotYetObserved(NoteOutPoint),
    #[error("witness cache underflow: note {0} has no entry left to disconnect")]
    WitnessCacheUnderflow(NoteOutPoint),
    #[error("block at height {actual} does not extend the tip, expected height {expected}")]
    OutOfOrderBlock { expected: u64, actual: u64 },
    #[error("invalid witness cache config: {0}")]
    InvalidConfig(String),
    #[error("commitment tree error: {0}")]
    Tree(#[from] CommitmentTreeError),
    #[error("store error: {0}")]
    Store(String),
    #[error("decode error: {0}")]
    Decode(String),
}
