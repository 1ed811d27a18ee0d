use thiserror::Error;

/// Errors that can occur during commitment tree and witness operations.
#[derive(Debug, Error)]
pub enum CommitmentTreeError {
    #[error("tree is full (max {capacity} leaves)")]
    CapacityExceeded { capacity: u64 },
    #[error("malformed tree: {0}")]
    MalformedTree(String),
    #[error("malformed witness: {0}")]
    MalformedWitness(String),
    #[error("tree is empty")]
    EmptyTree,
    #[error("position {position} cannot be witnessed by a tree of size {size}")]
    PositionNotWitnessable { position: u64, size: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
