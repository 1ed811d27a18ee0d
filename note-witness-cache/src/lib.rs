//! Wallet-side witness cache for shielded notes.
//!
//! A wallet proves ownership of a note by presenting a Merkle path from the
//! note's commitment to a recent root of the global commitment tree. This
//! crate keeps one [`Witness`](incremental_commitment_tree::Witness) per
//! owned note up to date as blocks are connected, and keeps enough history
//! to undo the last `retained_depth` blocks on a reorg.
//!
//! # Core types
//!
//! - [`WitnessCache`]: connect / disconnect blocks, query anchors and paths.
//! - [`NoteWitnesses`]: bounded per-note history.
//! - [`ConnectedBlock`] / [`BlockCommitment`]: block input from the chain.
//! - [`WalletStateStore`]: persistence through a [`KvStore`].

mod block;
mod cache;
mod config;
mod error;
pub mod kv_store;
mod note;

#[cfg(test)]
mod tests;

pub use block::{BlockCommitment, ConnectedBlock};
pub use cache::{NoteState, NoteWitnesses, WitnessCache};
pub use config::WitnessCacheConfig;
pub use error::WitnessCacheError;
pub use kv_store::{KvBatchOp, KvStore, MemKvStore, WalletStateStore};
pub use note::NoteOutPoint;

use incremental_commitment_tree::{Blake3Node, NOTE_COMMITMENT_TREE_DEPTH};

/// Witness cache over the ledger note commitment tree.
pub type NoteWitnessCache = WitnessCache<Blake3Node, NOTE_COMMITMENT_TREE_DEPTH>;
