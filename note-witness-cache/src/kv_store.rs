//! Persistence of the canonical tree and the witness cache through a generic
//! key-value store.
//!
//! # Key Scheme
//!
//! All keys use single-byte prefixes to avoid collisions between different
//! data types:
//! - `T` -> canonical tree encoding
//! - `M` -> cache metadata (bincode)
//! - `N` + bincode `NoteOutPoint` -> witness history of that note
//!
//! # History Encoding
//!
//! - entry count (varint) + per entry a presence flag (`0x00` / `0x01`),
//!   followed by the witness encoding when present

use std::{
    collections::{BTreeMap, VecDeque},
    convert::Infallible,
    io::Read,
};

use bincode::{Decode, Encode};
use incremental_commitment_tree::{
    CommitmentTree, CommitmentTreeError, HashSer, Hashable, Witness,
};
use integer_encoding::{VarIntReader, VarIntWriter};
use tracing::debug;

use crate::{
    NoteOutPoint, NoteWitnesses, WitnessCache, WitnessCacheConfig, WitnessCacheError,
};

/// Key of the tree entry.
const KEY_TREE: &[u8] = b"T";
/// Key of the metadata entry.
const KEY_META: &[u8] = b"M";
/// Key prefix for note history entries.
const PREFIX_NOTE: u8 = b'N';

const ENTRY_ABSENT: u8 = 0x00;
const ENTRY_PRESENT: u8 = 0x01;

/// Simple key-value storage trait for wallet state persistence.
///
/// Keys and values are arbitrary byte slices. Prefix scans must be ordered by
/// key.
pub trait KvStore {
    /// The error type for operations on this store.
    type Error: std::error::Error;

    /// Get the value associated with the given key, or `None` if not found.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Insert or replace the value at the given key.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Delete the value at the given key. No-op if key does not exist.
    fn delete(&mut self, key: &[u8]) -> Result<(), Self::Error>;

    /// Get all key-value pairs with keys starting with the given prefix,
    /// ordered by key.
    #[allow(clippy::type_complexity)]
    fn prefix_iter(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Self::Error>;

    /// Apply all operations atomically: either every operation is visible
    /// afterwards or none is.
    fn write_batch(&mut self, ops: Vec<KvBatchOp>) -> Result<(), Self::Error>;
}

/// One operation of a [`KvStore::write_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvBatchOp {
    /// Insert or replace a value.
    Put {
        /// Key to write.
        key: Vec<u8>,
        /// Value to store.
        value: Vec<u8>,
    },
    /// Remove a value.
    Delete {
        /// Key to remove.
        key: Vec<u8>,
    },
}

/// A simple in-memory implementation of [`KvStore`] backed by a `BTreeMap`.
/// Its operations cannot fail.
#[derive(Debug, Default, Clone)]
pub struct MemKvStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reference to the underlying data.
    pub fn data(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.data
    }
}

impl KvStore for MemKvStore {
    type Error = Infallible;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), Self::Error> {
        self.data.remove(key);
        Ok(())
    }

    fn prefix_iter(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Self::Error> {
        let result: Vec<_> = self
            .data
            .range::<Vec<u8>, _>(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(result)
    }

    fn write_batch(&mut self, ops: Vec<KvBatchOp>) -> Result<(), Self::Error> {
        for op in ops {
            match op {
                KvBatchOp::Put { key, value } => {
                    self.data.insert(key, value);
                }
                KvBatchOp::Delete { key } => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Cache-wide values stored under [`KEY_META`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
struct CacheMeta {
    tip_height: Option<u64>,
    cached_blocks: u64,
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
        .with_limit::<{ 1024 * 1024 }>()
}

fn note_key(note: &NoteOutPoint) -> Result<Vec<u8>, WitnessCacheError> {
    let mut key = vec![PREFIX_NOTE];
    let encoded = bincode::encode_to_vec(note, bincode_config())
        .map_err(|e| WitnessCacheError::Decode(format!("failed to encode note key: {}", e)))?;
    key.extend_from_slice(&encoded);
    Ok(key)
}

fn decode_note_key(key: &[u8]) -> Result<NoteOutPoint, WitnessCacheError> {
    let Some((&PREFIX_NOTE, rest)) = key.split_first() else {
        return Err(WitnessCacheError::Decode(format!(
            "unexpected note key {}",
            hex::encode(key)
        )));
    };
    let (note, read) = bincode::decode_from_slice(rest, bincode_config())
        .map_err(|e| WitnessCacheError::Decode(format!("failed to decode note key: {}", e)))?;
    if read != rest.len() {
        return Err(WitnessCacheError::Decode(format!(
            "note key has {} trailing bytes",
            rest.len() - read
        )));
    }
    Ok(note)
}

/// Surface truncated input as a decode failure, keep structural errors.
fn stored_input(err: CommitmentTreeError) -> WitnessCacheError {
    match err {
        CommitmentTreeError::Io(e) => WitnessCacheError::Decode(e.to_string()),
        other => WitnessCacheError::Tree(other),
    }
}

fn encode_history<H: Hashable + HashSer, const DEPTH: u8>(
    witnesses: &NoteWitnesses<H, DEPTH>,
) -> Result<Vec<u8>, WitnessCacheError> {
    let mut buf = Vec::new();
    buf.write_varint(witnesses.len() as u64)
        .map_err(CommitmentTreeError::from)?;
    for entry in witnesses.iter() {
        match entry {
            None => buf.push(ENTRY_ABSENT),
            Some(witness) => {
                buf.push(ENTRY_PRESENT);
                witness.write(&mut buf)?;
            }
        }
    }
    Ok(buf)
}

fn decode_history<H: Hashable + HashSer, const DEPTH: u8>(
    bytes: &[u8],
) -> Result<NoteWitnesses<H, DEPTH>, WitnessCacheError> {
    let mut reader = bytes;
    let count: u64 = reader
        .read_varint()
        .map_err(|e| WitnessCacheError::Decode(format!("history length: {}", e)))?;
    // each entry takes at least one byte
    if count > reader.len() as u64 {
        return Err(WitnessCacheError::Decode(format!(
            "history claims {} entries in {} bytes",
            count,
            reader.len()
        )));
    }
    let mut history = VecDeque::with_capacity(count as usize);
    for _ in 0..count {
        let mut flag = [0u8; 1];
        reader
            .read_exact(&mut flag)
            .map_err(|e| WitnessCacheError::Decode(format!("history entry flag: {}", e)))?;
        let entry = match flag[0] {
            ENTRY_ABSENT => None,
            ENTRY_PRESENT => Some(Witness::read(&mut reader).map_err(stored_input)?),
            other => {
                return Err(WitnessCacheError::Decode(format!(
                    "invalid history entry flag: {:#04x}",
                    other
                )));
            }
        };
        history.push_back(entry);
    }
    if !reader.is_empty() {
        return Err(WitnessCacheError::Decode(format!(
            "{} trailing bytes after history",
            reader.len()
        )));
    }
    Ok(NoteWitnesses::from_history(history))
}

/// Saves and restores the canonical tree together with the witness cache.
pub struct WalletStateStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> WalletStateStore<S> {
    /// Create a new `WalletStateStore` wrapping the given key-value store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying key-value store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Consume this wrapper and return the underlying store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Persist `tree` and `cache` in one atomic batch. Histories of notes
    /// that are no longer tracked are removed.
    pub fn save<H: Hashable + HashSer, const DEPTH: u8>(
        &mut self,
        tree: &CommitmentTree<H, DEPTH>,
        cache: &WitnessCache<H, DEPTH>,
    ) -> Result<(), WitnessCacheError> {
        let mut ops = Vec::new();
        let mut written = Vec::new();
        for (note, witnesses) in cache.notes() {
            let key = note_key(note)?;
            ops.push(KvBatchOp::Put {
                key: key.clone(),
                value: encode_history(witnesses)?,
            });
            written.push(key);
        }

        let stale = self
            .store
            .prefix_iter(&[PREFIX_NOTE])
            .map_err(|e| WitnessCacheError::Store(e.to_string()))?;
        for (key, _) in stale {
            if !written.contains(&key) {
                ops.push(KvBatchOp::Delete { key });
            }
        }

        let meta = CacheMeta {
            tip_height: cache.tip_height(),
            cached_blocks: cache.cached_blocks() as u64,
        };
        let meta = bincode::encode_to_vec(&meta, bincode_config())
            .map_err(|e| WitnessCacheError::Decode(format!("failed to encode metadata: {}", e)))?;
        ops.push(KvBatchOp::Put {
            key: KEY_META.to_vec(),
            value: meta,
        });
        ops.push(KvBatchOp::Put {
            key: KEY_TREE.to_vec(),
            value: tree.encode()?,
        });

        let op_count = ops.len();
        self.store
            .write_batch(ops)
            .map_err(|e| WitnessCacheError::Store(e.to_string()))?;
        debug!(
            tree_size = tree.size(),
            tracked_notes = written.len(),
            ops = op_count,
            "saved wallet witness state"
        );
        Ok(())
    }

    /// Restore the tree and the cache saved by [`WalletStateStore::save`].
    ///
    /// Returns `None` if nothing was saved yet. If `config` retains fewer
    /// blocks than the saved cache, the oldest entries are dropped. Fails
    /// with [`WitnessCacheError::Decode`] if a history is longer than the
    /// number of cached blocks or a current witness is not rooted at the
    /// saved tree.
    #[allow(clippy::type_complexity)]
    pub fn load<H: Hashable + HashSer, const DEPTH: u8>(
        &self,
        config: WitnessCacheConfig,
    ) -> Result<Option<(CommitmentTree<H, DEPTH>, WitnessCache<H, DEPTH>)>, WitnessCacheError> {
        let Some(tree_bytes) = self
            .store
            .get(KEY_TREE)
            .map_err(|e| WitnessCacheError::Store(e.to_string()))?
        else {
            return Ok(None);
        };
        let tree = CommitmentTree::decode(&tree_bytes)?;

        let meta_bytes = self
            .store
            .get(KEY_META)
            .map_err(|e| WitnessCacheError::Store(e.to_string()))?
            .ok_or_else(|| WitnessCacheError::Decode("missing cache metadata".to_string()))?;
        let (meta, _): (CacheMeta, usize) =
            bincode::decode_from_slice(&meta_bytes, bincode_config()).map_err(|e| {
                WitnessCacheError::Decode(format!("failed to decode metadata: {}", e))
            })?;

        let saved_blocks = usize::try_from(meta.cached_blocks)
            .map_err(|_| WitnessCacheError::Decode("cached block count overflow".to_string()))?;
        let root = tree.root();
        let retained_depth = config.retained_depth();
        let mut notes = BTreeMap::new();
        for (key, value) in self
            .store
            .prefix_iter(&[PREFIX_NOTE])
            .map_err(|e| WitnessCacheError::Store(e.to_string()))?
        {
            let note = decode_note_key(&key)?;
            let mut witnesses: NoteWitnesses<H, DEPTH> = decode_history(&value)?;
            if witnesses.len() > saved_blocks {
                return Err(WitnessCacheError::Decode(format!(
                    "note {} has {} history entries for {} cached blocks",
                    note,
                    witnesses.len(),
                    saved_blocks
                )));
            }
            if witnesses.current().is_some_and(|witness| witness.root() != root) {
                return Err(WitnessCacheError::Decode(format!(
                    "witness of note {} does not match the saved tree",
                    note
                )));
            }
            witnesses.trim_to(retained_depth);
            notes.insert(note, witnesses);
        }

        let cached_blocks = saved_blocks.min(retained_depth);
        debug!(
            tree_size = tree.size(),
            tracked_notes = notes.len(),
            tip_height = ?meta.tip_height,
            "loaded wallet witness state"
        );
        let cache = WitnessCache::from_parts(config, notes, meta.tip_height, cached_blocks);
        Ok(Some((tree, cache)))
    }
}
