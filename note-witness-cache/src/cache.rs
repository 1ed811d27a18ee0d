//! Per-note witness histories kept in step with the chain tip.
//!
//! Every tracked note holds one history entry per retained block since it
//! was first tracked, most recent at the back. Connecting a block pushes one
//! entry to every history and disconnecting pops one from every non-empty
//! history, so a reorg of up to `retained_depth` blocks is undone exactly.

use std::collections::{BTreeMap, VecDeque};

use incremental_commitment_tree::{CommitmentTree, Hashable, MerklePath, Witness};
use tracing::{debug, trace, warn};

use crate::{ConnectedBlock, NoteOutPoint, WitnessCacheConfig, WitnessCacheError};

/// Where a tracked note stands in the witness state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    /// No history entry at all.
    Unobserved,
    /// That many retained entries, the last one being the current state.
    Tracking(usize),
}

/// Bounded history of witnesses of a single note.
///
/// `None` entries mark blocks connected before the note was seen in the
/// tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteWitnesses<H, const DEPTH: u8> {
    history: VecDeque<Option<Witness<H, DEPTH>>>,
}

impl<H, const DEPTH: u8> Default for NoteWitnesses<H, DEPTH> {
    fn default() -> Self {
        Self {
            history: VecDeque::new(),
        }
    }
}

impl<H, const DEPTH: u8> NoteWitnesses<H, DEPTH> {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_history(history: VecDeque<Option<Witness<H, DEPTH>>>) -> Self {
        Self { history }
    }

    /// Current state of the note.
    pub fn state(&self) -> NoteState {
        match self.history.len() {
            0 => NoteState::Unobserved,
            n => NoteState::Tracking(n),
        }
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no entry is retained.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The witness at the current tip, if the note has been observed.
    pub fn current(&self) -> Option<&Witness<H, DEPTH>> {
        self.history.back().and_then(Option::as_ref)
    }

    /// Entries from the oldest retained block to the tip.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Witness<H, DEPTH>>> {
        self.history.iter().map(Option::as_ref)
    }

    fn has_witness(&self) -> bool {
        self.history.iter().any(Option::is_some)
    }

    fn push(&mut self, entry: Option<Witness<H, DEPTH>>, retained_depth: usize) {
        self.history.push_back(entry);
        self.trim_to(retained_depth);
    }

    pub(crate) fn trim_to(&mut self, retained_depth: usize) {
        while self.history.len() > retained_depth {
            self.history.pop_front();
        }
    }
}

/// Wallet-side cache of witnesses for the notes the wallet owns.
///
/// The cache does not own the global commitment tree. The caller passes the
/// canonical tree to [`WitnessCache::connect`], and on a reorg restores the
/// tree state of the new tip itself.
#[derive(Debug, Clone)]
pub struct WitnessCache<H, const DEPTH: u8> {
    config: WitnessCacheConfig,
    notes: BTreeMap<NoteOutPoint, NoteWitnesses<H, DEPTH>>,
    tip_height: Option<u64>,
    cached_blocks: usize,
}

impl<H: Hashable, const DEPTH: u8> WitnessCache<H, DEPTH> {
    /// An empty cache that has not seen any block.
    pub fn new(config: WitnessCacheConfig) -> Self {
        Self {
            config,
            notes: BTreeMap::new(),
            tip_height: None,
            cached_blocks: 0,
        }
    }

    pub(crate) fn from_parts(
        config: WitnessCacheConfig,
        notes: BTreeMap<NoteOutPoint, NoteWitnesses<H, DEPTH>>,
        tip_height: Option<u64>,
        cached_blocks: usize,
    ) -> Self {
        Self {
            config,
            notes,
            tip_height,
            cached_blocks,
        }
    }

    /// Settings the cache was built with.
    pub fn config(&self) -> &WitnessCacheConfig {
        &self.config
    }

    /// Height of the last connected block.
    pub fn tip_height(&self) -> Option<u64> {
        self.tip_height
    }

    /// Number of connected blocks whose state is still retained.
    pub fn cached_blocks(&self) -> usize {
        self.cached_blocks
    }

    /// Start tracking `note` before it shows up in a block. Has no effect on
    /// a note that is already tracked.
    pub fn track(&mut self, note: NoteOutPoint) {
        self.notes.entry(note).or_default();
    }

    /// Stop tracking `note`, e.g. once it is spent and buried. Returns its
    /// history.
    pub fn untrack(&mut self, note: &NoteOutPoint) -> Option<NoteWitnesses<H, DEPTH>> {
        self.notes.remove(note)
    }

    /// Tracked notes in outpoint order.
    pub fn tracked_notes(&self) -> impl Iterator<Item = &NoteOutPoint> {
        self.notes.keys()
    }

    /// Tracked notes together with their histories.
    pub fn notes(&self) -> impl Iterator<Item = (&NoteOutPoint, &NoteWitnesses<H, DEPTH>)> {
        self.notes.iter()
    }

    /// History of `note`, if tracked.
    pub fn note(&self, note: &NoteOutPoint) -> Option<&NoteWitnesses<H, DEPTH>> {
        self.notes.get(note)
    }

    /// Number of history entries held for `note`; `None` if not tracked.
    pub fn history_len(&self, note: &NoteOutPoint) -> Option<usize> {
        self.notes.get(note).map(NoteWitnesses::len)
    }

    /// Apply a newly connected block.
    ///
    /// `tree` must be the canonical tree as of the previous tip. On success
    /// it holds the state after the block and every tracked note has gained
    /// exactly one history entry. On error neither the cache nor `tree` is
    /// modified.
    pub fn connect(
        &mut self,
        block: &ConnectedBlock<H>,
        tree: &mut CommitmentTree<H, DEPTH>,
    ) -> Result<(), WitnessCacheError> {
        if let Some(tip) = self.tip_height {
            let expected = tip.saturating_add(1);
            if block.height != expected {
                return Err(WitnessCacheError::OutOfOrderBlock {
                    expected,
                    actual: block.height,
                });
            }
        }

        let mut staged_tree = tree.clone();
        let mut advancing: BTreeMap<NoteOutPoint, Witness<H, DEPTH>> = self
            .notes
            .iter()
            .filter_map(|(note, witnesses)| Some((*note, witnesses.current()?.clone())))
            .collect();
        let mut created: BTreeMap<NoteOutPoint, Witness<H, DEPTH>> = BTreeMap::new();

        for commitment in &block.commitments {
            staged_tree.append(commitment.leaf.clone())?;
            for witness in advancing.values_mut().chain(created.values_mut()) {
                witness.append(commitment.leaf.clone())?;
            }
            if let Some(note) = commitment.note {
                trace!(
                    %note,
                    position = staged_tree.size() - 1,
                    height = block.height,
                    "creating witness"
                );
                if created.insert(note, staged_tree.witness()?).is_some() {
                    warn!(%note, height = block.height, "note appears twice in one block");
                }
            }
        }

        // Nothing below can fail.
        let retained_depth = self.config.retained_depth();
        for note in created.keys() {
            self.notes.entry(*note).or_default();
        }
        for (note, witnesses) in self.notes.iter_mut() {
            let entry = if let Some(witness) = created.remove(note) {
                if witnesses.has_witness() {
                    warn!(
                        %note,
                        cache_size = witnesses.len(),
                        height = block.height,
                        "inconsistent witness cache state, resetting history"
                    );
                    witnesses.history.clear();
                }
                Some(witness)
            } else {
                advancing.remove(note)
            };
            witnesses.push(entry, retained_depth);
        }

        *tree = staged_tree;
        self.tip_height = Some(block.height);
        self.cached_blocks = (self.cached_blocks + 1).min(retained_depth);
        debug!(
            height = block.height,
            leaves = block.leaf_count(),
            tree_size = tree.size(),
            tracked_notes = self.notes.len(),
            "connected block"
        );
        Ok(())
    }

    /// Undo the most recently connected block.
    ///
    /// A note with an empty history did not exist at that height and is
    /// left alone. Fails with [`WitnessCacheError::WitnessCacheUnderflow`]
    /// without modifying anything if no retained block is left to undo while
    /// notes are tracked. The cache is then unusable for this reorg and has
    /// to be rebuilt.
    pub fn disconnect(&mut self) -> Result<(), WitnessCacheError> {
        let no_block_left = self.cached_blocks == 0;
        if let Some(note) = self.notes.keys().next().filter(|_| no_block_left) {
            return Err(WitnessCacheError::WitnessCacheUnderflow(*note));
        }

        for witnesses in self.notes.values_mut() {
            witnesses.history.pop_back();
        }
        let disconnected = self.tip_height;
        self.tip_height = self.tip_height.and_then(|tip| tip.checked_sub(1));
        self.cached_blocks = self.cached_blocks.saturating_sub(1);
        debug!(
            height = ?disconnected,
            cached_blocks = self.cached_blocks,
            tracked_notes = self.notes.len(),
            "disconnected block"
        );
        Ok(())
    }

    /// Anchor and authentication path proving `note` at the current tip.
    pub fn current_anchor_and_path(
        &self,
        note: &NoteOutPoint,
    ) -> Result<(H, MerklePath<H>), WitnessCacheError> {
        let witness = self
            .notes
            .get(note)
            .and_then(NoteWitnesses::current)
            .ok_or(WitnessCacheError::NoteNotYetObserved(*note))?;
        Ok((witness.root(), witness.path()?))
    }

    /// Current witness of each requested note, plus the anchor they share.
    ///
    /// The anchor is `None` when none of the notes has a witness.
    pub fn note_witnesses(
        &self,
        notes: &[NoteOutPoint],
    ) -> (Vec<Option<&Witness<H, DEPTH>>>, Option<H>) {
        let witnesses: Vec<_> = notes
            .iter()
            .map(|note| self.notes.get(note).and_then(NoteWitnesses::current))
            .collect();
        let anchor = witnesses.iter().flatten().last().map(|w| w.root());
        (witnesses, anchor)
    }
}
