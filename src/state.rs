// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Merkle traversal state.
//!
//! This is the durable per-key state that the authentication-path scheduler
//! mutates in lock-step with the advancing leaf counter.

use crate::error::{MssError, MssResult};
use crate::node::Node;
use crate::params::Params;

/// Lifecycle of one treehash instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreehashStatus {
    New,
    Running,
    Finished,
}

/// One incremental subtree computation, producing the next auth node for
/// a given low level.
#[derive(Debug, Clone)]
pub struct TreehashInstance {
    pub status: TreehashStatus,
    /// Height of the tallest node folded into `head` so far.
    pub tail_height: u8,
    /// The completed head (if `Finished`) or tallest partial (if `Running`/`New`).
    pub head: Node,
}

impl TreehashInstance {
    fn new_placeholder(n: usize) -> Self {
        Self {
            status: TreehashStatus::Finished,
            tail_height: 0,
            head: Node::placeholder(n),
        }
    }

    /// Sentinel-bearing comparator used by the budget step to pick which
    /// treehash instance to advance next.
    pub fn comparator_height(&self, h: u8) -> u8 {
        match self.status {
            TreehashStatus::New => h,
            TreehashStatus::Finished => TREEHASH_HEIGHT_INFINITY,
            TreehashStatus::Running => {
                if self.tail_height == h {
                    TREEHASH_HEIGHT_INFINITY
                } else {
                    self.tail_height
                }
            }
        }
    }
}

/// Sentinel used only in algorithmic comparisons, never persisted to disk.
pub const TREEHASH_HEIGHT_INFINITY: u8 = 0x7F;

/// The full durable per-key traversal state.
#[derive(Debug, Clone)]
pub struct MerkleState {
    /// Next leaf index to sign.
    pub leaf_index: u64,
    /// Current forward-secure rolling seed.
    pub seed: Vec<u8>,
    /// Authentication path for `leaf_index`, one node per height `[0, H)`.
    pub auth: Vec<Node>,
    /// Per-level parked left-sibling nodes for even-tau transitions.
    pub keep: Vec<Node>,
    /// One incremental treehash instance per low level `[0, H-K)`.
    pub treehash: Vec<TreehashInstance>,
    /// Leaf index each treehash instance is currently advancing toward.
    pub treehash_seed: Vec<u64>,
    /// Shared computation stack used by treehash updates.
    pub stack: Vec<Node>,
    /// Precomputed right-child nodes for the top-K levels.
    pub retain: Vec<Node>,
    /// Per-level read cursor into `retain`, one per level `[H-K, H-2]`.
    pub retain_index: Vec<u64>,
    /// Memoized nodes shared between adjacent treehash levels.
    pub store: Vec<Option<Node>>,
}

impl MerkleState {
    /// Builds an empty state ready for the keygen walk to populate.
    pub fn new(params: &Params) -> Self {
        let h = params.h;
        let treehash_size = params.treehash_size();

        Self {
            leaf_index: 0,
            seed: vec![0u8; params.n],
            auth: (0..h).map(|_| Node::placeholder(params.n)).collect(),
            keep: (0..h).map(|_| Node::placeholder(params.n)).collect(),
            treehash: (0..treehash_size)
                .map(|_| TreehashInstance::new_placeholder(params.n))
                .collect(),
            treehash_seed: vec![0u64; treehash_size],
            stack: Vec::with_capacity(h),
            retain: (0..params.retain_size())
                .map(|_| Node::placeholder(params.n))
                .collect(),
            retain_index: vec![0u64; params.retain_levels()],
            store: vec![None; params.store_size()],
        }
    }

    /// Records a freshly computed node into auth/treehash/retain according
    /// to its position. Called once per node produced during the keygen walk.
    pub fn init_state(&mut self, params: &Params, node: &Node) {
        if node.index == 1 && (node.height as usize) < params.h {
            self.auth[node.height as usize] = node.clone();
        }
        if node.index == 3 && (node.height as usize) < params.treehash_size() {
            let h = node.height as usize;
            self.treehash[h] = TreehashInstance {
                status: TreehashStatus::Finished,
                tail_height: 0,
                head: node.clone(),
            };
            self.treehash_seed[h] = node.index;
        }
        if node.index >= 3
            && node.index % 2 == 1
            && (node.height as usize) >= params.h - params.k
            && (node.height as usize) < params.h - 1
        {
            self.retain_push(params, node);
        }
    }

    fn retain_push(&mut self, params: &Params, node: &Node) {
        let height = node.height as usize;
        let hbar = params.h - height - 1;
        let index = (1usize << hbar) - hbar - 1 + (node.index as usize >> 1) - 1;
        self.retain[index] = node.clone();
    }

    /// Reads and advances the per-level retain cursor for level `h`. A
    /// corrupted or adversarial `retain_index[level]` can push `index` past
    /// the end of `retain` (or overflow computing it); both are reported as
    /// [`MssError::StateCorruption`] rather than panicking, since this can
    /// be reached from a deserialized state that skipped validation, or
    /// from deserialized data whose corruption the loader's own checks
    /// didn't anticipate.
    pub fn retain_pop(&mut self, params: &Params, h: usize) -> MssResult<Node> {
        let hbar = params.h - h - 1;
        let level = h - (params.h - params.k);
        let base = (1usize << hbar) - hbar - 1;
        let index = base.checked_add(self.retain_index[level] as usize).ok_or_else(|| {
            MssError::corrupt(format!(
                "retain index computation overflowed at level {}",
                level
            ))
        })?;
        let node = self.retain.get(index).cloned().ok_or_else(|| {
            MssError::corrupt(format!(
                "retain index {} out of range for level {} ({} entries stored)",
                index,
                level,
                self.retain.len()
            ))
        })?;
        self.retain_index[level] += 1;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_expected_buffer_sizes() {
        let params = Params::spec_example();
        let state = MerkleState::new(&params);
        assert_eq!(state.auth.len(), params.h);
        assert_eq!(state.keep.len(), params.h);
        assert_eq!(state.treehash.len(), params.treehash_size());
        assert_eq!(state.treehash_seed.len(), params.treehash_size());
        assert_eq!(state.retain.len(), params.retain_size());
        assert_eq!(state.retain_index.len(), params.retain_levels());
        assert_eq!(state.store.len(), params.store_size());
    }

    #[test]
    fn comparator_height_sentinel_for_finished() {
        let node = Node::placeholder(16);
        let instance = TreehashInstance {
            status: TreehashStatus::Finished,
            tail_height: 0,
            head: node,
        };
        assert_eq!(instance.comparator_height(2), TREEHASH_HEIGHT_INFINITY);
    }

    #[test]
    fn comparator_height_for_new_is_its_level() {
        let node = Node::placeholder(16);
        let instance = TreehashInstance {
            status: TreehashStatus::New,
            tail_height: 0,
            head: node,
        };
        assert_eq!(instance.comparator_height(3), 3);
    }
}
