// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! The authentication-path traversal scheduler: `next_auth` advances the
//! signer from one leaf to the next, and `treehash_update` incrementally
//! grows one pending subtree by a single leaf's worth of work per call.
//! Together they amortize the cost of computing upcoming authentication
//! paths across every signature, rather than rebuilding a path from scratch
//! on demand.

use crate::error::{MssError, MssResult};
use crate::fsgen::fsgen_fast_forward;
use crate::hash::Compressor;
use crate::keygen::make_leaf;
use crate::node::{parent, Node};
use crate::params::Params;
use crate::state::{MerkleState, TreehashStatus, TREEHASH_HEIGHT_INFINITY};

/// `tau`: the number of trailing zero bits of `s+1`, i.e. the height at
/// which leaf `s` and leaf `s+1` share a lowest common ancestor change.
fn tau(s: u64) -> u32 {
    (s + 1).trailing_zeros()
}

/// Advances `state` from leaf `s` (just signed) to prepare the
/// authentication path for leaf `s+1`. `current_leaf` is the leaf node
/// that was just produced in order to sign leaf `s`. `x` is the
/// scheme-wide W-OTS public constant, needed here because treehash
/// instances must compute leaves ahead of the signer's current position.
pub fn next_auth(
    c: &dyn Compressor,
    params: &Params,
    state: &mut MerkleState,
    current_leaf: &Node,
    s: u64,
    x: &[u8],
) -> MssResult<()> {
    let h = params.h as u32;
    let tau = tau(s);
    tracing::trace!(s, tau, "next_auth");

    // Park the old auth node if leaf s+1's parent at tau+1 is even.
    if tau < h - 1 && ((s >> (tau + 1)) & 1) == 0 {
        state.keep[tau as usize] = state.auth[tau as usize].clone();
    }

    if tau == 0 {
        // next leaf is a right node; it was already computed as current_leaf.
        state.auth[0] = current_leaf.clone();
    } else {
        // next leaf is a left node.
        let refreshed = parent(
            c,
            &state.auth[(tau - 1) as usize],
            &state.keep[(tau - 1) as usize],
        );
        state.auth[tau as usize] = refreshed;

        let treehash_size = params.treehash_size() as u32;
        let min_h = (tau - 1).min(treehash_size.saturating_sub(1));
        for level in 0..=min_h {
            let level = level as usize;
            state.auth[level] = state.treehash[level].head.clone();

            let candidate = s + 1 + 3 * (1u64 << level);
            if candidate < params.num_leaves() {
                reinitialize_treehash(state, level, candidate);
            } else {
                state.treehash[level].status = TreehashStatus::Finished;
                state.treehash[level].tail_height = 0;
            }
        }

        for level in (params.h - params.k)..(tau as usize) {
            state.auth[level] = state.retain_pop(params, level)?;
        }
    }

    // Budget step: advance (H-K)/2 treehash instances, each picking the
    // one closest to completion. Scanning from the top level down and only
    // replacing the best on a strictly smaller height means a tie keeps the
    // first (highest) level seen, per the spec's largest-h tie-break.
    let updates = params.treehash_size() / 2;
    for _ in 0..updates {
        let mut best_level = params.treehash_size().saturating_sub(1);
        let mut best_height = TREEHASH_HEIGHT_INFINITY;
        for level in (0..params.treehash_size()).rev() {
            let height = state.treehash[level].comparator_height(level as u8);
            if height < best_height {
                best_height = height;
                best_level = level;
            }
        }
        if state.treehash[best_level].status != TreehashStatus::Finished {
            treehash_update(c, params, state, best_level, s, x)?;
        }
    }
    Ok(())
}

/// Restarts treehash instance `level` to build toward the new target leaf.
fn reinitialize_treehash(state: &mut MerkleState, level: usize, seed: u64) {
    state.treehash_seed[level] = seed;
    state.treehash[level].status = TreehashStatus::New;
    state.treehash[level].tail_height = 0;
}

/// Advances treehash instance `h` by one leaf, reusing a neighboring
/// instance's already-computed leaf where the schedule makes that possible
/// instead of recomputing it from the seed.
fn treehash_update(
    c: &dyn Compressor,
    params: &Params,
    state: &mut MerkleState,
    h: usize,
    s: u64,
    x: &[u8],
) -> MssResult<()> {
    let ts = state.treehash_seed[h];
    tracing::trace!(h, ts, "treehash_update");

    let reuse_from_store = h < params.treehash_size() - 1
        && ts >= 11 * (1u64 << h)
        && (ts - 11 * (1u64 << h)) % (1u64 << (h + 2)) == 0;

    let mut node1 = if reuse_from_store {
        let stored = state.store[h].clone().ok_or_else(|| {
            MssError::corrupt(format!(
                "treehash[{}] store slot empty at seed {} where the reuse schedule expects a cached leaf",
                h, ts
            ))
        })?;
        Node::leaf(ts, stored.value)
    } else {
        let r_ts = fsgen_fast_forward(c, &state.seed, ts - s);
        make_leaf(c, params, ts, &r_ts, x)
    };

    if h > 0
        && ts >= 11 * (1u64 << (h - 1))
        && (ts - 11 * (1u64 << (h - 1))) % (1u64 << (h + 1)) == 0
    {
        state.store[h - 1] = Some(node1.clone());
    }

    state.treehash_seed[h] = ts + 1;
    state.treehash[h].tail_height = 0;

    while !state.stack.is_empty()
        && state.treehash[h].tail_height as usize == state.stack.last().unwrap().height as usize
        && (state.treehash[h].tail_height as usize + 1) < h
    {
        let node2 = state.stack.pop().unwrap();
        node1 = parent(c, &node2, &node1);
        state.treehash[h].tail_height += 1;
    }

    if (state.treehash[h].tail_height as usize) + 1 < h {
        state.stack.push(node1.clone());
        state.treehash[h].status = TreehashStatus::Running;
        state.treehash[h].head = node1;
    } else {
        if state.treehash[h].status == TreehashStatus::Running && node1.index % 2 == 1 {
            let node2 = state.treehash[h].head.clone();
            node1 = parent(c, &node2, &node1);
            state.treehash[h].tail_height += 1;
        }
        let finished = node1.height as usize == h;
        state.treehash[h].head = node1;
        state.treehash[h].status = if finished {
            TreehashStatus::Finished
        } else {
            TreehashStatus::Running
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha256Compressor;
    use crate::keygen::keygen_walk;

    #[test]
    fn tau_matches_trailing_zeros() {
        assert_eq!(tau(0), 0); // s+1 = 1, which has 0 trailing zero bits
        assert_eq!(tau(1), 1); // s+1 = 2 = 0b10
        assert_eq!(tau(3), 2); // s+1 = 4 = 0b100
    }

    #[test]
    fn next_auth_advances_through_whole_tree() {
        let params = Params::spec_example();
        let c = Sha256Compressor::new(params.n);
        let seed = vec![0xA0u8; params.n];
        let x = c.hash(b"public-constant");

        let (mut state, _root) = keygen_walk(&c, &params, &seed, &x);

        for s in 0..(params.num_leaves() - 1) {
            let leaf = state.auth[0].clone();
            next_auth(&c, &params, &mut state, &leaf, s, &x).unwrap();
            for auth_node in &state.auth {
                assert_eq!(auth_node.value.len(), params.n);
            }
        }
    }
}
