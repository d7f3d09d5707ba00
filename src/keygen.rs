// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Key-generation walker.
//!
//! A height-based stack reduction that builds every leaf in index order,
//! feeding each freshly computed node through `MerkleState::init_state` and
//! folding nodes together whenever the running position is divisible by a
//! high enough power of two. The final node is the root.
//!
//! This walk keeps its own local stack rather than reusing the persisted
//! `keep[]` buffer's storage as scratch space. `state.keep` is left at its
//! placeholder values afterward, to be populated for real the first time
//! `next_auth` parks a node into it.

use crate::fsgen::fsgen;
use crate::hash::Compressor;
use crate::node::{parent, Node};
use crate::params::Params;
use crate::state::MerkleState;
use crate::wots::wots_keygen;

/// Computes leaf `index`'s node value: `leaf.value = H(WOTS_keygen(r, X))`.
pub fn make_leaf(c: &dyn Compressor, params: &Params, index: u64, r: &[u8], x: &[u8]) -> Node {
    let v = wots_keygen(c, params, r, x);
    Node::leaf(index, c.hash(&v))
}

/// Number of trailing zero bits of `v`, used to find how far up the stack
/// to fold after adding each new leaf.
fn trailing_zeros(v: u64) -> u32 {
    v.trailing_zeros()
}

/// Builds the full tree in index order, seeding `state` for `leaf_index = 0`
/// and returning the root public key.
pub fn keygen_walk(
    c: &dyn Compressor,
    params: &Params,
    seed: &[u8],
    x: &[u8],
) -> (MerkleState, Node) {
    let _span = tracing::info_span!("keygen_walk", h = params.h, k = params.k).entered();

    let mut state = MerkleState::new(params);
    let num_leaves = params.num_leaves();

    let mut si = seed.to_vec();
    let mut stack: Vec<Node> = Vec::with_capacity(params.h);
    let mut current: Option<Node> = None;

    for pos in 0..num_leaves {
        if num_leaves >= 1024 && pos % (num_leaves / 16) == 0 {
            tracing::debug!(pos, num_leaves, "keygen progress");
        }

        let (next_seed, ri) = fsgen(c, &si);
        si = next_seed;

        let mut node = make_leaf(c, params, pos, &ri, x);
        state.init_state(params, &node);

        // Fold while the node's height is below the number of trailing
        // zero bits of pos+1.
        while (node.height as u32) < trailing_zeros(pos + 1) {
            let left = stack.pop().expect("stack must hold a matching left sibling");
            node = parent(c, &left, &node);
            state.init_state(params, &node);
        }

        if (node.height as usize) < params.h {
            stack.push(node.clone());
        }
        current = Some(node);
    }

    let root = current.expect("at least one leaf must have been generated");
    // `state.seed` must stay the *original* input seed, not the seed the
    // local walk ended up at after consuming all 2^H leaves: signing leaf 0
    // re-derives r0 by calling fsgen on exactly the seed the walk started
    // from, so the signer's leaf values match what got baked into the tree.
    state.seed = seed.to_vec();
    (state, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha256Compressor;

    #[test]
    fn keygen_seeds_auth_path_for_leaf_zero() {
        let params = Params::spec_example();
        let c = Sha256Compressor::new(params.n);
        let seed = vec![0xA0u8; params.n];
        let x = c.hash(b"public-constant");

        let (state, root) = keygen_walk(&c, &params, &seed, &x);

        assert_eq!(root.height as usize, params.h);
        assert_eq!(root.index, 0);
        for auth_node in &state.auth {
            assert_eq!(auth_node.value.len(), params.n);
        }
    }

    #[test]
    fn keygen_is_deterministic_in_seed() {
        let params = Params::spec_example();
        let c = Sha256Compressor::new(params.n);
        let seed = vec![0x11u8; params.n];
        let x = c.hash(b"public-constant");

        let (_, root1) = keygen_walk(&c, &params, &seed, &x);
        let (_, root2) = keygen_walk(&c, &params, &seed, &x);
        assert_eq!(root1.value, root2.value);
    }

    #[test]
    fn different_seeds_give_different_roots() {
        let params = Params::spec_example();
        let c = Sha256Compressor::new(params.n);
        let x = c.hash(b"public-constant");

        let (_, root1) = keygen_walk(&c, &params, &vec![0x11u8; params.n], &x);
        let (_, root2) = keygen_walk(&c, &params, &vec![0x22u8; params.n], &x);
        assert_ne!(root1.value, root2.value);
    }
}
