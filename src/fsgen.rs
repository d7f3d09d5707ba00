// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Forward-secure pseudo-random generator.
//!
//! Each call derives two domain-separated values from one seed by hashing
//! the seed together with a distinct tag, rather than reusing one hash
//! output for two different purposes.

use crate::hash::{hash_concat, Compressor};

const SEED_TAG: &[u8] = b"mss-fsgen-seed-v1";
const R_TAG: &[u8] = b"mss-fsgen-r-v1";

/// Advances `seed_in` to `(seed_out, r)`. Both outputs are independent
/// pseudo-random functions of `seed_in`; disclosing either does not reveal
/// `seed_in` (both are one-way hash outputs, never an XOR or a substring).
pub fn fsgen(c: &dyn Compressor, seed_in: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let seed_out = hash_concat(c, seed_in, SEED_TAG);
    let r = hash_concat(c, seed_in, R_TAG);
    (seed_out, r)
}

/// Fast-forwards a scratch seed `steps` generations past `seed_at`, returning
/// only the final `r`. Used by `treehash_update` to derive `r` for a leaf
/// index ahead of the signer's current rolling seed without mutating it.
pub fn fsgen_fast_forward(c: &dyn Compressor, seed_at: &[u8], steps: u64) -> Vec<u8> {
    let mut seed = seed_at.to_vec();
    let mut r = Vec::new();
    for _ in 0..steps {
        let (next_seed, next_r) = fsgen(c, &seed);
        seed = next_seed;
        r = next_r;
    }
    r
}
