// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Winternitz One-Time Signature subsystem.
//!
//! Plain W-OTS over a scheme-wide fixed constant `X`: each chain is
//! repeatedly hashed with key material derived from `X`, rather than
//! deriving a fresh `pk_seed` per keypair and XORing in a bitmask at every
//! chain step the way WOTS+ does. The base-`w` digit decomposition
//! (`base_w`) and checksum packing below work over a runtime `w_bits`
//! parameter rather than a fixed module constant.

use crate::hash::{hash_concat, Compressor};
use crate::params::Params;

/// Derives the scheme-wide public constant `X` deterministically from the
/// parameter set, rather than drawing it at random per key: every signer
/// using the same `(n, h, k, w)` shares the same `X`, as spec'd.
pub fn scheme_x_constant(c: &dyn Compressor, params: &Params) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(b"mss-wots-x-constant-v1");
    buf.extend_from_slice(&(params.n as u64).to_be_bytes());
    buf.extend_from_slice(&(params.h as u64).to_be_bytes());
    buf.extend_from_slice(&(params.k as u64).to_be_bytes());
    buf.extend_from_slice(&(params.w_bits as u64).to_be_bytes());
    c.hash(&buf)
}

/// Completes every signature chunk to the top of its chain *without*
/// knowing the real digest-derived start positions (treating each chunk as
/// though it sat at position 0). This exists only to break the circularity
/// flagged in the design notes: the verifier needs a digest before it can
/// recover the real `v`, but the ETCR digest is keyed by `v` itself. Hashing
/// the signature this way yields a value that is a deterministic function
/// of the signature bytes alone, safe to use as the ETCR key; the *real*
/// candidate `v` used to reconstruct the leaf always comes from
/// [`wots_verify`] called with the digest this produces.
pub fn wots_digest_seed(c: &dyn Compressor, params: &Params, x: &[u8], sig: &[Vec<u8>]) -> Vec<u8> {
    let l = params.l();
    let w = params.w();
    let mut concat = Vec::with_capacity(l * params.n);

    for (i, chunk) in sig.iter().enumerate().take(l) {
        let top = chain(c, x, i, 0, chunk, w - 1);
        concat.extend_from_slice(&top);
    }

    c.hash(&concat)
}

/// Derives the i-th secret chain's starting value from per-leaf randomness `r`.
fn chain_seed(c: &dyn Compressor, r: &[u8], chain_index: usize) -> Vec<u8> {
    hash_concat(c, r, &(chain_index as u64).to_be_bytes())
}

/// Derives the keyed hash applied at step `pos` of chain `chain_index`,
/// binding in the scheme-wide constant `X` so each step is independently
/// keyed by its chain and position.
fn chain_key(c: &dyn Compressor, x: &[u8], chain_index: usize, pos: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(x.len() + 16);
    buf.extend_from_slice(x);
    buf.extend_from_slice(&(chain_index as u64).to_be_bytes());
    buf.extend_from_slice(&(pos as u64).to_be_bytes());
    c.hash(&buf)
}

/// Applies `steps` iterations of the keyed hash chain to `input`, starting
/// at position `start_pos` within chain `chain_index`.
pub fn chain(
    c: &dyn Compressor,
    x: &[u8],
    chain_index: usize,
    start_pos: usize,
    input: &[u8],
    steps: usize,
) -> Vec<u8> {
    let mut out = input.to_vec();
    for s in 0..steps {
        let key = chain_key(c, x, chain_index, start_pos + s);
        out = hash_concat(c, &key, &out);
    }
    out
}

/// Converts a byte slice into `len` big-endian base-`w` digits, where
/// `w = 2^w_bits`.
pub fn base_w(bytes: &[u8], len: usize, w_bits: usize) -> Vec<u8> {
    let mut b = bytes[bytes.len() - 1] as usize;
    let mut bi = bytes.len() - 1;
    let mut symbols = vec![0u8; len];
    let mut bits: isize = 8;

    for i in (0..len).rev() {
        symbols[i] = (b % (1usize << w_bits)) as u8;
        b /= 1usize << w_bits;
        bits -= w_bits as isize;
        if bits <= w_bits as isize {
            bits += 8;
            if bi > 0 {
                bi -= 1;
                b += (bytes[bi] as usize) << bits;
            }
        }
    }

    symbols
}

/// Splits an `n`-byte digest into `L1` message digits plus `L2` checksum
/// digits such that `sum(symbols) = L1*(w-1)`, so any digest change
/// strictly shortens at least one chain.
pub fn symbols_for_digest(params: &Params, digest: &[u8]) -> Vec<u8> {
    let l1 = params.l1();
    let l2 = params.l2();
    let w = params.w() as u64;

    let mut symbols = vec![0u8; l1 + l2];
    symbols[..l1].copy_from_slice(&base_w(digest, l1, params.w_bits));

    let csum: u64 = symbols[..l1]
        .iter()
        .map(|&sym| (w - 1) - sym as u64)
        .sum();

    let l2_bytes = params.l2_bytes();
    let shift = l2_bytes * 8 - l2 * params.w_bits;
    let csum_shifted = csum << shift;
    let csum_bytes = csum_shifted.to_be_bytes();
    let csum_bytes = &csum_bytes[8 - l2_bytes..];

    symbols[l1..].copy_from_slice(&base_w(csum_bytes, l2, params.w_bits));
    symbols
}

/// Computes the W-OTS public value `v = H(chain_0_top || ... || chain_{L-1}_top)`
/// from per-leaf randomness `r` and the scheme-wide constant `X`.
pub fn wots_keygen(c: &dyn Compressor, params: &Params, r: &[u8], x: &[u8]) -> Vec<u8> {
    let l = params.l();
    let w = params.w();
    let mut concat = Vec::with_capacity(l * params.n);

    for i in 0..l {
        let sk_i = chain_seed(c, r, i);
        let top = chain(c, x, i, 0, &sk_i, w - 1);
        concat.extend_from_slice(&top);
    }

    c.hash(&concat)
}

/// Produces an `L`-chunk W-OTS signature over `digest` using per-leaf
/// randomness `r` and the scheme-wide constant `X`.
pub fn wots_sign(
    c: &dyn Compressor,
    params: &Params,
    r: &[u8],
    x: &[u8],
    digest: &[u8],
) -> Vec<Vec<u8>> {
    let symbols = symbols_for_digest(params, digest);
    let l = params.l();
    let mut sig = Vec::with_capacity(l);

    for i in 0..l {
        let sk_i = chain_seed(c, r, i);
        sig.push(chain(c, x, i, 0, &sk_i, symbols[i] as usize));
    }

    sig
}

/// Completes each signature chunk's chain to the top (`w-1` steps total)
/// and hashes the result into the candidate public value `v`.
pub fn wots_verify(
    c: &dyn Compressor,
    params: &Params,
    x: &[u8],
    digest: &[u8],
    sig: &[Vec<u8>],
) -> Vec<u8> {
    let symbols = symbols_for_digest(params, digest);
    let l = params.l();
    let w = params.w();
    let mut concat = Vec::with_capacity(l * params.n);

    for i in 0..l {
        let remaining = w - 1 - symbols[i] as usize;
        let top = chain(c, x, i, symbols[i] as usize, &sig[i], remaining);
        concat.extend_from_slice(&top);
    }

    c.hash(&concat)
}
