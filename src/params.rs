// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Scheme parameters.
//!
//! `H` and `K` are construction-time (not compile-time) values rather than
//! const generics: the derived array sizes below are data, sized once at
//! construction and then fixed for the lifetime of a key.

use crate::error::{MssError, MssResult};

/// Winternitz + Merkle-tree parameters for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    /// Hash output size in bytes (`N = n/8`).
    pub n: usize,
    /// Tree height; the tree has `2^h` leaves.
    pub h: usize,
    /// Retain/treehash parameter, `0 <= k <= h-2`, `h-k` even.
    pub k: usize,
    /// `log2` of the Winternitz width `w` (e.g. 4 means `w = 16`).
    pub w_bits: usize,
}

impl Params {
    /// Validates and constructs a parameter set.
    pub fn new(n: usize, h: usize, k: usize, w_bits: usize) -> MssResult<Self> {
        if n == 0 || n > 32 {
            return Err(MssError::invalid_params(format!(
                "n must be in 1..=32 bytes, got {}",
                n
            )));
        }
        if h == 0 || h > 63 {
            return Err(MssError::invalid_params(format!(
                "h must be in 1..=63, got {}",
                h
            )));
        }
        if h < 2 || k > h - 2 {
            return Err(MssError::invalid_params(format!(
                "k must be in 0..=h-2, got k={} h={}",
                k, h
            )));
        }
        if (h - k) % 2 != 0 {
            return Err(MssError::invalid_params(format!(
                "h-k must be even, got h={} k={}",
                h, k
            )));
        }
        if !matches!(w_bits, 1 | 2 | 4 | 8) {
            return Err(MssError::invalid_params(format!(
                "w_bits must be one of 1, 2, 4, 8, got {}",
                w_bits
            )));
        }
        Ok(Self { n, h, k, w_bits })
    }

    /// A 128-bit-security, moderately deep parameter set with Winternitz
    /// width 16.
    pub fn default_128() -> Self {
        Self::new(16, 10, 4, 4).expect("default_128 parameters are self-consistent")
    }

    /// A small parameter set (`H=4, K=2, w=16, N=16`) sized for worked
    /// examples and fast tests rather than real-world security margins.
    pub fn spec_example() -> Self {
        Self::new(16, 4, 2, 4).expect("spec_example parameters are self-consistent")
    }

    /// Number of leaves, `2^h`.
    pub fn num_leaves(&self) -> u64 {
        1u64 << self.h
    }

    /// `w = 2^w_bits`.
    pub fn w(&self) -> usize {
        1usize << self.w_bits
    }

    /// `L1 = ceil(8n / w_bits)`: number of base-w digits covering one digest.
    pub fn l1(&self) -> usize {
        let bits = 8 * self.n;
        (bits + self.w_bits - 1) / self.w_bits
    }

    /// `L2 = floor(log2(L1*(w-1)) / w_bits) + 1`: checksum digit count.
    pub fn l2(&self) -> usize {
        let l1 = self.l1();
        let max_csum = (l1 as u64) * ((self.w() - 1) as u64);
        let log2_floor = 63 - max_csum.leading_zeros() as usize;
        log2_floor / self.w_bits + 1
    }

    /// `L = L1 + L2`, the number of hash chains in one W-OTS key/signature.
    pub fn l(&self) -> usize {
        self.l1() + self.l2()
    }

    /// Number of bytes needed to hold `l2` base-w digits.
    pub fn l2_bytes(&self) -> usize {
        (self.l2() * self.w_bits + 7) / 8
    }

    /// `TREEHASH_SIZE = H - K`.
    pub fn treehash_size(&self) -> usize {
        self.h - self.k
    }

    /// `RETAIN_SIZE = 2^K - K - 1`.
    pub fn retain_size(&self) -> usize {
        (1usize << self.k).saturating_sub(self.k + 1)
    }

    /// Number of distinct retain levels, `K - 1` (zero if `K <= 1`).
    pub fn retain_levels(&self) -> usize {
        self.k.saturating_sub(1)
    }

    /// Total number of retain entries reserved for retain level `level`
    /// (0-indexed among the `K-1` levels spanning tree heights
    /// `[H-K, H-2]`). This is also the largest legal value for
    /// `retain_index[level]`: reaching it means that level's precomputed
    /// entries are fully consumed. Summed across `0..retain_levels()`,
    /// these capacities add up to exactly `retain_size()`.
    pub fn retain_level_capacity(&self, level: usize) -> u64 {
        let hbar = self.k - level - 1;
        (1u64 << hbar) - 1
    }

    /// `KEEP_SIZE = H`.
    pub fn keep_size(&self) -> usize {
        self.h
    }

    /// Number of memoized "store" slots, `TREEHASH_SIZE - 1` (zero if that's <= 0).
    pub fn store_size(&self) -> usize {
        self.treehash_size().saturating_sub(1)
    }
}
