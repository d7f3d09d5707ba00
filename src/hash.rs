// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Hash primitives.
//!
//! The scheme runs against an abstract fixed-size compression function;
//! this module pins down the concrete instantiation (SHA-256, truncated to
//! `n` bytes) behind a small [`Compressor`] trait so the rest of the crate
//! never calls `sha2` directly. Swapping in another digest, or another
//! output truncation, means implementing this one trait rather than
//! touching every call site.

use sha2::{Digest, Sha256};

/// A fixed-length cryptographic compression function, truncated to `n` bytes.
pub trait Compressor: Send + Sync {
    /// Output length in bytes for this compressor instance.
    fn n(&self) -> usize;

    /// Hashes an arbitrary-length input down to `n` bytes.
    fn hash(&self, data: &[u8]) -> Vec<u8>;
}

/// The default compressor: SHA-256 truncated to `n` bytes.
#[derive(Debug, Clone, Copy)]
pub struct Sha256Compressor {
    n: usize,
}

impl Sha256Compressor {
    /// Builds a compressor truncating SHA-256 output to `n` bytes (`n <= 32`).
    pub fn new(n: usize) -> Self {
        assert!(n <= 32, "SHA-256 only has 32 bytes of output to truncate");
        Self { n }
    }
}

impl Compressor for Sha256Compressor {
    fn n(&self) -> usize {
        self.n
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data)[..self.n].to_vec()
    }
}

/// Hashes the concatenation `left || right`, in that byte order. Used both
/// for internal Merkle node hashing and as a general two-block hash.
pub fn hash_concat(c: &dyn Compressor, left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(left.len() + right.len());
    buf.extend_from_slice(left);
    buf.extend_from_slice(right);
    c.hash(&buf)
}

/// ETCR-style message hash keyed by the leaf's W-OTS public value `v`:
/// `h = H(v || H(message))`. Hashing the message separately first keeps the
/// digest length fixed at `n` bytes regardless of message length.
pub fn etcr_hash(c: &dyn Compressor, v: &[u8], message: &[u8]) -> Vec<u8> {
    let message_digest = c.hash(message);
    hash_concat(c, v, &message_digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_n() {
        let c = Sha256Compressor::new(16);
        assert_eq!(c.hash(b"hello").len(), 16);
    }

    #[test]
    fn hash_concat_is_order_sensitive() {
        let c = Sha256Compressor::new(16);
        let a = c.hash(b"left");
        let b = c.hash(b"right");
        assert_ne!(hash_concat(&c, &a, &b), hash_concat(&c, &b, &a));
    }

    #[test]
    fn etcr_hash_is_keyed_by_v() {
        let c = Sha256Compressor::new(16);
        let v1 = c.hash(b"v1");
        let v2 = c.hash(b"v2");
        assert_ne!(etcr_hash(&c, &v1, b"msg"), etcr_hash(&c, &v2, b"msg"));
    }
}
