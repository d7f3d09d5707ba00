// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Error types for the Merkle signature scheme core.
//!
//! Kept as a small flat enum rather than a generic string-wrapping error:
//! named variants, no silent catch-all.

use thiserror::Error;

/// Errors produced by key generation, signing, verification, and (de)serialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MssError {
    /// Signing was attempted at `leaf_index == 2^H`; the key has no signatures left.
    #[error("signing key exhausted: all {0} leaves have been used")]
    ExhaustedKey(u64),

    /// A signature failed to verify against the claimed root.
    #[error("signature does not verify against the expected root")]
    InvalidSignature,

    /// Input bytes could not be parsed as a well-formed signature or node.
    #[error("malformed input: {reason}")]
    MalformedInput {
        /// Human-readable explanation of what was wrong with the input.
        reason: String,
    },

    /// Persisted state failed an invariant check on load.
    #[error("state corruption detected: {reason}")]
    StateCorruption {
        /// Human-readable explanation of the broken invariant.
        reason: String,
    },

    /// Construction-time parameters violate the scheme's constraints.
    #[error("invalid parameters: {reason}")]
    InvalidParams {
        /// Human-readable explanation of which constraint failed.
        reason: String,
    },
}

impl MssError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::StateCorruption {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type MssResult<T> = Result<T, MssError>;
