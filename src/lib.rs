// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! A stateful, hash-based Merkle signature scheme: Winternitz one-time
//! signatures (W-OTS) chained under a single Merkle authentication tree,
//! traversed with the BDS/Szydlo treehash-K algorithm so that each
//! successive authentication path costs only `O(log N)` amortized hashes
//! and `O(log N + 2^K)` memory, rather than `O(N)` of either.
//!
//! A [`Keypair`] owns exactly one private key and its durable traversal
//! state; it signs at most `2^H` messages, one per leaf, and refuses to
//! reuse a leaf index. [`verify`] checks a [`Signature`] against a root
//! public key with no access to any private state at all.
//!
//! ```
//! use mss::{Keypair, Params};
//!
//! let params = Params::spec_example();
//! let seed = vec![0xA0u8; params.n];
//! let mut signer = Keypair::generate(params, &seed).unwrap();
//!
//! let sig = signer.sign(b"hello").unwrap();
//! assert!(signer.verify(b"hello", &sig).is_ok());
//! ```

pub mod error;
pub mod fsgen;
pub mod hash;
pub mod keygen;
pub mod node;
pub mod params;
pub mod serialize;
pub mod signer;
pub mod state;
pub mod traversal;
pub mod wots;

pub use error::{MssError, MssResult};
pub use node::Node;
pub use params::Params;
pub use signer::{verify, Keypair, Signature};
pub use state::MerkleState;
