// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Sign/verify orchestration (C8): the owning key handle, the wire
//! [`Signature`] type, and the two entry points the rest of the world calls.

use subtle::ConstantTimeEq;

use crate::error::{MssError, MssResult};
use crate::fsgen::fsgen;
use crate::hash::{etcr_hash, Compressor, Sha256Compressor};
use crate::keygen::keygen_walk;
use crate::node::{parent, Node};
use crate::params::Params;
use crate::state::MerkleState;
use crate::traversal::next_auth;
use crate::wots::{scheme_x_constant, wots_digest_seed, wots_keygen, wots_sign, wots_verify};

/// A signature over one message: the leaf placeholder node (`v_node` in the
/// wire layout, carrying the leaf's claimed index), the authentication path,
/// and the W-OTS signature chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Height-0 node naming the leaf index this signature claims and the
    /// leaf value the signer computed for it. Verification never *trusts*
    /// `v_node.value` — see [`verify`]'s doc comment for why — only its
    /// `index` is taken on faith (and only matters insofar as it must match
    /// an authentication path the verifier does not control).
    pub v_node: Node,
    /// Sibling nodes of `v_node`'s ancestors, one per height `[0, H)`.
    pub authpath: Vec<Node>,
    /// The `L` W-OTS chain chunks.
    pub wots_sig: Vec<Vec<u8>>,
}

fn validate_signature_shape(params: &Params, sig: &Signature) -> MssResult<()> {
    if sig.authpath.len() != params.h {
        return Err(MssError::malformed(format!(
            "authpath has {} entries, expected H = {}",
            sig.authpath.len(),
            params.h
        )));
    }
    if sig.wots_sig.len() != params.l() {
        return Err(MssError::malformed(format!(
            "wots signature has {} chunks, expected L = {}",
            sig.wots_sig.len(),
            params.l()
        )));
    }
    if sig.v_node.index >= params.num_leaves() {
        return Err(MssError::malformed(format!(
            "leaf index {} out of range for 2^H = {}",
            sig.v_node.index,
            params.num_leaves()
        )));
    }
    for (height, sibling) in sig.authpath.iter().enumerate() {
        if sibling.height as usize != height {
            return Err(MssError::malformed(format!(
                "authpath[{}] carries height {}, expected {}",
                height, sibling.height, height
            )));
        }
        let level_width = params.num_leaves() >> height;
        if sibling.index >= level_width {
            return Err(MssError::malformed(format!(
                "authpath[{}] index {} out of range for level width {}",
                height, sibling.index, level_width
            )));
        }
    }
    Ok(())
}

/// An owning handle over one signer's key material and durable traversal
/// state. Exposes only `sign`/`verify`/state accessors — callers cannot
/// reach into `MerkleState` and hand-mutate a field.
pub struct Keypair {
    params: Params,
    compressor: Box<dyn Compressor>,
    x: Vec<u8>,
    state: MerkleState,
    root: Node,
}

impl Keypair {
    /// Generates a fresh keypair from `seed` (`params.n` bytes) using the
    /// default SHA-256 compressor.
    pub fn generate(params: Params, seed: &[u8]) -> MssResult<Self> {
        let compressor: Box<dyn Compressor> = Box::new(Sha256Compressor::new(params.n));
        Self::generate_with_compressor(params, seed, compressor)
    }

    /// As [`Keypair::generate`], but with a caller-supplied compressor
    /// backend (e.g. a non-default hash or a hardware-accelerated one).
    pub fn generate_with_compressor(
        params: Params,
        seed: &[u8],
        compressor: Box<dyn Compressor>,
    ) -> MssResult<Self> {
        if seed.len() != params.n {
            return Err(MssError::invalid_params(format!(
                "seed must be {} bytes, got {}",
                params.n,
                seed.len()
            )));
        }
        let x = scheme_x_constant(compressor.as_ref(), &params);
        let (state, root) = keygen_walk(compressor.as_ref(), &params, seed, &x);
        Ok(Self {
            params,
            compressor,
            x,
            state,
            root,
        })
    }

    /// Reassembles a keypair from previously persisted state (see
    /// [`crate::serialize`]), re-deriving `X` and the root hash rather than
    /// trusting a caller-supplied root.
    pub fn from_state(
        params: Params,
        compressor: Box<dyn Compressor>,
        state: MerkleState,
        root: Node,
    ) -> Self {
        let x = scheme_x_constant(compressor.as_ref(), &params);
        Self {
            params,
            compressor,
            x,
            state,
            root,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The root public key, `N` bytes.
    pub fn root(&self) -> &[u8] {
        &self.root.value
    }

    /// The durable traversal state, for persistence.
    pub fn state(&self) -> &MerkleState {
        &self.state
    }

    /// Next leaf index that will be used by `sign`.
    pub fn leaf_index(&self) -> u64 {
        self.state.leaf_index
    }

    /// How many signatures this key has left before [`MssError::ExhaustedKey`].
    pub fn remaining_signatures(&self) -> u64 {
        self.params.num_leaves() - self.state.leaf_index
    }

    /// Signs `message`, consuming the next leaf index and advancing the
    /// traversal state. Fails with [`MssError::ExhaustedKey`] without
    /// mutating any state if the key has no leaves left.
    pub fn sign(&mut self, message: &[u8]) -> MssResult<Signature> {
        let num_leaves = self.params.num_leaves();
        let leaf_index = self.state.leaf_index;
        if leaf_index >= num_leaves {
            return Err(MssError::ExhaustedKey(num_leaves));
        }
        tracing::debug!(leaf_index, "sign");

        let c = self.compressor.as_ref();
        let (next_seed, ri) = fsgen(c, &self.state.seed);
        let v = wots_keygen(c, &self.params, &ri, &self.x);
        let leaf_value = c.hash(&v);
        let digest = etcr_hash(c, &v, message);
        let wots_sig = wots_sign(c, &self.params, &ri, &self.x, &digest);

        let v_node = Node {
            height: 0,
            index: leaf_index,
            value: leaf_value,
        };
        let authpath = self.state.auth.clone();

        if leaf_index + 1 < num_leaves {
            next_auth(c, &self.params, &mut self.state, &v_node, leaf_index, &self.x)?;
        }

        // Only now, with every fallible step behind us, commit the advance:
        // a sign that fails partway must never have moved leaf_index.
        self.state.seed = next_seed;
        self.state.leaf_index = leaf_index + 1;

        Ok(Signature {
            v_node,
            authpath,
            wots_sig,
        })
    }

    /// Verifies `signature` over `message` against this key's own root.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> MssResult<()> {
        verify(
            &self.params,
            self.compressor.as_ref(),
            &self.root.value,
            message,
            signature,
        )
    }
}

/// Verifies `signature` over `message` against `root`, using `compressor`
/// for every hash call.
///
/// Resolves the ordering puzzle flagged in the design notes: the ETCR
/// digest is keyed by the W-OTS public value `v`, but the verifier does not
/// have `v` up front — only the signature chunks, which only become `v`
/// once completed to the chain top *at positions the digest itself picks*.
/// We break the circularity the way the reference appears to: first
/// complete every chunk to the top from position 0 (ignoring the real,
/// as-yet-unknown start positions) to get a value that is a deterministic
/// function of the signature bytes alone, use that to derive the digest,
/// and only then do the real completion (at the digest's actual start
/// positions) to recover the `v` that is hashed into the candidate leaf.
/// Tampering with any signature chunk changes the first pass's digest,
/// which changes the real completion's start positions, which changes the
/// candidate leaf and therefore the reconstructed root — there is no path
/// by which a tampered signature reconstructs the true root.
pub fn verify(
    params: &Params,
    compressor: &dyn Compressor,
    root: &[u8],
    message: &[u8],
    signature: &Signature,
) -> MssResult<()> {
    validate_signature_shape(params, signature)?;

    let x = scheme_x_constant(compressor, params);
    let digest_seed = wots_digest_seed(compressor, params, &x, &signature.wots_sig);
    let digest = etcr_hash(compressor, &digest_seed, message);
    let v = wots_verify(compressor, params, &x, &digest, &signature.wots_sig);
    let leaf_value = compressor.hash(&v);

    let mut candidate = Node {
        height: 0,
        index: signature.v_node.index,
        value: leaf_value,
    };
    for sibling in &signature.authpath {
        candidate = if sibling.index >= candidate.index {
            parent(compressor, &candidate, sibling)
        } else {
            parent(compressor, sibling, &candidate)
        };
    }

    let ok = candidate.height as usize == params.h
        && candidate.index == 0
        && bool::from(candidate.value.ct_eq(root));
    tracing::debug!(ok, "verify");

    if ok {
        Ok(())
    } else {
        Err(MssError::InvalidSignature)
    }
}
