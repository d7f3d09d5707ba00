// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Byte-exact persistence of [`MerkleState`].
//!
//! Follows the field order of the reference layout (leaf_index,
//! treehash_state, stack_index, retain_index, treehash_seed, treehash,
//! stack, retain, keep, auth, store, seed) with two documented widenings:
//! every index-valued or leaf-scale field (`leaf_index`, node `index`,
//! `retain_index`, `treehash_seed`) is serialized as an 8-byte little-endian
//! integer rather than 2 or 3 bytes, so the format supports the full `H` up
//! to 63 the parameter validation allows instead of only `H <= 16`. Counts
//! that are bounded by `H` itself (`stack_index`, the per-level `tailheight`
//! packed into `treehash_state`) are left at their original width.

use std::convert::TryInto;

use crate::error::{MssError, MssResult};
use crate::node::Node;
use crate::params::Params;
use crate::signer::Signature;
use crate::state::{MerkleState, TreehashInstance, TreehashStatus};

const STATE_FLAG_NEW: u8 = 0x20;
const STATE_FLAG_RUNNING: u8 = 0x40;
const STATE_FLAG_FINISHED: u8 = 0x80;
const TAILHEIGHT_MASK: u8 = 0x1F;

fn encode_node(out: &mut Vec<u8>, node: &Node) {
    out.push(node.height);
    out.extend_from_slice(&node.index.to_le_bytes());
    out.extend_from_slice(&node.value);
}

fn encode_treehash_flag(instance: &TreehashInstance) -> u8 {
    let flag = match instance.status {
        TreehashStatus::New => STATE_FLAG_NEW,
        TreehashStatus::Running => STATE_FLAG_RUNNING,
        TreehashStatus::Finished => STATE_FLAG_FINISHED,
    };
    flag | (instance.tail_height & TAILHEIGHT_MASK)
}

/// A cursor over a byte slice that turns "ran out of bytes" into
/// [`MssError::MalformedInput`] instead of panicking, since this reader is
/// also used to decode adversarial signature/node bytes, not just trusted
/// local state.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> MssResult<&'a [u8]> {
        if self.pos + len > self.bytes.len() {
            return Err(MssError::malformed(format!(
                "expected {} more bytes at offset {}, only {} remain",
                len,
                self.pos,
                self.bytes.len() - self.pos.min(self.bytes.len())
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> MssResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u64(&mut self) -> MssResult<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_node(&mut self, n: usize) -> MssResult<Node> {
        let height = self.read_u8()?;
        let index = self.read_u64()?;
        let value = self.take(n)?.to_vec();
        Ok(Node {
            height,
            index,
            value,
        })
    }

    fn finished(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

fn decode_treehash_instance(flag_byte: u8, head: Node) -> MssResult<TreehashInstance> {
    let tail_height = flag_byte & TAILHEIGHT_MASK;
    let status = match flag_byte & !TAILHEIGHT_MASK {
        STATE_FLAG_NEW => TreehashStatus::New,
        STATE_FLAG_RUNNING => TreehashStatus::Running,
        STATE_FLAG_FINISHED => TreehashStatus::Finished,
        other => {
            return Err(MssError::corrupt(format!(
                "treehash state byte has unknown flag bits 0x{:02x}",
                other
            )))
        }
    };
    Ok(TreehashInstance {
        status,
        tail_height,
        head,
    })
}

/// Serializes `state` to its persisted byte form. `params` must be the same
/// parameter set the state was built under (callers are expected to
/// persist `params` alongside the state bytes separately; this function
/// does not embed them).
pub fn serialize_state(params: &Params, state: &MerkleState) -> Vec<u8> {
    let n = params.n;
    let mut out = Vec::new();

    out.extend_from_slice(&state.leaf_index.to_le_bytes());

    for instance in &state.treehash {
        out.push(encode_treehash_flag(instance));
    }

    out.extend_from_slice(&(state.stack.len() as u64).to_le_bytes());

    for &idx in &state.retain_index {
        out.extend_from_slice(&idx.to_le_bytes());
    }

    for &ts in &state.treehash_seed {
        out.extend_from_slice(&ts.to_le_bytes());
    }

    for instance in &state.treehash {
        encode_node(&mut out, &instance.head);
    }

    for node in &state.stack {
        encode_node(&mut out, node);
    }

    for node in &state.retain {
        encode_node(&mut out, node);
    }

    for node in &state.keep {
        encode_node(&mut out, node);
    }

    for node in &state.auth {
        encode_node(&mut out, node);
    }

    for slot in &state.store {
        match slot {
            Some(node) => {
                out.push(1);
                encode_node(&mut out, node);
            }
            None => out.push(0),
        }
    }

    out.extend_from_slice(&state.seed);
    debug_assert_eq!(state.seed.len(), n);

    out
}

/// Reconstructs a [`MerkleState`] from bytes produced by [`serialize_state`],
/// validating the invariants spec.md §6/§7 call out: unknown treehash flag
/// bits, an out-of-range tailheight, or `leaf_index` exceeding `2^H` are all
/// `StateCorruption`, not a panic.
pub fn deserialize_state(params: &Params, bytes: &[u8]) -> MssResult<MerkleState> {
    let n = params.n;
    let h = params.h;
    let treehash_size = params.treehash_size();
    let mut r = Reader::new(bytes);

    let leaf_index = r.read_u64()?;
    if leaf_index > params.num_leaves() {
        return Err(MssError::corrupt(format!(
            "leaf_index {} exceeds 2^H = {}",
            leaf_index,
            params.num_leaves()
        )));
    }

    let mut flags = Vec::with_capacity(treehash_size);
    for _ in 0..treehash_size {
        flags.push(r.read_u8()?);
    }

    let stack_len = r.read_u64()? as usize;

    let mut retain_index = Vec::with_capacity(params.retain_levels());
    for level in 0..params.retain_levels() {
        let idx = r.read_u64()?;
        let capacity = params.retain_level_capacity(level);
        if idx > capacity {
            return Err(MssError::corrupt(format!(
                "retain_index[{}] = {} exceeds level capacity {}",
                level, idx, capacity
            )));
        }
        retain_index.push(idx);
    }

    let mut treehash_seed = Vec::with_capacity(treehash_size);
    for _ in 0..treehash_size {
        treehash_seed.push(r.read_u64()?);
    }

    let mut treehash = Vec::with_capacity(treehash_size);
    for (level, &flag) in flags.iter().enumerate() {
        let head = r.read_node(n)?;
        let tail_height = flag & TAILHEIGHT_MASK;
        if tail_height as usize >= h {
            return Err(MssError::corrupt(format!(
                "treehash[{}] tailheight {} >= H {}",
                level, tail_height, h
            )));
        }
        treehash.push(decode_treehash_instance(flag, head)?);
    }

    if stack_len > h {
        return Err(MssError::corrupt(format!(
            "stack length {} exceeds H {}",
            stack_len, h
        )));
    }
    let mut stack = Vec::with_capacity(stack_len);
    for _ in 0..stack_len {
        stack.push(r.read_node(n)?);
    }

    let mut retain = Vec::with_capacity(params.retain_size());
    for _ in 0..params.retain_size() {
        retain.push(r.read_node(n)?);
    }

    let mut keep = Vec::with_capacity(h);
    for _ in 0..h {
        keep.push(r.read_node(n)?);
    }

    let mut auth = Vec::with_capacity(h);
    for _ in 0..h {
        auth.push(r.read_node(n)?);
    }

    let mut store = Vec::with_capacity(params.store_size());
    for _ in 0..params.store_size() {
        let present = r.read_u8()?;
        store.push(match present {
            0 => None,
            1 => Some(r.read_node(n)?),
            other => {
                return Err(MssError::malformed(format!(
                    "store presence byte must be 0 or 1, got {}",
                    other
                )))
            }
        });
    }

    let seed = r.take(n)?.to_vec();

    if !r.finished() {
        return Err(MssError::malformed(
            "trailing bytes after a fully-decoded state",
        ));
    }

    Ok(MerkleState {
        leaf_index,
        seed,
        auth,
        keep,
        treehash,
        treehash_seed,
        stack,
        retain,
        retain_index,
        store,
    })
}

/// Serializes a [`Signature`] per spec.md §6: `v_node || authpath[0..H) ||
/// wots_sig[L*N]`, each chunk of `wots_sig` being exactly `n` bytes.
pub fn serialize_signature(signature: &Signature) -> Vec<u8> {
    let mut out = Vec::new();
    encode_node(&mut out, &signature.v_node);
    for node in &signature.authpath {
        encode_node(&mut out, node);
    }
    for chunk in &signature.wots_sig {
        out.extend_from_slice(chunk);
    }
    out
}

/// Reconstructs a [`Signature`] from bytes produced by
/// [`serialize_signature`]. `h` is the tree height and `l` the W-OTS chain
/// count, needed because the byte stream carries no explicit field count;
/// `n` is the hash output size all node values and chunks share.
pub fn deserialize_signature(params: &Params, bytes: &[u8]) -> MssResult<Signature> {
    let n = params.n;
    let mut r = Reader::new(bytes);

    let v_node = r.read_node(n)?;
    let mut authpath = Vec::with_capacity(params.h);
    for _ in 0..params.h {
        authpath.push(r.read_node(n)?);
    }
    let mut wots_sig = Vec::with_capacity(params.l());
    for _ in 0..params.l() {
        wots_sig.push(r.take(n)?.to_vec());
    }

    if !r.finished() {
        return Err(MssError::malformed(
            "trailing bytes after a fully-decoded signature",
        ));
    }

    Ok(Signature {
        v_node,
        authpath,
        wots_sig,
    })
}
