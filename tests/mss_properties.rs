// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! End-to-end scenarios and cross-module invariants that don't belong to
//! any single source file: full key lifecycles, tamper detection, and
//! serialization round trips against a running signer.

use mss::serialize::{deserialize_signature, deserialize_state, serialize_signature, serialize_state};
use mss::state::{MerkleState, TreehashInstance, TreehashStatus};
use mss::{Keypair, MssError, Node, Params};

fn small_params() -> Params {
    // H=4, K=2, w=16 (w_bits=4), N=16: the worked example from spec.md §8.
    Params::new(16, 4, 2, 4).unwrap()
}

fn small_seed() -> Vec<u8> {
    // `A0 A1 ... AF` repeated to N=16 bytes is exactly 16 bytes already.
    (0xA0u8..=0xAF).collect()
}

/// E1: sign all 16 leaves of an H=4 key, verify every one, then confirm the
/// 17th sign attempt is rejected.
#[test]
fn e1_sign_every_leaf_then_exhaust() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();

    let mut sigs = Vec::new();
    for i in 0u8..16 {
        let msg: Vec<u8> = (0x00u8..=0x0F).map(|b| b ^ i).collect();
        let sig = kp.sign(&msg).unwrap();
        assert!(kp.verify(&msg, &sig).is_ok(), "leaf {} failed to verify", i);
        sigs.push((msg, sig));
    }

    match kp.sign(b"one too many") {
        Err(MssError::ExhaustedKey(n)) => assert_eq!(n, 16),
        other => panic!("expected ExhaustedKey, got {:?}", other),
    }

    // every earlier signature still verifies after the key is exhausted.
    for (msg, sig) in &sigs {
        assert!(kp.verify(msg, sig).is_ok());
    }
}

/// E2: signing the same plaintext at distinct leaves produces distinct,
/// all-valid signatures.
#[test]
fn e2_repeated_plaintext_yields_distinct_signatures() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();

    let sig0 = kp.sign(b"hello").unwrap();
    let sig1 = kp.sign(b"world").unwrap();
    let sig2 = kp.sign(b"hello").unwrap();

    assert!(kp.verify(b"hello", &sig0).is_ok());
    assert!(kp.verify(b"world", &sig1).is_ok());
    assert!(kp.verify(b"hello", &sig2).is_ok());

    assert_ne!(sig0, sig1);
    assert_ne!(sig0, sig2);
    assert_ne!(sig1, sig2);
}

/// E3: a genuine signature presented against the wrong message fails.
#[test]
fn e3_signature_rejected_for_wrong_message() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();

    let mut last_sig = None;
    for i in 0u8..8 {
        last_sig = Some(kp.sign(&[i]).unwrap());
    }
    let sig7 = last_sig.unwrap();

    // sig7 was produced over message `[7]`, not `[3]`.
    assert_eq!(kp.verify(&[3u8], &sig7), Err(MssError::InvalidSignature));
}

/// E4: flipping a single byte of one authpath node's value anywhere breaks
/// verification.
#[test]
fn e4_single_bit_flip_in_authpath_breaks_verification() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();

    for _ in 0..5 {
        kp.sign(b"filler").unwrap();
    }
    let mut sig5 = kp.sign(b"fifth signature").unwrap();
    sig5.authpath[2].value[0] ^= 0b0000_0001;

    assert_eq!(
        kp.verify(b"fifth signature", &sig5),
        Err(MssError::InvalidSignature)
    );
}

/// E5: signing after a persisted-state restart is bit-identical to signing
/// without ever persisting, given the same message.
#[test]
fn e5_restart_from_persisted_state_reproduces_signature() {
    let params = small_params();
    let seed = small_seed();

    let mut reference = Keypair::generate(params, &seed).unwrap();
    for i in 0..4u8 {
        reference.sign(&[i]).unwrap();
    }
    let reference_sig4 = reference.sign(b"sign #4").unwrap();

    let mut restarted = Keypair::generate(params, &seed).unwrap();
    for i in 0..4u8 {
        restarted.sign(&[i]).unwrap();
    }
    let state_bytes = serialize_state(&params, restarted.state());
    let restored_state = deserialize_state(&params, &state_bytes).unwrap();

    let compressor: Box<dyn mss::hash::Compressor> =
        Box::new(mss::hash::Sha256Compressor::new(params.n));
    let root_node = mss::Node {
        height: params.h as u8,
        index: 0,
        value: restarted.root().to_vec(),
    };
    let mut resumed = Keypair::from_state(params, compressor, restored_state, root_node);
    let resumed_sig4 = resumed.sign(b"sign #4").unwrap();

    assert_eq!(serialize_signature(&reference_sig4), serialize_signature(&resumed_sig4));
}

/// E6: after signing leaf 5 (the sixth signature, s=5), the authentication
/// path prepared for leaf 6 must name siblings at exactly these indices.
#[test]
fn e6_authpath_indices_after_signing_leaf_five() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();

    for i in 0..6u8 {
        kp.sign(&[i]).unwrap();
    }

    let auth = &kp.state().auth;
    let indices: Vec<u64> = auth.iter().map(|n| n.index).collect();
    assert_eq!(indices, vec![7, 2, 0, 1]);
}

/// Property: flipping any single byte across the whole serialized signature
/// causes verification to fail (tamper detection, spec.md §8 property 7).
#[test]
fn tamper_detection_across_whole_signature() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();
    let sig = kp.sign(b"tamper sweep").unwrap();
    let bytes = serialize_signature(&sig);

    // Sampling rather than every byte keeps the test fast; each position
    // sampled is a distinct field (v_node, an authpath node, a wots chunk).
    let sample_positions = [0, 1, 17, 33, params.n, bytes.len() / 2, bytes.len() - 1];
    for &pos in &sample_positions {
        let mut tampered = bytes.clone();
        tampered[pos] ^= 0x01;
        let tampered_sig = match deserialize_signature(&params, &tampered) {
            Ok(s) => s,
            Err(_) => continue, // a malformed shape is an equally valid rejection.
        };
        assert_eq!(
            kp.verify(b"tamper sweep", &tampered_sig),
            Err(MssError::InvalidSignature),
            "tampering byte {} did not invalidate the signature",
            pos
        );
    }
}

/// Property: the root returned by keygen matches what a freshly-constructed
/// verifier reconstructs for every signature in the key's lifetime.
#[test]
fn root_stability_across_full_key_lifetime() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();
    let root = kp.root().to_vec();

    for i in 0..params.num_leaves() {
        let msg = format!("msg-{}", i);
        let sig = kp.sign(msg.as_bytes()).unwrap();
        let compressor = mss::hash::Sha256Compressor::new(params.n);
        assert!(mss::verify(&params, &compressor, &root, msg.as_bytes(), &sig).is_ok());
    }
}

/// Property: leaf_index advances monotonically and a sign that fails
/// (exhausted key) never mutates leaf_index further.
#[test]
fn leaf_index_is_monotonic_and_exhaustion_is_stable() {
    let params = small_params();
    let mut kp = Keypair::generate(params, &small_seed()).unwrap();

    let mut last = kp.leaf_index();
    for i in 0..params.num_leaves() {
        assert_eq!(kp.leaf_index(), i);
        kp.sign(format!("m{}", i).as_bytes()).unwrap();
        assert!(kp.leaf_index() > last);
        last = kp.leaf_index();
    }

    assert_eq!(kp.leaf_index(), params.num_leaves());
    for _ in 0..3 {
        assert!(matches!(kp.sign(b"x"), Err(MssError::ExhaustedKey(_))));
        assert_eq!(kp.leaf_index(), params.num_leaves());
    }
}

/// A corrupted `retain_index` that reaches past the level's stored entries
/// must surface as [`MssError::StateCorruption`] from `sign`, not a panic,
/// even when the corruption entered through `Keypair::from_state` rather
/// than through `deserialize_state`'s own validation.
#[test]
fn sign_with_corrupted_retain_index_returns_error_not_panic() {
    let params = small_params();
    let compressor: Box<dyn mss::hash::Compressor> =
        Box::new(mss::hash::Sha256Compressor::new(params.n));
    let (mut state, root) = mss::keygen::keygen_walk(
        compressor.as_ref(),
        &params,
        &small_seed(),
        &mss::wots::scheme_x_constant(compressor.as_ref(), &params),
    );
    state.retain_index[0] = u64::MAX;

    let root_node = Node {
        height: params.h as u8,
        index: 0,
        value: root.value.clone(),
    };
    let mut kp = Keypair::from_state(params, compressor, state, root_node);

    let mut saw_corruption = false;
    for i in 0..params.num_leaves() {
        match kp.sign(format!("m{}", i).as_bytes()) {
            Ok(_) => {}
            Err(MssError::StateCorruption { .. }) => {
                saw_corruption = true;
                break;
            }
            other => panic!("expected Ok or StateCorruption, got {:?}", other),
        }
    }
    assert!(saw_corruption, "corrupted retain_index never surfaced as StateCorruption");
}

/// A treehash instance whose reuse schedule expects a cached leaf in
/// `store`, but finds `None`, must surface as `StateCorruption` rather than
/// panicking on the `.unwrap()`/`.expect()` that would otherwise fire.
#[test]
fn sign_with_missing_store_entry_returns_error_not_panic() {
    let params = small_params();
    let n = params.n;
    let h = params.h;

    let state = MerkleState {
        leaf_index: 0,
        seed: vec![0u8; n],
        auth: (0..h).map(|_| Node::placeholder(n)).collect(),
        keep: (0..h).map(|_| Node::placeholder(n)).collect(),
        treehash: vec![
            TreehashInstance {
                status: TreehashStatus::New,
                tail_height: 0,
                head: Node::placeholder(n),
            },
            TreehashInstance {
                status: TreehashStatus::Finished,
                tail_height: 0,
                head: Node::placeholder(n),
            },
        ],
        treehash_seed: vec![11, 0],
        stack: Vec::new(),
        retain: vec![Node::placeholder(n)],
        retain_index: vec![0],
        store: vec![None],
    };

    let compressor: Box<dyn mss::hash::Compressor> =
        Box::new(mss::hash::Sha256Compressor::new(n));
    let root_node = Node {
        height: h as u8,
        index: 0,
        value: vec![0u8; n],
    };
    let mut kp = Keypair::from_state(params, compressor, state, root_node);

    match kp.sign(b"trigger missing store slot") {
        Err(MssError::StateCorruption { .. }) => {}
        other => panic!("expected StateCorruption, got {:?}", other),
    }
}
