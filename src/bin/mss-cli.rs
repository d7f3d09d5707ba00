// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Small demonstration CLI around the core: `keygen` / `sign` / `verify` /
//! `inspect-state`. Not a production signing service — it holds key state
//! in a flat file with no locking, so concurrent invocations against the
//! same state file are exactly the unsound double-sign scenario spec.md §5
//! warns about. A real deployment needs the compare-and-swap persistence
//! layer spec.md §5 describes; this tool is a harness for trying the core
//! out, matching the role the original benchmarking driver played.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use mss::serialize::{deserialize_signature, deserialize_state, serialize_signature, serialize_state};
use mss::signer::verify;
use mss::{Keypair, Node, Params};

#[derive(Parser)]
#[clap(name = "mss-cli", about = "Merkle signature scheme demonstration CLI")]
struct Cli {
    #[clap(long, default_value = "16")]
    n: usize,
    #[clap(long, default_value = "10")]
    height: usize,
    #[clap(long, default_value = "4")]
    k: usize,
    #[clap(long = "winternitz-w-bits", default_value = "4")]
    w_bits: usize,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generates a new key from a hex-encoded seed, printing the root and
    /// writing state + root to `--state-file`.
    Keygen {
        #[clap(long)]
        seed_hex: String,
        #[clap(long)]
        state_file: PathBuf,
    },
    /// Signs a message, reading and rewriting `--state-file`.
    Sign {
        #[clap(long)]
        state_file: PathBuf,
        message: String,
    },
    /// Verifies a hex-encoded signature (as printed by `sign`) against a
    /// hex-encoded root.
    Verify {
        #[clap(long)]
        root_hex: String,
        #[clap(long)]
        signature_hex: String,
        message: String,
    },
    /// Prints the traversal-state summary (leaf index, remaining sigs,
    /// treehash instance statuses) without exposing the seed.
    InspectState {
        #[clap(long)]
        state_file: PathBuf,
    },
}

fn params_from_cli(cli: &Cli) -> mss::MssResult<Params> {
    Params::new(cli.n, cli.height, cli.k, cli.w_bits)
}

/// On-disk layout: one leading byte `1` if followed by a root, 2-byte root
/// length, root bytes, then the serialized state. Only this CLI's own
/// state-file format; `mss::serialize` only defines the state's own bytes.
fn write_state_file(path: &PathBuf, params: &Params, root: &[u8], state_bytes: &[u8]) {
    let mut out = Vec::new();
    out.extend_from_slice(&(root.len() as u16).to_le_bytes());
    out.extend_from_slice(root);
    out.extend_from_slice(state_bytes);
    fs::write(path, out).expect("failed to write state file");
    let _ = params;
}

fn read_state_file(path: &PathBuf, params: &Params) -> (Vec<u8>, mss::MerkleState) {
    let bytes = fs::read(path).expect("failed to read state file");
    let root_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    let root = bytes[2..2 + root_len].to_vec();
    let state = deserialize_state(params, &bytes[2 + root_len..]).expect("corrupt state file");
    (root, state)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("invalid parameters: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match &cli.command {
        Command::Keygen {
            seed_hex,
            state_file,
        } => {
            let seed = match hex::decode(seed_hex) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("bad --seed-hex: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let keypair = match Keypair::generate(params, &seed) {
                Ok(kp) => kp,
                Err(e) => {
                    eprintln!("keygen failed: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            println!("root = {}", hex::encode(keypair.root()));
            write_state_file(
                state_file,
                &params,
                keypair.root(),
                &serialize_state(&params, keypair.state()),
            );
            ExitCode::SUCCESS
        }

        Command::Sign {
            state_file,
            message,
        } => {
            let (root, state) = read_state_file(state_file, &params);
            let compressor: Box<dyn mss::hash::Compressor> =
                Box::new(mss::hash::Sha256Compressor::new(params.n));
            let root_node = Node {
                height: params.h as u8,
                index: 0,
                value: root,
            };
            let mut keypair = Keypair::from_state(params, compressor, state, root_node);

            match keypair.sign(message.as_bytes()) {
                Ok(sig) => {
                    println!("signature = {}", hex::encode(serialize_signature(&sig)));
                    write_state_file(
                        state_file,
                        &params,
                        keypair.root(),
                        &serialize_state(&params, keypair.state()),
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("sign failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }

        Command::Verify {
            root_hex,
            signature_hex,
            message,
        } => {
            let root = match hex::decode(root_hex) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("bad --root-hex: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let sig_bytes = match hex::decode(signature_hex) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("bad --signature-hex: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let sig = match deserialize_signature(&params, &sig_bytes) {
                Ok(s) => s,
                Err(e) => {
                    println!("ERROR: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let compressor = mss::hash::Sha256Compressor::new(params.n);
            match verify(&params, &compressor, &root, message.as_bytes(), &sig) {
                Ok(()) => {
                    println!("OK");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!("ERROR: {}", e);
                    ExitCode::FAILURE
                }
            }
        }

        Command::InspectState { state_file } => {
            let (_root, state) = read_state_file(state_file, &params);
            println!("leaf_index = {}", state.leaf_index);
            println!("remaining = {}", params.num_leaves() - state.leaf_index);
            for (h, instance) in state.treehash.iter().enumerate() {
                println!("treehash[{}] = {:?} (tail_height={})", h, instance.status, instance.tail_height);
            }
            ExitCode::SUCCESS
        }
    }
}
