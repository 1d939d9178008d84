// crates/storpulse-merkle/src/lib.rs

//! Merkle-tree heartbeat scheme.
//!
//! The verifier hashes `n` seeded spot-checks of the file into the leaves
//! of a static Merkle tree, keeps only the root (inside a signed state),
//! and hands the prover the tree with the leaves stripped. Each challenge
//! reveals one leaf seed; the prover recomputes the chunk HMAC and returns
//! it with its branch, which the verifier checks against the root.
//!
//! Detection is probabilistic per challenge (a spot check of `chunksz`
//! bytes) and the tag supports exactly `n` challenges.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used
)]

pub mod scheme;
pub mod tree;

pub use scheme::{
    chunk_hmac, Challenge, MerkleScheme, Proof, State, Tag, DEFAULT_CHALLENGE_COUNT,
    DEFAULT_CHUNK_SIZE,
};
pub use tree::{BranchRow, MerkleBranch, MerkleLeaf, MerkleTree};
