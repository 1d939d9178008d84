// crates/storpulse-swizzle/src/lib.rs

//! Shacham–Waters privately verifiable heartbeat ("swizzle").
//!
//! The verifier authenticates every chunk of the file with a homomorphic
//! linear tag over a prime field `F_p`:
//!
//! ```text
//! sigma_i = f(i) + sum_j alpha(j) * m[i][j]   (mod p)
//! ```
//!
//! where `f` and `alpha` are keyed PRFs whose keys live in the (sealed)
//! state. A challenge samples chunk indices and coefficients from a fresh
//! key; the prover aggregates sectors and authenticators linearly, and the
//! verifier checks one field equation. Every challenge audits the whole
//! tag, the state supports unlimited challenges, and a forged file
//! survives with probability about `1/p`.

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
pub mod state;

pub use scheme::{Challenge, Proof, SwizzleScheme, Tag, DEFAULT_PRIME_BITS, DEFAULT_SECTORS};
pub use state::State;
