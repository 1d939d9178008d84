// crates/storpulse-crypto/src/lib.rs

//! Crypto substrate shared by the heartbeat schemes.
//!
//! - [`KeyedPrf`]: deterministic integer PRF (SHA-256 input digest whitened
//!   by a zero-IV AES-256-CFB keystream, mask + rejection sampling).
//! - [`mac`]: HMAC-SHA256 helpers and the deterministic seed chain.
//! - [`primes`]: Miller–Rabin probable-prime generation for the field
//!   modulus of the homomorphic scheme.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used
)]

pub mod mac;
pub mod prf;
pub mod primes;

pub use mac::{hmac_sha256, hmac_sha256_verify, next_seed};
pub use prf::KeyedPrf;
pub use primes::{gen_prime, is_probable_prime};
