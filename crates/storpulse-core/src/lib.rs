// crates/storpulse-core/src/lib.rs

//! Core contract for storpulse proof-of-storage heartbeats.
//!
//! This crate holds everything the concrete schemes share:
//! - the four-operation [`Scheme`] trait (`encode` / `gen_challenge` /
//!   `prove` / `verify`) and its associated record types,
//! - the [`Error`] taxonomy,
//! - serde field adapters for the canonical wire encodings (base64 byte
//!   strings, decimal big integers),
//! - JSON/CBOR read/write utilities with extension auto-detection,
//! - helpers for the caller-supplied seekable byte stream.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod codec;
pub mod error;
pub mod io;
pub mod scheme;
pub mod stream;

pub use error::{Error, Result};
pub use scheme::Scheme;
pub use stream::{read_up_to, stream_len, DEFAULT_BUFFER_SIZE, DEFAULT_KEY_SIZE};
