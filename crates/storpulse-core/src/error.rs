//! Error taxonomy shared by every scheme.
//!
//! Verification *mismatch* (a proof that does not satisfy its challenge) is
//! not an error anywhere in this workspace; it is `Ok(false)`. Errors are
//! reserved for protocol misuse, corruption, and I/O failures.

use thiserror::Error;

/// Errors surfaced by the heartbeat engines and the wire codecs.
#[derive(Debug, Error)]
pub enum Error {
    /// A signed or sealed `State` failed its HMAC check.
    #[error("signature invalid on state")]
    SignatureInvalid,

    /// A Merkle state has exhausted its challenge budget (`index >= n`).
    #[error("out of challenges")]
    OutOfChallenges,

    /// A key of the wrong size was handed to a keyed primitive.
    #[error("invalid key: expected {expected} bytes, got {got}")]
    InvalidKey {
        /// Required key length in bytes.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// Structurally invalid data in a decode helper (missing or unknown
    /// fields, bad base64, bad decimal integer, …).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Wrapped failure from the caller-supplied file stream.
    #[error("file stream I/O")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn display_is_stable() {
        assert_eq!(
            Error::SignatureInvalid.to_string(),
            "signature invalid on state"
        );
        assert_eq!(Error::OutOfChallenges.to_string(), "out of challenges");
        assert_eq!(
            Error::InvalidKey {
                expected: 32,
                got: 7
            }
            .to_string(),
            "invalid key: expected 32 bytes, got 7"
        );
    }
}
