//! The four-operation heartbeat contract.
//!
//! Both schemes (Merkle spot-check and Shacham–Waters full audit) satisfy
//! the same contract with their own record types. One round:
//!
//! ```text
//! verifier: encode(file)            -> (tag, state)     // ship both to the server
//! verifier: gen_challenge(&mut st)  -> chal             // send chal
//! prover:   prove(file, chal, tag)  -> proof            // send proof back
//! verifier: verify(proof, chal, st) -> bool
//! ```
//!
//! ## Contracts implementors uphold
//! - `encode` is atomic: on error the caller observes no partial tag/state.
//! - `gen_challenge` is the only operation that mutates a `State`, and any
//!   mutation outside it invalidates the state's signature.
//! - `verify` reports a proof that merely fails the check as `Ok(false)`;
//!   `Err` is reserved for misuse, corruption, and I/O.
//! - No operation retains a reference to the file stream after returning.

use std::fmt::Debug;
use std::io::{Read, Seek};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A proof-of-storage heartbeat scheme.
///
/// The associated types double as the scheme's introspection surface: the
/// tag/state/challenge/proof records belonging to an implementation are
/// exactly `S::Tag`, `S::State`, `S::Challenge` and `S::Proof`.
pub trait Scheme {
    /// Public per-file authenticator data, stored by the prover.
    type Tag: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    /// Secret (or sealed) per-file data needed to issue and check challenges.
    type State: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    /// A single audit request, verifier to prover.
    type Challenge: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    /// The prover's response to a challenge.
    type Proof: Clone + Debug + PartialEq + Serialize + DeserializeOwned;

    /// Tag the file for later auditing.
    ///
    /// # Errors
    /// Returns an error on stream I/O failure or key misuse; never returns
    /// a partially constructed tag/state.
    fn encode<F: Read + Seek>(&self, file: &mut F) -> Result<(Self::Tag, Self::State)>;

    /// Issue the next challenge, advancing `state` where the scheme keeps
    /// per-challenge bookkeeping.
    ///
    /// # Errors
    /// [`crate::Error::SignatureInvalid`] if `state` was tampered with;
    /// [`crate::Error::OutOfChallenges`] once a bounded budget is spent.
    fn gen_challenge(&self, state: &mut Self::State) -> Result<Self::Challenge>;

    /// Compute the proof for `chal` over `file`. Requires no secret key, so
    /// it works on a [`Scheme::public`] copy.
    ///
    /// # Errors
    /// Stream I/O failures, or structurally unusable challenge/tag input.
    fn prove<F: Read + Seek>(
        &self,
        file: &mut F,
        chal: &Self::Challenge,
        tag: &Self::Tag,
    ) -> Result<Self::Proof>;

    /// Check a proof against the challenge it answers and the current state.
    ///
    /// # Errors
    /// [`crate::Error::SignatureInvalid`] if `state` was tampered with. A
    /// proof that simply does not satisfy the challenge is `Ok(false)`.
    fn verify(
        &self,
        proof: &Self::Proof,
        chal: &Self::Challenge,
        state: &Self::State,
    ) -> Result<bool>;

    /// A key-stripped copy sufficient to call [`Scheme::prove`] only.
    ///
    /// Operations that need the secret key fail on the copy with
    /// [`crate::Error::InvalidKey`].
    #[must_use]
    fn public(&self) -> Self
    where
        Self: Sized;
}
