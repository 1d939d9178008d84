//! The Merkle heartbeat engine and its transport records.

use std::io::{Read, Seek, SeekFrom};
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroize;

use storpulse_core::{
    codec, read_up_to, stream_len, Error, Result, Scheme, DEFAULT_BUFFER_SIZE, DEFAULT_KEY_SIZE,
};
use storpulse_crypto::{hmac_sha256, hmac_sha256_verify, next_seed, KeyedPrf};

use crate::tree::{MerkleBranch, MerkleLeaf, MerkleTree};

/// Challenges a tag supports by default.
pub const DEFAULT_CHALLENGE_COUNT: u64 = 256;

/// Bytes of file covered by each spot check by default.
pub const DEFAULT_CHUNK_SIZE: u64 = 8192;

/// One audit request: the seed for the chunk HMAC and the branch index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Challenge {
    /// Seed that selects the chunk position and keys its HMAC.
    #[serde(with = "codec::b64")]
    pub seed: Vec<u8>,
    /// Index of the Merkle branch this challenge opens.
    pub index: u64,
}

/// The per-file tag stored by the prover: the tree with its leaves
/// stripped, plus the chunk size used at encode time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tag {
    /// Stripped Merkle tree (node hashes only).
    pub tree: MerkleTree,
    /// Chunk size in bytes for every spot check under this tag.
    pub chunksz: u64,
}

/// The verifier's per-file state: mutable, signed, and safe to park on the
/// server between rounds.
///
/// `gen_challenge` is the only legitimate writer; it advances `seed` and
/// `index`, refreshes `timestamp`, and re-signs. Any other modification
/// invalidates `hmac`. The timestamp lets a deployment reject replays of
/// an old state under whatever freshness policy it runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct State {
    /// Ordinal of the next challenge, `0 ..= n`.
    pub index: u64,
    /// Current seed in the HMAC chain.
    #[serde(with = "codec::b64")]
    pub seed: Vec<u8>,
    /// Challenge budget.
    pub n: u64,
    /// Merkle root the proofs must reach.
    #[serde(with = "codec::b64")]
    pub root: Vec<u8>,
    /// Signature over the other fields.
    #[serde(with = "codec::b64")]
    pub hmac: Vec<u8>,
    /// Seconds since the epoch when the state was last (re)signed.
    pub timestamp: f64,
}

impl State {
    fn signed_parts(&self) -> (String, String, String) {
        (
            self.index.to_string(),
            self.n.to_string(),
            self.timestamp.to_string(),
        )
    }

    /// Sign the state under `key`.
    pub fn sign(&mut self, key: &[u8]) {
        let (index, n, timestamp) = self.signed_parts();
        self.hmac = hmac_sha256(
            key,
            &[
                index.as_bytes(),
                &self.seed,
                n.as_bytes(),
                &self.root,
                timestamp.as_bytes(),
            ],
        )
        .to_vec();
    }

    /// Check the state signature.
    ///
    /// # Errors
    /// [`Error::SignatureInvalid`] on mismatch.
    pub fn checksig(&self, key: &[u8]) -> Result<()> {
        let (index, n, timestamp) = self.signed_parts();
        let ok = hmac_sha256_verify(
            key,
            &[
                index.as_bytes(),
                &self.seed,
                n.as_bytes(),
                &self.root,
                timestamp.as_bytes(),
            ],
            &self.hmac,
        );
        if ok {
            Ok(())
        } else {
            Err(Error::SignatureInvalid)
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

/// Proof that the prover holds the challenged chunk: the recomputed leaf
/// plus the branch that connects it to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Proof {
    /// Recomputed leaf for the challenge.
    pub leaf: MerkleLeaf,
    /// Branch from the leaf level to just below the root.
    pub branch: MerkleBranch,
}

/// The Merkle heartbeat scheme.
///
/// Holds the verifier's single secret key, and optionally a fraction of
/// the file to cover per spot check instead of the fixed default chunk
/// size.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerkleScheme {
    #[serde(with = "codec::b64")]
    key: Vec<u8>,
    check_fraction: Option<f64>,
}

impl MerkleScheme {
    /// A scheme with a fresh random 32-byte key.
    #[must_use]
    pub fn new() -> Self {
        let mut key = vec![0u8; DEFAULT_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self {
            key,
            check_fraction: None,
        }
    }

    /// A scheme with the given key (32 bytes for full strength).
    #[must_use]
    pub fn with_key(key: Vec<u8>) -> Self {
        Self {
            key,
            check_fraction: None,
        }
    }

    /// Cover `fraction` of the file per spot check instead of
    /// [`DEFAULT_CHUNK_SIZE`].
    #[must_use]
    pub fn with_check_fraction(mut self, fraction: f64) -> Self {
        self.check_fraction = Some(fraction);
        self
    }

    /// The verifier key (empty on a public copy).
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Tag a file with explicit parameters. `seed` defaults to fresh random
    /// bytes and `chunksz` to the configured chunk size, clamped to the
    /// file length.
    ///
    /// # Errors
    /// Stream I/O failures; no partial tag/state escapes.
    pub fn encode_with<F: Read + Seek>(
        &self,
        file: &mut F,
        n: u64,
        seed: Option<Vec<u8>>,
        chunksz: Option<u64>,
    ) -> Result<(Tag, State)> {
        let seed = seed.unwrap_or_else(|| {
            let mut s = vec![0u8; DEFAULT_KEY_SIZE];
            rand::thread_rng().fill_bytes(&mut s);
            s
        });
        let filesz = stream_len(file)?;
        let mut chunksz = chunksz.unwrap_or_else(|| self.default_chunksz(filesz));
        if filesz < chunksz {
            chunksz = filesz;
        }

        let mut state = State {
            index: 0,
            seed,
            n,
            root: Vec::new(),
            hmac: Vec::new(),
            timestamp: unix_time(),
        };

        let mut tree = MerkleTree::new();
        let mut leaf_seed = next_seed(&self.key, &state.seed);
        for _ in 0..n {
            let blob = chunk_hmac(file, &leaf_seed, filesz, chunksz, DEFAULT_BUFFER_SIZE)?;
            tree.add_leaf(blob);
            leaf_seed = next_seed(&self.key, &leaf_seed);
        }
        tree.build();
        state.root = tree.root();
        tree.strip_leaves();
        state.sign(&self.key);

        debug!(n, chunksz, filesz, "encoded merkle heartbeat tag");
        Ok((Tag { tree, chunksz }, state))
    }

    fn default_chunksz(&self, filesz: u64) -> u64 {
        match self.check_fraction {
            Some(fraction) => (fraction * filesz as f64) as u64,
            None => DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for MerkleScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MerkleScheme {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl Scheme for MerkleScheme {
    type Tag = Tag;
    type State = State;
    type Challenge = Challenge;
    type Proof = Proof;

    fn encode<F: Read + Seek>(&self, file: &mut F) -> Result<(Tag, State)> {
        self.encode_with(file, DEFAULT_CHALLENGE_COUNT, None, None)
    }

    fn gen_challenge(&self, state: &mut State) -> Result<Challenge> {
        state.checksig(&self.key)?;
        if state.index >= state.n {
            return Err(Error::OutOfChallenges);
        }
        state.seed = next_seed(&self.key, &state.seed);
        let chal = Challenge {
            seed: state.seed.clone(),
            index: state.index,
        };
        state.index += 1;
        state.timestamp = unix_time();
        state.sign(&self.key);
        Ok(chal)
    }

    fn prove<F: Read + Seek>(&self, file: &mut F, chal: &Challenge, tag: &Tag) -> Result<Proof> {
        if chal.index >= 1u64 << tag.tree.order {
            return Err(Error::MalformedInput(format!(
                "challenge index {} outside a tree of order {}",
                chal.index, tag.tree.order
            )));
        }
        let filesz = stream_len(file)?;
        let blob = chunk_hmac(file, &chal.seed, filesz, tag.chunksz, DEFAULT_BUFFER_SIZE)?;
        Ok(Proof {
            leaf: MerkleLeaf::new(chal.index, blob),
            branch: tag.tree.branch(chal.index),
        })
    }

    fn verify(&self, proof: &Proof, chal: &Challenge, state: &State) -> Result<bool> {
        state.checksig(&self.key)?;
        if proof.leaf.index != chal.index {
            return Ok(false);
        }
        Ok(MerkleTree::verify_branch(
            &proof.leaf,
            &proof.branch,
            &state.root,
        ))
    }

    fn public(&self) -> Self {
        Self {
            key: Vec::new(),
            check_fraction: self.check_fraction,
        }
    }
}

/// HMAC of one deterministically selected chunk of the file.
///
/// The seed does double duty: it keys a [`KeyedPrf`] that picks the chunk
/// offset in `[0, filesz - chunksz]`, and it keys the HMAC over the chunk
/// bytes, binding content and position together. The chunk is streamed in
/// `bufsz` slices.
///
/// # Errors
/// [`Error::InvalidKey`] unless `seed` is 32 bytes; [`Error::Io`] if the
/// stream fails or ends before `chunksz` bytes arrive.
pub fn chunk_hmac<F: Read + Seek>(
    file: &mut F,
    seed: &[u8],
    filesz: u64,
    chunksz: u64,
    bufsz: usize,
) -> Result<Vec<u8>> {
    let chunksz = chunksz.min(filesz);
    let prf = KeyedPrf::new(seed, BigUint::from(filesz - chunksz + 1))?;
    let offset = prf.eval_u64(0);
    file.seek(SeekFrom::Start(offset))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(seed)
        .expect("HMAC-SHA256 accepts keys of any length");
    let mut buf = vec![0u8; bufsz];
    let mut remaining = chunksz;
    while remaining > 0 {
        let want = usize::try_from(remaining.min(bufsz as u64)).unwrap_or(bufsz);
        let got = read_up_to(file, &mut buf[..want])?;
        if got == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended before the selected chunk was fully read",
            )));
        }
        mac.update(&buf[..got]);
        remaining -= got as u64;
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    use super::{chunk_hmac, MerkleScheme, State};
    use storpulse_core::{Error, Scheme};

    fn filled(len: usize, seed: u64) -> Cursor<Vec<u8>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = vec![0u8; len];
        rng.fill_bytes(&mut data);
        Cursor::new(data)
    }

    fn fixed_scheme() -> MerkleScheme {
        MerkleScheme::with_key(vec![0x42; 32])
    }

    #[test]
    fn chunk_hmac_depends_on_seed_and_content() {
        let mut file = filled(4096, 1);
        let a = chunk_hmac(&mut file, &[1u8; 32], 4096, 512, 128).unwrap();
        let b = chunk_hmac(&mut file, &[1u8; 32], 4096, 512, 128).unwrap();
        let c = chunk_hmac(&mut file, &[2u8; 32], 4096, 512, 128).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut other = filled(4096, 2);
        let d = chunk_hmac(&mut other, &[1u8; 32], 4096, 512, 128).unwrap();
        assert_ne!(a, d);
    }

    #[test]
    fn chunk_hmac_clamps_to_short_files() {
        let mut file = filled(100, 3);
        // Chunk larger than the file hashes the whole file from offset 0.
        let h = chunk_hmac(&mut file, &[7u8; 32], 100, 8192, 64).unwrap();
        assert_eq!(h.len(), 32);
    }

    #[test]
    fn encode_is_deterministic_for_fixed_seed() {
        let scheme = fixed_scheme();
        let seed = vec![9u8; 32];
        let mut f1 = filled(32768, 4);
        let mut f2 = filled(32768, 4);
        let (tag1, st1) = scheme
            .encode_with(&mut f1, 16, Some(seed.clone()), None)
            .unwrap();
        let (tag2, st2) = scheme.encode_with(&mut f2, 16, Some(seed), None).unwrap();
        assert_eq!(tag1, tag2);
        assert_eq!(st1.root, st2.root);
    }

    #[test]
    fn state_signature_covers_every_field() {
        let scheme = fixed_scheme();
        let mut file = filled(1024, 5);
        let (_, state) = scheme
            .encode_with(&mut file, 4, Some(vec![1u8; 32]), None)
            .unwrap();
        state.checksig(scheme.key()).unwrap();

        let tampered: Vec<State> = {
            let mut variants = Vec::new();
            let mut s = state.clone();
            s.index += 1;
            variants.push(s);
            let mut s = state.clone();
            s.seed[0] ^= 1;
            variants.push(s);
            let mut s = state.clone();
            s.n -= 1;
            variants.push(s);
            let mut s = state.clone();
            s.root[0] ^= 1;
            variants.push(s);
            let mut s = state.clone();
            s.timestamp += 1.0;
            variants.push(s);
            let mut s = state.clone();
            s.hmac[0] ^= 1;
            variants.push(s);
            variants
        };
        for bad in &tampered {
            assert!(matches!(
                bad.checksig(scheme.key()),
                Err(Error::SignatureInvalid)
            ));
        }
    }

    #[test]
    fn public_copy_cannot_issue_challenges() {
        let scheme = fixed_scheme();
        let mut file = filled(1024, 6);
        let (_, mut state) = scheme
            .encode_with(&mut file, 4, Some(vec![1u8; 32]), None)
            .unwrap();
        let public = scheme.public();
        assert!(public.key().is_empty());
        // The signature was made under the real key, so the stripped copy
        // must refuse.
        assert!(matches!(
            public.gen_challenge(&mut state),
            Err(Error::SignatureInvalid)
        ));
    }
}
