//! The Shacham–Waters heartbeat engine and its transport records.

use std::io::{Read, Seek, SeekFrom};

use num_bigint::BigUint;
use num_traits::Zero;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroize;

use storpulse_core::{codec, read_up_to, Error, Result, Scheme, DEFAULT_KEY_SIZE};
use storpulse_crypto::{gen_prime, KeyedPrf};

use crate::state::State;

/// Sectors per chunk by default. More sectors shrink the tag (fewer
/// authenticators per byte) and grow the proof (`mu` has one entry per
/// sector).
pub const DEFAULT_SECTORS: u64 = 10;

/// Bit length of a freshly generated field modulus.
pub const DEFAULT_PRIME_BITS: u64 = 1024;

/// One audit request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Challenge {
    /// Number of chunk draws the prover must aggregate.
    pub chunks: u64,
    /// Exclusive bound for the challenge coefficients (the field modulus).
    #[serde(with = "codec::bigint")]
    pub v_max: BigUint,
    /// Fresh key seeding the two challenge PRFs.
    #[serde(with = "codec::b64")]
    pub key: Vec<u8>,
}

/// The per-file tag: one field authenticator per chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tag {
    /// `sigma[i]` authenticates chunk `i`.
    #[serde(with = "codec::bigint_list")]
    pub sigma: Vec<BigUint>,
}

/// The prover's aggregate response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Proof {
    /// Per-sector aggregates `mu[j] = sum_i v_i * m[i][j] (mod p)`.
    #[serde(with = "codec::bigint_list")]
    pub mu: Vec<BigUint>,
    /// Aggregate authenticator `sum_i v_i * sigma[index_i] (mod p)`.
    #[serde(with = "codec::bigint")]
    pub sigma: BigUint,
}

/// The Shacham–Waters private heartbeat scheme.
///
/// Carries the verifier key that seals states, the field modulus, and the
/// chunk geometry. The modulus is public; only the key is stripped from a
/// [`Scheme::public`] copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwizzleScheme {
    #[serde(with = "codec::b64")]
    key: Vec<u8>,
    #[serde(with = "codec::bigint")]
    prime: BigUint,
    sectors: u64,
    #[serde(default)]
    convergent: bool,
}

impl SwizzleScheme {
    /// A scheme with a fresh random key and a fresh
    /// [`DEFAULT_PRIME_BITS`]-bit modulus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(DEFAULT_SECTORS, None, None, DEFAULT_PRIME_BITS)
    }

    /// Full-control constructor. A missing `key` is drawn at random; a
    /// missing `prime` is generated with `primebits` bits.
    #[must_use]
    pub fn with_params(
        sectors: u64,
        key: Option<Vec<u8>>,
        prime: Option<BigUint>,
        primebits: u64,
    ) -> Self {
        let key = key.unwrap_or_else(|| {
            let mut k = vec![0u8; DEFAULT_KEY_SIZE];
            rand::thread_rng().fill_bytes(&mut k);
            k
        });
        let prime = prime.unwrap_or_else(|| gen_prime(&mut rand::thread_rng(), primebits));
        Self {
            key,
            prime,
            sectors,
            convergent: false,
        }
    }

    /// Seal states convergently: the IV derives from the state contents,
    /// so equal states produce identical sealed records.
    #[must_use]
    pub fn convergent(mut self, on: bool) -> Self {
        self.convergent = on;
        self
    }

    /// The field modulus.
    #[must_use]
    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// Bytes per sector: `floor(bits(p) / 8)`, so any sector value stays
    /// representable beside the modulus.
    #[must_use]
    pub fn sector_size(&self) -> u64 {
        self.prime.bits() / 8
    }

    /// Bytes per chunk.
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.sectors * self.sector_size()
    }

    /// The verifier key (empty on a public copy).
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Encode under caller-chosen PRF keys; deterministic given the file,
    /// geometry and modulus. `encode` draws fresh keys and delegates here.
    fn encode_with_keys<F: Read + Seek>(
        &self,
        file: &mut F,
        f_key: Vec<u8>,
        alpha_key: Vec<u8>,
    ) -> Result<(Tag, State)> {
        let mut state = State::new(f_key, alpha_key);
        let f = KeyedPrf::new(&state.f_key, self.prime.clone())?;
        let alpha = KeyedPrf::new(&state.alpha_key, self.prime.clone())?;

        // The per-sector coefficients repeat for every chunk.
        let alpha_coeffs: Vec<BigUint> = (0..self.sectors).map(|j| alpha.eval(j)).collect();

        let sector_size = usize::try_from(self.sector_size())
            .map_err(|_| Error::MalformedInput("sector size exceeds the address space".into()))?;
        let mut buf = vec![0u8; sector_size];

        file.seek(SeekFrom::Start(0))?;
        let mut sigma_list = Vec::new();
        let mut chunk_id: u64 = 0;
        let mut done = false;
        while !done {
            let mut sigma = f.eval(chunk_id);
            for coeff in &alpha_coeffs {
                let got = read_up_to(file, &mut buf)?;
                if got > 0 {
                    sigma += coeff * BigUint::from_bytes_be(&buf[..got]);
                    sigma %= &self.prime;
                }
                if got < sector_size {
                    done = true;
                    break;
                }
            }
            sigma_list.push(sigma);
            chunk_id += 1;
        }

        state.chunks = chunk_id;
        state.encrypt_opts(&self.key, self.convergent)?;
        debug!(
            chunks = chunk_id,
            sectors = self.sectors,
            "encoded swizzle heartbeat tag"
        );
        Ok((Tag { sigma: sigma_list }, state))
    }
}

impl Default for SwizzleScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SwizzleScheme {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl Scheme for SwizzleScheme {
    type Tag = Tag;
    type State = State;
    type Challenge = Challenge;
    type Proof = Proof;

    fn encode<F: Read + Seek>(&self, file: &mut F) -> Result<(Tag, State)> {
        let mut rng = rand::thread_rng();
        let mut f_key = vec![0u8; DEFAULT_KEY_SIZE];
        let mut alpha_key = vec![0u8; DEFAULT_KEY_SIZE];
        rng.fill_bytes(&mut f_key);
        rng.fill_bytes(&mut alpha_key);
        self.encode_with_keys(file, f_key, alpha_key)
    }

    /// Validates the sealed state through a working copy; the caller's
    /// state stays sealed and is reusable for unlimited further rounds.
    fn gen_challenge(&self, state: &mut State) -> Result<Challenge> {
        let mut working = state.clone();
        working.decrypt(&self.key)?;
        let mut key = vec![0u8; DEFAULT_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Ok(Challenge {
            chunks: working.chunks,
            v_max: self.prime.clone(),
            key,
        })
    }

    fn prove<F: Read + Seek>(&self, file: &mut F, chal: &Challenge, tag: &Tag) -> Result<Proof> {
        if tag.sigma.is_empty() {
            return Err(Error::MalformedInput("tag holds no authenticators".into()));
        }
        let index = KeyedPrf::new_u64(&chal.key, tag.sigma.len() as u64)?;
        let v = KeyedPrf::new(&chal.key, chal.v_max.clone())?;

        let sector_size = self.sector_size();
        let chunk_size = self.chunk_size();
        let width = usize::try_from(sector_size)
            .map_err(|_| Error::MalformedInput("sector size exceeds the address space".into()))?;
        let mut buf = vec![0u8; width];

        let mut mu = vec![BigUint::zero(); self.sectors as usize];
        let mut sigma = BigUint::zero();

        for i in 0..chal.chunks {
            let chunk_index = index.eval_u64(i);
            let coeff = v.eval(i);

            for (j, mu_j) in mu.iter_mut().enumerate() {
                let pos = chunk_index * chunk_size + j as u64 * sector_size;
                file.seek(SeekFrom::Start(pos))?;
                let got = read_up_to(file, &mut buf)?;
                if got > 0 {
                    *mu_j += &coeff * BigUint::from_bytes_be(&buf[..got]);
                    *mu_j %= &self.prime;
                }
                if (got as u64) < sector_size {
                    break;
                }
            }

            sigma += &coeff * &tag.sigma[chunk_index as usize];
            sigma %= &self.prime;
        }
        Ok(Proof { mu, sigma })
    }

    fn verify(&self, proof: &Proof, chal: &Challenge, state: &State) -> Result<bool> {
        let mut working = state.clone();
        working.decrypt(&self.key)?;

        if proof.mu.len() as u64 != self.sectors {
            return Ok(false);
        }

        let index = KeyedPrf::new_u64(&chal.key, working.chunks)?;
        let v = KeyedPrf::new(&chal.key, chal.v_max.clone())?;
        let f = KeyedPrf::new(&working.f_key, self.prime.clone())?;
        let alpha = KeyedPrf::new(&working.alpha_key, self.prime.clone())?;

        let mut rhs = BigUint::zero();
        for i in 0..chal.chunks {
            rhs += v.eval(i) * f.eval(index.eval_u64(i));
            rhs %= &self.prime;
        }
        for (j, mu_j) in proof.mu.iter().enumerate() {
            rhs += alpha.eval(j as u64) * mu_j;
            rhs %= &self.prime;
        }
        Ok(proof.sigma == rhs)
    }

    fn public(&self) -> Self {
        Self {
            key: Vec::new(),
            prime: self.prime.clone(),
            sectors: self.sectors,
            convergent: self.convergent,
        }
    }
}
