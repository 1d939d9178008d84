//! Keyed pseudo-random function with integer outputs in `[0, range)`.

use aes::cipher::KeyIvInit;
use aes::Aes256;
use cfb_mode::BufEncryptor;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};
use sha2::{Digest, Sha256};
use storpulse_core::{Error, Result, DEFAULT_KEY_SIZE};

type Keystream = BufEncryptor<Aes256>;

/// Deterministic PRF: `(key, range, x) -> integer in [0, range)`.
///
/// Each [`KeyedPrf::eval`] hashes the decimal rendering of `x + t` for a
/// nonce `t = 0, 1, 2, …`, pads or truncates the digest to the byte width
/// of `range`, whitens it with an AES-256-CFB keystream (zero IV, one
/// cipher state per call, shared across rejection rounds), masks to the
/// bit length of `range`, and returns the first candidate below `range`.
///
/// The zero IV is sound here because every plaintext fed to a given cipher
/// state is a SHA-256 digest of a unique input and the state is never
/// reused across calls; the mask bounds the expected rejection rounds by
/// two, and rejection keeps the output unbiased.
#[derive(Clone, Debug)]
pub struct KeyedPrf {
    key: [u8; DEFAULT_KEY_SIZE],
    range: BigUint,
    mask: BigUint,
    width: usize,
}

impl KeyedPrf {
    /// Build a PRF over `[0, range)`.
    ///
    /// # Errors
    /// [`Error::InvalidKey`] unless `key` is exactly 32 bytes;
    /// [`Error::MalformedInput`] for an empty range.
    pub fn new(key: &[u8], range: BigUint) -> Result<Self> {
        let key: [u8; DEFAULT_KEY_SIZE] = key.try_into().map_err(|_| Error::InvalidKey {
            expected: DEFAULT_KEY_SIZE,
            got: key.len(),
        })?;
        if range.bits() == 0 {
            return Err(Error::MalformedInput("PRF range must be positive".into()));
        }
        let bits = range.bits();
        let mask = (BigUint::one() << bits) - BigUint::one();
        let width = usize::try_from((bits + 7) / 8).map_err(|_| {
            Error::MalformedInput("PRF range width exceeds the address space".into())
        })?;
        Ok(Self {
            key,
            range,
            mask,
            width,
        })
    }

    /// Convenience constructor for machine-word ranges (chunk counts,
    /// offsets); guarantees [`KeyedPrf::eval_u64`] cannot overflow.
    ///
    /// # Errors
    /// Same conditions as [`KeyedPrf::new`].
    pub fn new_u64(key: &[u8], range: u64) -> Result<Self> {
        Self::new(key, BigUint::from(range))
    }

    /// The exclusive upper bound of the output.
    #[inline]
    #[must_use]
    pub fn range(&self) -> &BigUint {
        &self.range
    }

    /// Evaluate the function at `x`.
    #[must_use]
    pub fn eval(&self, x: u64) -> BigUint {
        let mut keystream = Keystream::new(&self.key.into(), &[0u8; 16].into());
        let mut block = vec![0u8; self.width];
        for t in 0u128.. {
            let digest = Sha256::digest((u128::from(x) + t).to_string().as_bytes());
            let take = digest.len().min(self.width);
            block[..take].copy_from_slice(&digest[..take]);
            for b in &mut block[take..] {
                *b = 0;
            }
            keystream.encrypt(&mut block);
            let candidate = &self.mask & BigUint::from_bytes_be(&block);
            if candidate < self.range {
                return candidate;
            }
        }
        unreachable!("rejection sampling terminates")
    }

    /// Evaluate at `x`, narrowed to `u64`. Only meaningful for PRFs built
    /// with [`KeyedPrf::new_u64`], whose outputs always fit.
    #[must_use]
    pub fn eval_u64(&self, x: u64) -> u64 {
        self.eval(x)
            .to_u64()
            .expect("output of a u64-range PRF fits in u64")
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use num_traits::Zero;

    use super::KeyedPrf;
    use storpulse_core::Error;

    const KEY_A: [u8; 32] = [0x11; 32];
    const KEY_B: [u8; 32] = [0x22; 32];

    #[test]
    fn deterministic_per_key_and_input() {
        let prf = KeyedPrf::new_u64(&KEY_A, 1 << 40).unwrap();
        let again = KeyedPrf::new_u64(&KEY_A, 1 << 40).unwrap();
        for x in 0..16 {
            assert_eq!(prf.eval(x), again.eval(x));
        }
    }

    #[test]
    fn distinct_keys_diverge() {
        let a = KeyedPrf::new_u64(&KEY_A, 1 << 60).unwrap();
        let b = KeyedPrf::new_u64(&KEY_B, 1 << 60).unwrap();
        // A collision across 8 inputs of a 60-bit range would be astonishing.
        assert!((0..8).any(|x| a.eval(x) != b.eval(x)));
    }

    #[test]
    fn outputs_stay_in_range() {
        for range in [1u64, 2, 3, 7, 255, 256, 1000, 1 << 33] {
            let prf = KeyedPrf::new_u64(&KEY_A, range).unwrap();
            for x in 0..32 {
                assert!(prf.eval_u64(x) < range, "range {range}, x {x}");
            }
        }
    }

    #[test]
    fn unit_range_is_constant_zero() {
        let prf = KeyedPrf::new_u64(&KEY_A, 1).unwrap();
        for x in 0..8 {
            assert!(prf.eval(x).is_zero());
        }
    }

    #[test]
    fn wide_range_outputs() {
        let range: BigUint = BigUint::from(1u8) << 300;
        let prf = KeyedPrf::new(&KEY_A, range.clone()).unwrap();
        let y = prf.eval(0);
        assert!(y < range);
        // A 300-bit range output is overwhelmingly likely to be wide.
        assert!(y.bits() > 64);
    }

    #[test]
    fn rejects_bad_key_and_range() {
        assert!(matches!(
            KeyedPrf::new_u64(&[0u8; 16], 10),
            Err(Error::InvalidKey {
                expected: 32,
                got: 16
            })
        ));
        assert!(matches!(
            KeyedPrf::new_u64(&KEY_A, 0),
            Err(Error::MalformedInput(_))
        ));
    }
}
