//! HMAC-SHA256 helpers and the deterministic seed chain.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the concatenation of `parts`.
#[must_use]
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// Constant-time check of `tag` against HMAC-SHA256 over `parts`.
#[must_use]
pub fn hmac_sha256_verify(key: &[u8], parts: &[&[u8]], tag: &[u8]) -> bool {
    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    mac.verify_slice(tag).is_ok()
}

/// Advance the seed chain: `next = HMAC-SHA256(key, seed)`.
#[must_use]
pub fn next_seed(key: &[u8], seed: &[u8]) -> Vec<u8> {
    hmac_sha256(key, &[seed]).to_vec()
}

fn keyed(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length")
}

#[cfg(test)]
mod tests {
    use super::{hmac_sha256, hmac_sha256_verify, next_seed};

    // RFC 4231, test case 2.
    #[test]
    fn rfc4231_vector() {
        let tag = hmac_sha256(b"Jefe", &[b"what do ya want ", b"for nothing?"]);
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verify_accepts_and_rejects() {
        let tag = hmac_sha256(b"key", &[b"payload"]);
        assert!(hmac_sha256_verify(b"key", &[b"payload"], &tag));
        assert!(!hmac_sha256_verify(b"key", &[b"payload!"], &tag));
        assert!(!hmac_sha256_verify(b"yek", &[b"payload"], &tag));
        assert!(!hmac_sha256_verify(b"key", &[b"payload"], &tag[..31]));
    }

    #[test]
    fn seed_chain_is_deterministic_and_keyed() {
        let s1 = next_seed(b"k1", &[0u8; 32]);
        assert_eq!(s1, next_seed(b"k1", &[0u8; 32]));
        assert_eq!(s1.len(), 32);
        assert_ne!(s1, next_seed(b"k2", &[0u8; 32]));
        assert_ne!(s1, next_seed(b"k1", &s1));
    }
}
