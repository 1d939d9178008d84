//! Serde field adapters for the canonical wire encodings.
//!
//! The wire rules: byte strings are standard-alphabet base64 (padded) in a
//! JSON string; big integers are canonical base-10 strings (no leading
//! zeros, so consumers without arbitrary-precision JSON stay exact);
//! integers, booleans and floats pass through natively.
//!
//! Use as `#[serde(with = "storpulse_core::codec::b64")]` and friends.

/// `Vec<u8>` ⇔ base64 string.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as a base64 string.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserialize a base64 string into bytes.
    ///
    /// # Errors
    /// Rejects non-string input and invalid base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// `Vec<Vec<u8>>` ⇔ list of base64 strings, element-wise.
pub mod b64_list {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a list of byte strings element-wise.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(items: &[Vec<u8>], ser: S) -> Result<S::Ok, S::Error> {
        let mut seq = ser.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&STANDARD.encode(item))?;
        }
        seq.end()
    }

    /// Deserialize a list of base64 strings element-wise.
    ///
    /// # Errors
    /// Rejects non-list input and any invalid element.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(de)?;
        strings
            .iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// `BigUint` ⇔ canonical decimal string.
pub mod bigint {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a big integer as its base-10 representation.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(x: &BigUint, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&x.to_str_radix(10))
    }

    /// Deserialize a base-10 string into a big integer.
    ///
    /// # Errors
    /// Rejects non-string input and non-decimal content.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(de)?;
        BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal integer: {s:?}")))
    }
}

/// `Vec<BigUint>` ⇔ list of decimal strings, element-wise.
pub mod bigint_list {
    use num_bigint::BigUint;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize big integers element-wise.
    ///
    /// # Errors
    /// Propagates serializer failures.
    pub fn serialize<S: Serializer>(items: &[BigUint], ser: S) -> Result<S::Ok, S::Error> {
        let mut seq = ser.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&item.to_str_radix(10))?;
        }
        seq.end()
    }

    /// Deserialize decimal strings element-wise.
    ///
    /// # Errors
    /// Rejects non-list input and any non-decimal element.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<BigUint>, D::Error> {
        let strings = Vec::<String>::deserialize(de)?;
        strings
            .iter()
            .map(|s| {
                BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid decimal integer: {s:?}"))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::b64")]
        bytes: Vec<u8>,
        #[serde(with = "super::b64_list")]
        list: Vec<Vec<u8>>,
        #[serde(with = "super::bigint")]
        x: BigUint,
        #[serde(with = "super::bigint_list")]
        xs: Vec<BigUint>,
    }

    #[test]
    fn roundtrip_and_shape() {
        let v = Sample {
            bytes: vec![0, 1, 2, 255],
            list: vec![vec![], vec![42]],
            x: BigUint::parse_bytes(b"340282366920938463463374607431768211456", 10).unwrap(),
            xs: vec![BigUint::from(0u8), BigUint::from(7u8)],
        };
        let json = serde_json::to_string(&v).unwrap();
        // Bytes land as strings, big integers as decimal strings.
        assert!(json.contains("\"AAEC/w==\""));
        assert!(json.contains("\"340282366920938463463374607431768211456\""));
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn rejects_bad_base64_and_decimals() {
        assert!(
            serde_json::from_str::<Sample>(r#"{"bytes":"!!","list":[],"x":"1","xs":[]}"#).is_err()
        );
        assert!(
            serde_json::from_str::<Sample>(r#"{"bytes":"","list":[],"x":"12a","xs":[]}"#).is_err()
        );
        assert!(
            serde_json::from_str::<Sample>(r#"{"bytes":"","list":[],"x":"1","xs":["-2"]}"#)
                .is_err()
        );
    }
}
