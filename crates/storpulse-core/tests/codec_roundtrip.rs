//! Property coverage for the wire codec adapters.

use num_bigint::BigUint;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Wire {
    #[serde(with = "storpulse_core::codec::b64")]
    bytes: Vec<u8>,
    #[serde(with = "storpulse_core::codec::b64_list")]
    rows: Vec<Vec<u8>>,
    #[serde(with = "storpulse_core::codec::bigint")]
    value: BigUint,
    #[serde(with = "storpulse_core::codec::bigint_list")]
    values: Vec<BigUint>,
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn json_roundtrip(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        rows in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..8),
        limbs in proptest::collection::vec(any::<u32>(), 1..12),
        list in proptest::collection::vec(
            proptest::collection::vec(any::<u32>(), 1..6), 0..6),
    ) {
        let wire = Wire {
            bytes,
            rows,
            value: BigUint::new(limbs),
            values: list.into_iter().map(BigUint::new).collect(),
        };
        let json = storpulse_core::io::to_json_string(&wire).unwrap();
        let back: Wire = storpulse_core::io::from_json_str(&json).unwrap();
        prop_assert_eq!(back, wire);
    }

    // Byte strings must come back from CBOR identically too: the adapters
    // encode through strings, so both formats share one canonical shape.
    #[test]
    fn value_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let wire = Wire {
            bytes,
            rows: vec![],
            value: BigUint::from(1u8),
            values: vec![],
        };
        let v = storpulse_core::io::to_json_value(&wire).unwrap();
        let back: Wire = storpulse_core::io::from_json_value(v).unwrap();
        prop_assert_eq!(back, wire);
    }
}
