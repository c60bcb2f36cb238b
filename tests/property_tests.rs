// tests/property_tests.rs
use proptest::prelude::*;
use quantis::convert::{decode_hex, decode_hex_strict, encode_hex, encode_hex_into};
use quantis::{count_set_bits, ModuleMask};

proptest! {
    #[test]
    fn hex_text_decodes_to_input_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let text = encode_hex(&data);
        prop_assert_eq!(text.len(), data.len() * 2);
        prop_assert!(text.bytes().all(|c| c.is_ascii_digit() || (b'a'..=b'f').contains(&c)));
        prop_assert_eq!(decode_hex(&text), data.clone());
        prop_assert_eq!(decode_hex_strict(&text).unwrap(), data);
    }

    #[test]
    fn hex_buffer_is_nul_terminated(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut out = vec![0xAAu8; data.len() * 2 + 1];
        let written = encode_hex_into(&data, &mut out).unwrap();
        prop_assert_eq!(written, data.len() * 2);
        prop_assert_eq!(out[written], 0);
        let expected = encode_hex(&data);
        prop_assert_eq!(&out[..written], expected.as_bytes());
    }

    #[test]
    fn set_bits_match_count_ones(value in any::<u32>()) {
        prop_assert_eq!(count_set_bits(value), value.count_ones());
        prop_assert_eq!(ModuleMask(value).modules().count() as u32, value.count_ones());
    }
}
