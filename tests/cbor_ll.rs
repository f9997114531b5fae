use lwm2m_codec_core::cbor_ll::decoder::CborLLDecoder;
use lwm2m_codec_core::cbor_ll::encoder as cbor;
use lwm2m_codec_core::cbor_ll::{ItemKind, Number};
use lwm2m_codec_core::error::CoreError;

#[test]
fn half_float_decodes_to_thirty_two() {
    let mut d = CborLLDecoder::new();
    d.feed_payload(&[0xF9, 0x50, 0x00], true).unwrap();
    assert_eq!(d.current_value_type().unwrap(), ItemKind::Float);
    assert_eq!(d.number().unwrap().as_f64(), 32.0);
}

#[test]
fn small_uint_round_trips_as_a_single_byte() {
    for n in 0u64..=22 {
        let mut buf = [0u8; 9];
        let len = cbor::encode_uint(&mut buf, n).unwrap();
        assert_eq!(len, 1);
        let mut d = CborLLDecoder::new();
        d.feed_payload(&buf[..len], true).unwrap();
        assert_eq!(d.number().unwrap(), Number::UInt(n));
    }
}

#[test]
fn negative_int_round_trips() {
    let mut buf = [0u8; 9];
    let len = cbor::encode_int(&mut buf, -1000).unwrap();
    let mut d = CborLLDecoder::new();
    d.feed_payload(&buf[..len], true).unwrap();
    assert_eq!(d.number().unwrap().as_i64(), Some(-1000));
}

#[test]
fn double_encodes_to_nine_bytes() {
    let mut buf = [0u8; 9];
    let len = cbor::encode_double(&mut buf, 1.0e300).unwrap();
    assert_eq!(len, 9);
    let mut d = CborLLDecoder::new();
    d.feed_payload(&buf[..len], true).unwrap();
    assert_eq!(d.number().unwrap().as_f64(), 1.0e300);
}

#[test]
fn splitting_input_at_any_offset_yields_same_sequence() {
    // {3: 25, 1: 11} fed whole vs. split mid-header.
    let whole: &[u8] = &[0xBF, 0x03, 0x18, 0x19, 0x01, 0x0B, 0xFF];
    let mut one_shot = CborLLDecoder::new();
    one_shot.feed_payload(whole, true).unwrap();
    one_shot.enter_map().unwrap();
    let expect: [Number; 4] = [
        one_shot.number().unwrap(),
        one_shot.number().unwrap(),
        one_shot.number().unwrap(),
        one_shot.number().unwrap(),
    ];

    for split in 1..whole.len() {
        let mut d = CborLLDecoder::new();
        d.feed_payload(&whole[..split], false).unwrap();
        // keep feeding until the map can be entered
        while d.enter_map().is_err() {
            d.feed_payload(&whole[split..], true).unwrap();
            break;
        }
        let got: [Number; 4] = [
            d.number().unwrap(),
            d.number().unwrap(),
            d.number().unwrap(),
            d.number().unwrap(),
        ];
        assert_eq!(got, expect);
    }
}

#[test]
fn splitting_input_at_any_offset_resumes_a_tagged_string_time() {
    // Tag 0 (RFC 3339 string date-time): C0 78 19 "2003-12-13T18:30:02+01:00" (25-byte string).
    // The tag's own sub-parser has to save its progress across a split, since a WantMore partway
    // through the string content (or the exponent of a decimal fraction) used to get silently
    // reinterpreted as a fresh top-level item once more input arrived.
    let mut whole: std::vec::Vec<u8> = std::vec![0xC0, 0x78, 0x19];
    whole.extend_from_slice(b"2003-12-13T18:30:02+01:00");

    let mut one_shot = CborLLDecoder::new();
    one_shot.feed_payload(&whole, true).unwrap();
    assert_eq!(one_shot.current_value_type().unwrap(), ItemKind::Timestamp);
    let expect = one_shot.number().unwrap().as_i64();
    assert_eq!(expect, Some(1071336602));

    for split in 1..whole.len() {
        let mut d = CborLLDecoder::new();
        d.feed_payload(&whole[..split], false).unwrap();
        let kind = loop {
            match d.current_value_type() {
                Ok(k) => break k,
                Err(CoreError::WantMore) => d.feed_payload(&whole[split..], true).unwrap(),
                Err(e) => panic!("split {}: unexpected error {:?}", split, e),
            }
        };
        assert_eq!(kind, ItemKind::Timestamp, "split {}", split);
        let got = loop {
            match d.number() {
                Ok(n) => break n,
                Err(CoreError::WantMore) => d.feed_payload(&whole[split..], true).unwrap(),
                Err(e) => panic!("split {}: unexpected error {:?}", split, e),
            }
        };
        assert_eq!(got.as_i64(), expect, "split {}", split);
    }
}

#[test]
fn splitting_input_at_any_offset_resumes_a_decimal_fraction() {
    // Tag 4 (decimal fraction) wrapping the array [-2, 27315]: C4 82 21 19 6A B3 -> 273.15.
    let whole: &[u8] = &[0xC4, 0x82, 0x21, 0x19, 0x6A, 0xB3];

    let mut one_shot = CborLLDecoder::new();
    one_shot.feed_payload(whole, true).unwrap();
    assert_eq!(one_shot.current_value_type().unwrap(), ItemKind::Double);
    let expect = one_shot.number().unwrap().as_f64();
    assert!((expect - 273.15).abs() < 1e-9);

    for split in 1..whole.len() {
        let mut d = CborLLDecoder::new();
        d.feed_payload(&whole[..split], false).unwrap();
        let kind = loop {
            match d.current_value_type() {
                Ok(k) => break k,
                Err(CoreError::WantMore) => d.feed_payload(&whole[split..], true).unwrap(),
                Err(e) => panic!("split {}: unexpected error {:?}", split, e),
            }
        };
        assert_eq!(kind, ItemKind::Double, "split {}", split);
        let got = loop {
            match d.number() {
                Ok(n) => break n,
                Err(CoreError::WantMore) => d.feed_payload(&whole[split..], true).unwrap(),
                Err(e) => panic!("split {}: unexpected error {:?}", split, e),
            }
        };
        assert_eq!(got.as_f64(), expect, "split {}", split);
    }
}

#[test]
fn overflowing_positive_header_is_a_format_error() {
    let mut d = CborLLDecoder::new();
    d.feed_payload(&[0x1B, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], true)
        .unwrap();
    assert_eq!(d.number().unwrap(), Number::UInt(u64::MAX));
}

#[test]
fn overflowing_negative_header_is_a_format_error() {
    let mut d = CborLLDecoder::new();
    d.feed_payload(&[0x3B, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], true)
        .unwrap();
    assert_eq!(d.number().unwrap().as_i64(), None);
}

#[test]
fn empty_indefinite_array_has_length_zero() {
    let mut d = CborLLDecoder::new();
    d.feed_payload(&[0x9F, 0xFF, 0x01], true).unwrap();
    assert_eq!(d.enter_array().unwrap(), None);
    assert_eq!(d.current_value_type().unwrap(), ItemKind::UInt);
    assert_eq!(d.number().unwrap(), Number::UInt(1));
}

#[test]
fn indefinite_map_with_odd_items_is_a_format_error() {
    let mut d = CborLLDecoder::new();
    // {_ 1: } - a key with no value before BREAK.
    d.feed_payload(&[0xBF, 0x01, 0xFF], true).unwrap();
    d.enter_map().unwrap();
    assert_eq!(d.number().unwrap(), Number::UInt(1));
    assert_eq!(d.current_value_type(), Err(CoreError::FormatError));
}
