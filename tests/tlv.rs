use lwm2m_codec_core::dispatcher::{Format, InputContext, Op};
use lwm2m_codec_core::path::Path;
use lwm2m_codec_core::tlv::decoder::TlvDecoder;
use lwm2m_codec_core::value::{ResourceValue, TypeMask};

#[test]
fn single_int_resource_round_trips_through_the_dispatcher() {
    let base = Path::make(&[3, 4]).unwrap();
    let mut dec = InputContext::init(Op::Read, base, Format::Tlv).unwrap();
    dec.feed(&[0xC1, 0x01, 0x2A], true).unwrap();
    let entry = dec.get_entry(TypeMask(TypeMask::INT)).unwrap();
    assert_eq!(entry.path, Path::make(&[3, 4, 1]).unwrap());
    assert_eq!(entry.value, ResourceValue::Int(42));
}

#[test]
fn numeric_mask_on_a_one_byte_value_needs_disambiguation() {
    // A one-byte value is a power-of-two length, so both INT and UINT remain candidates until
    // the mask narrows to one of them.
    let base = Path::make(&[3, 4]).unwrap();
    let mut dec = InputContext::init(Op::Read, base, Format::Tlv).unwrap();
    dec.feed(&[0xC1, 0x01, 0x01], true).unwrap();
    assert_eq!(
        dec.get_entry(TypeMask(TypeMask::ANY_NUMERIC)),
        Err(lwm2m_codec_core::error::CoreError::WantTypeDisambiguation)
    );
}

#[test]
fn bool_mask_alone_resolves_the_same_byte_unambiguously() {
    let base = Path::make(&[3, 4]).unwrap();
    let mut dec = InputContext::init(Op::Read, base, Format::Tlv).unwrap();
    dec.feed(&[0xC1, 0x01, 0x01], true).unwrap();
    let entry = dec.get_entry(TypeMask(TypeMask::BOOL)).unwrap();
    assert_eq!(entry.value, ResourceValue::Bool(true));
}

#[test]
fn resource_path_streams_across_two_feeds_before_the_value_arrives() {
    let base = Path::make(&[3, 4]).unwrap();
    let mut d = TlvDecoder::new(base);
    // A 5-byte bytes value (id-kind Resource, 1-byte id, inline length) split mid-value.
    d.feed_payload(&[0xC5, 0x2A, b'h', b'e'], false).unwrap();
    let path = d.get_path().unwrap();
    assert_eq!(path, Path::make(&[3, 4, 42]).unwrap());
    assert!(d.current_value_len().unwrap() == 5);
    assert!(matches!(
        d.get_bytes_chunk(),
        Err(lwm2m_codec_core::error::CoreError::WantMore)
    ));
    d.feed_payload(b"llo", true).unwrap();
    let chunk = d.get_bytes_chunk().unwrap();
    assert_eq!(chunk.data, b"hello");
    assert!(chunk.is_last);
}
