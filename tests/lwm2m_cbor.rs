use lwm2m_codec_core::dispatcher::{Format, InputContext, LinkFormatOp, Op, OutputContext};
use lwm2m_codec_core::output::OutputBuffer;
use lwm2m_codec_core::path::Path;
use lwm2m_codec_core::value::{Entry, ResourceValue, TypeMask};

fn drain(out: &mut OutputBuffer, wire: &mut [u8]) -> usize {
    let mut total = 0usize;
    loop {
        let n = out.get_payload(&mut wire[total..]).unwrap();
        total += n;
        if !out.has_more() {
            break;
        }
    }
    total
}

#[test]
fn two_sibling_resources_match_the_documented_wire_bytes() {
    // Scenario 3: [(/3/3/3, u=25), (/3/3/1, u=11)]
    //   -> BF 03 BF 03 BF 03 18 19 01 0B FF FF FF
    let base = Path::ROOT;
    let mut enc = OutputContext::init(base, Format::LwM2MCbor, LinkFormatOp::Register, 2).unwrap();

    let e1 = Entry::new(Path::make(&[3, 3, 3]).unwrap(), ResourceValue::UInt(25));
    let e2 = Entry::new(Path::make(&[3, 3, 1]).unwrap(), ResourceValue::UInt(11));

    let mut out = OutputBuffer::new();
    enc.new_entry(&e1, &mut out).unwrap();
    enc.new_entry(&e2, &mut out).unwrap();

    let mut wire = [0u8; 32];
    let mut total = drain(&mut out, &mut wire);

    let mut closing = OutputBuffer::new();
    while enc.destroy(&mut closing).unwrap() {
        total += drain(&mut closing, &mut wire[total..]);
    }

    assert_eq!(
        &wire[..total],
        &[0xBF, 0x03, 0xBF, 0x03, 0xBF, 0x03, 0x18, 0x19, 0x01, 0x0B, 0xFF, 0xFF, 0xFF]
    );

    let mut dec = InputContext::init(Op::Read, base, Format::LwM2MCbor).unwrap();
    dec.feed(&wire[..total], true).unwrap();

    let first = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
    assert_eq!(first.path, Path::make(&[3, 3, 3]).unwrap());
    assert_eq!(first.value, ResourceValue::UInt(25));

    let second = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
    assert_eq!(second.path, Path::make(&[3, 3, 1]).unwrap());
    assert_eq!(second.value, ResourceValue::UInt(11));

    assert!(dec.is_finished());
}

#[test]
fn duplicate_path_is_rejected_as_an_input_arg_error() {
    let base = Path::make(&[3]).unwrap();
    let mut enc = OutputContext::init(base, Format::LwM2MCbor, LinkFormatOp::Register, 2).unwrap();
    let entry = Entry::new(Path::make(&[3, 3, 3]).unwrap(), ResourceValue::UInt(1));
    let mut out = OutputBuffer::new();
    enc.new_entry(&entry, &mut out).unwrap();
    assert_eq!(
        enc.new_entry(&entry, &mut out),
        Err(lwm2m_codec_core::error::CoreError::InputArgError)
    );
}

#[test]
fn entries_split_across_two_feeds_decode_identically_to_one_feed() {
    let base = Path::ROOT;
    let bytes: [u8; 13] = [
        0xBF, 0x03, 0xBF, 0x03, 0xBF, 0x03, 0x18, 0x19, 0x01, 0x0B, 0xFF, 0xFF, 0xFF,
    ];

    let mut whole = InputContext::init(Op::Read, base, Format::LwM2MCbor).unwrap();
    whole.feed(&bytes, true).unwrap();
    let whole_first = whole.get_entry(TypeMask(TypeMask::UINT)).unwrap();
    let whole_second = whole.get_entry(TypeMask(TypeMask::UINT)).unwrap();

    let mut split = InputContext::init(Op::Read, base, Format::LwM2MCbor).unwrap();
    // Split right after the first entry's value so the first `get_entry` call has everything it
    // needs without touching the second entry's bytes.
    split.feed(&bytes[..8], false).unwrap();
    let split_first = split.get_entry(TypeMask(TypeMask::UINT)).unwrap();
    split.feed(&bytes[8..], true).unwrap();
    let split_second = split.get_entry(TypeMask(TypeMask::UINT)).unwrap();

    assert_eq!(whole_first.path, split_first.path);
    assert_eq!(whole_first.value, split_first.value);
    assert_eq!(whole_second.path, split_second.path);
    assert_eq!(whole_second.value, split_second.value);
}
