/***************************************************************************************************
 * Copyright (c) 2021-2024 Qualcomm Innovation Center, Inc. All rights reserved.
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the “Software”), to deal in the Software without
 * restriction, including without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice (including the next
 * paragraph) shall be included in all copies or substantial portions of the
 * Software.
 *
 * THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
 * BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 **************************************************************************************************/
//! Pure, allocation-free functions writing one self-contained CBOR item into a caller buffer.
//! Each call is independent: the encoder keeps no state of its own (container nesting is tracked
//! by the higher-level codecs, which call `write_array_header`/`write_map_header` explicitly).
use crate::constants::*;
use crate::error::{CoreError, Result};
#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

const MT_UINT_SHIFTED: u8 = MT_UINT;
const MT_NINT_SHIFTED: u8 = MT_NINT;

#[cfg_attr(feature = "trace", trace)]
fn write_header(buf: &mut [u8], major: u8, value: u64) -> Result<usize> {
    if value <= PAYLOAD_AI_BITS as u64 {
        if buf.is_empty() {
            return Err(CoreError::InputArgError);
        }
        buf[0] = major | value as u8;
        Ok(1)
    } else if value <= u8::MAX as u64 {
        if buf.len() < 2 {
            return Err(CoreError::InputArgError);
        }
        buf[0] = major | PAYLOAD_ONE_BYTE;
        buf[1] = value as u8;
        Ok(2)
    } else if value <= u16::MAX as u64 {
        if buf.len() < 3 {
            return Err(CoreError::InputArgError);
        }
        buf[0] = major | PAYLOAD_TWO_BYTES;
        buf[1..3].copy_from_slice(&(value as u16).to_be_bytes());
        Ok(3)
    } else if value <= u32::MAX as u64 {
        if buf.len() < 5 {
            return Err(CoreError::InputArgError);
        }
        buf[0] = major | PAYLOAD_FOUR_BYTES;
        buf[1..5].copy_from_slice(&(value as u32).to_be_bytes());
        Ok(5)
    } else {
        if buf.len() < 9 {
            return Err(CoreError::InputArgError);
        }
        buf[0] = major | PAYLOAD_EIGHT_BYTES;
        buf[1..9].copy_from_slice(&value.to_be_bytes());
        Ok(9)
    }
}

/// Encode a non-negative integer, choosing the narrowest legal header width.
#[cfg_attr(feature = "trace", trace)]
pub fn encode_uint(buf: &mut [u8], value: u64) -> Result<usize> {
    write_header(buf, MT_UINT_SHIFTED, value)
}

/// Encode a signed integer: non-negative values go through [`encode_uint`]; negative values use
/// the major-type-1 `-(magnitude+1)` encoding.
#[cfg_attr(feature = "trace", trace)]
pub fn encode_int(buf: &mut [u8], value: i64) -> Result<usize> {
    if value >= 0 {
        encode_uint(buf, value as u64)
    } else {
        let magnitude = (-(value as i128) - 1) as u64;
        write_header(buf, MT_NINT_SHIFTED, magnitude)
    }
}

/// Encode a boolean simple value (1 byte).
pub fn encode_bool(buf: &mut [u8], value: bool) -> Result<usize> {
    if buf.is_empty() {
        return Err(CoreError::InputArgError);
    }
    buf[0] = MT_SIMPLE | if value { SIMPLE_TRUE } else { SIMPLE_FALSE };
    Ok(1)
}

/// Encode `null` (1 byte).
pub fn encode_null(buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(CoreError::InputArgError);
    }
    buf[0] = MT_SIMPLE | SIMPLE_NULL;
    Ok(1)
}

/// Encode a double, downgrading to a 4-byte float32 header when that is lossless.
#[cfg(feature = "float")]
#[cfg_attr(feature = "trace", trace)]
pub fn encode_double(buf: &mut [u8], value: f64) -> Result<usize> {
    let as_f32 = value as f32;
    if as_f32 as f64 == value && !value.is_nan() {
        encode_f32(buf, as_f32)
    } else {
        if buf.len() < 9 {
            return Err(CoreError::InputArgError);
        }
        buf[0] = MT_FLOAT | PAYLOAD_EIGHT_BYTES;
        buf[1..9].copy_from_slice(&value.to_bits().to_be_bytes());
        Ok(9)
    }
}

/// Encode a float32 value (5 bytes).
#[cfg(feature = "float")]
pub fn encode_f32(buf: &mut [u8], value: f32) -> Result<usize> {
    if buf.len() < 5 {
        return Err(CoreError::InputArgError);
    }
    buf[0] = MT_FLOAT | PAYLOAD_FOUR_BYTES;
    buf[1..5].copy_from_slice(&value.to_bits().to_be_bytes());
    Ok(5)
}

/// Encode a half-precision float (3 bytes). Lossy for magnitudes/precision half cannot
/// represent; callers should prefer [`encode_double`]/[`encode_f32`] unless the value is known
/// to round-trip, as LwM2M senders generally do for small sensor readings.
#[cfg(feature = "float")]
pub fn encode_f16(buf: &mut [u8], value: f32) -> Result<usize> {
    if buf.len() < 3 {
        return Err(CoreError::InputArgError);
    }
    let bits = half::f16::from_f32(value).to_bits();
    buf[0] = MT_FLOAT | PAYLOAD_TWO_BYTES;
    buf[1..3].copy_from_slice(&bits.to_be_bytes());
    Ok(3)
}

/// Encode a definite-length byte-string header (the payload is written separately by the
/// caller, possibly across several buffers for large/externally-provided values).
pub fn write_bytes_header(buf: &mut [u8], len: usize) -> Result<usize> {
    write_header(buf, MT_BSTR, len as u64)
}

/// Encode a definite-length text-string header.
pub fn write_text_header(buf: &mut [u8], len: usize) -> Result<usize> {
    write_header(buf, MT_TSTR, len as u64)
}

/// Encode a byte string in one call (header + content); fails if `buf` cannot hold both.
pub fn encode_bytes(buf: &mut [u8], value: &[u8]) -> Result<usize> {
    let hlen = write_bytes_header(buf, value.len())?;
    if buf.len() < hlen + value.len() {
        return Err(CoreError::InputArgError);
    }
    buf[hlen..hlen + value.len()].copy_from_slice(value);
    Ok(hlen + value.len())
}

/// Encode a text string in one call (header + content).
pub fn encode_text(buf: &mut [u8], value: &str) -> Result<usize> {
    let bytes = value.as_bytes();
    let hlen = write_text_header(buf, bytes.len())?;
    if buf.len() < hlen + bytes.len() {
        return Err(CoreError::InputArgError);
    }
    buf[hlen..hlen + bytes.len()].copy_from_slice(bytes);
    Ok(hlen + bytes.len())
}

/// Encode a definite-length array header for `count` elements.
pub fn write_array_header(buf: &mut [u8], count: usize) -> Result<usize> {
    write_header(buf, MT_ARRAY, count as u64)
}

/// Encode an indefinite-length array header (`0x9F`).
pub fn write_array_header_indefinite(buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(CoreError::InputArgError);
    }
    buf[0] = MT_ARRAY | PAYLOAD_INDEFINITE;
    Ok(1)
}

/// Encode a definite-length map header for `pairs` key/value pairs.
pub fn write_map_header(buf: &mut [u8], pairs: usize) -> Result<usize> {
    write_header(buf, MT_MAP, pairs as u64)
}

/// Encode an indefinite-length map header (`0xBF`).
pub fn write_map_header_indefinite(buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(CoreError::InputArgError);
    }
    buf[0] = MT_MAP | PAYLOAD_INDEFINITE;
    Ok(1)
}

/// Encode the `break` stop code (`0xFF`) closing an indefinite-length container.
pub fn write_break(buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Err(CoreError::InputArgError);
    }
    buf[0] = BREAK;
    Ok(1)
}

/// Encode a tag header (the tagged item itself is written separately, immediately after).
pub fn write_tag_header(buf: &mut [u8], tag: u64) -> Result<usize> {
    write_header(buf, MT_TAG, tag)
}

/// Encode a CBOR tag-1 epoch-time wrapped integer (seconds since 1970-01-01T00:00:00Z).
pub fn encode_epoch_time(buf: &mut [u8], epoch_seconds: i64) -> Result<usize> {
    let tag_len = write_tag_header(buf, crate::cbor_ll::TAG_EPOCH_DATE_TIME)?;
    let val_len = encode_int(&mut buf[tag_len..], epoch_seconds)?;
    Ok(tag_len + val_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_small_uint_as_single_byte() {
        let mut buf = [0u8; 9];
        let n = encode_uint(&mut buf, 25).unwrap();
        assert_eq!(&buf[..n], &[0x18, 0x19]);
    }

    #[test]
    fn encodes_inline_uint() {
        let mut buf = [0u8; 9];
        let n = encode_uint(&mut buf, 10).unwrap();
        assert_eq!(&buf[..n], &[0x0A]);
    }

    #[test]
    fn encodes_negative_int() {
        let mut buf = [0u8; 9];
        let n = encode_int(&mut buf, -10).unwrap();
        assert_eq!(&buf[..n], &[0x29]);
    }

    #[cfg(feature = "float")]
    #[test]
    fn encodes_double_as_float32_when_lossless() {
        let mut buf = [0u8; 9];
        let n = encode_double(&mut buf, 32.0).unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf[0] & AI_MASK, PAYLOAD_FOUR_BYTES);
    }
}
