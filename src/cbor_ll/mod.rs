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
/***************************************************************************************************
 * Low-level streaming CBOR codec (RFC 8949).
 *
 * `decoder::CborLLDecoder` parses a stream of chunks fed via `feed_payload`, suspending with
 * `CoreError::WantMore` whenever a call needs bytes that have not arrived yet. It keeps at most
 * nine bytes of its own state (a CBOR header plus its widest extension) across calls, and a
 * fixed-capacity nesting stack bounding container depth - no heap allocation anywhere.
 *
 * `encoder::CborLLEncoder` is the mirror image: a set of pure functions writing one self
 * contained CBOR item into a caller-supplied buffer, choosing the narrowest legal header width.
 **************************************************************************************************/
pub mod decoder;
pub mod encoder;

use crate::constants::*;

/// The effective CBOR type of an item the decoder is currently positioned on. `Timestamp`
/// indicates a tag-0 (string date/time) or tag-1 (epoch time) wrapped number; the underlying
/// numeric representation is still retrieved with [`decoder::CborLLDecoder::number`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemKind {
    UInt,
    NegInt,
    Bytes,
    Text,
    Array,
    Map,
    Float,
    Double,
    Bool,
    Null,
    Undefined,
    Timestamp,
}

/// A decoded CBOR number, still tagged by its wire representation so callers can choose the
/// narrowest target type without losing precision unnecessarily.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    /// Non-negative integer, as encoded.
    UInt(u64),
    /// Negative integer; the represented value is `-(magnitude as i128 + 1)`.
    NegInt(u64),
    /// A float16/float32 value, always widened to f32.
    Float(f32),
    /// A float64 value.
    Double(f64),
}

impl Number {
    /// Best-effort conversion to `i64`. Fails (`None`) only on genuine overflow.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::UInt(u) => i64::try_from(u).ok(),
            Number::NegInt(m) => {
                if m > i64::MAX as u64 {
                    None
                } else {
                    Some(-(m as i64) - 1)
                }
            }
            Number::Float(f) => {
                if f.fract() == 0.0 && f >= i64::MIN as f32 && f <= i64::MAX as f32 {
                    Some(f as i64)
                } else {
                    None
                }
            }
            Number::Double(d) => {
                if d.fract() == 0.0 && d >= i64::MIN as f64 && d <= i64::MAX as f64 {
                    Some(d as i64)
                } else {
                    None
                }
            }
        }
    }

    /// Best-effort conversion to `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Number::UInt(u) => Some(u),
            Number::NegInt(_) => None,
            Number::Float(f) => {
                if f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f32 {
                    Some(f as u64)
                } else {
                    None
                }
            }
            Number::Double(d) => {
                if d.fract() == 0.0 && d >= 0.0 && d <= u64::MAX as f64 {
                    Some(d as u64)
                } else {
                    None
                }
            }
        }
    }

    /// Widen to `f64` without loss (within f64's own precision).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::UInt(u) => u as f64,
            Number::NegInt(m) => -(m as f64) - 1.0,
            Number::Float(f) => f as f64,
            Number::Double(d) => d,
        }
    }
}

/// CBOR tag values this crate understands natively; every other tag is skipped.
pub(crate) const TAG_STRING_DATE_TIME: u64 = 0;
pub(crate) const TAG_EPOCH_DATE_TIME: u64 = 1;
pub(crate) const TAG_DECIMAL_FRACTION: u64 = 4;

pub(crate) fn major_type(byte: u8) -> u8 {
    byte >> 5
}

pub(crate) fn additional_info(byte: u8) -> u8 {
    byte & AI_MASK
}
