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
//! Numeric-kind disambiguation shared by every codec that pulls a bare CBOR/TLV number into a
//! [`ResourceValue`]: a wire integer is ambiguously `int`/`uint`/`double` until the caller's
//! [`TypeMask`] narrows it, exactly as the low-level CBOR decoder's `Number` itself is ambiguous
//! until someone picks a target representation (see [`crate::cbor_ll::Number`]).
use crate::cbor_ll::Number;
use crate::error::{CoreError, Result};
use crate::value::{ResourceValue, TypeMask};

/// Resolve a decoded CBOR/TLV number against `mask`. Returns
/// [`CoreError::WantTypeDisambiguation`] if more than one of the mask's numeric bits could
/// represent `number`, and [`CoreError::FormatError`] if none can.
pub(crate) fn resolve_numeric<'buf>(number: Number, mask: TypeMask) -> Result<ResourceValue<'buf>> {
    let want_int = mask.allows(TypeMask::INT);
    let want_uint = mask.allows(TypeMask::UINT);
    let want_double = mask.allows(TypeMask::DOUBLE);

    match number {
        Number::UInt(_) | Number::NegInt(_) => {
            let is_nonneg = matches!(number, Number::UInt(_));
            let mut candidates = 0u32;
            if want_int {
                candidates += 1;
            }
            if want_uint && is_nonneg {
                candidates += 1;
            }
            if want_double {
                candidates += 1;
            }
            if candidates == 0 {
                return Err(CoreError::FormatError);
            }
            if candidates > 1 {
                return Err(CoreError::WantTypeDisambiguation);
            }
            if want_int {
                return Ok(ResourceValue::Int(
                    number.as_i64().ok_or(CoreError::FormatError)?,
                ));
            }
            if want_uint && is_nonneg {
                return Ok(ResourceValue::UInt(
                    number.as_u64().ok_or(CoreError::FormatError)?,
                ));
            }
            Ok(ResourceValue::Double(number.as_f64()))
        }
        Number::Float(_) | Number::Double(_) => {
            if !want_double {
                return Err(CoreError::FormatError);
            }
            Ok(ResourceValue::Double(number.as_f64()))
        }
    }
}

/// Resolve a decoded number that the wire format has tagged as a timestamp (CBOR tag 0/1, or a
/// TLV time-kind field). Fails unless the caller's mask admits [`TypeMask::TIME`].
pub(crate) fn resolve_time<'buf>(number: Number, mask: TypeMask) -> Result<ResourceValue<'buf>> {
    if !mask.allows(TypeMask::TIME) {
        return Err(CoreError::FormatError);
    }
    Ok(ResourceValue::Time(
        number.as_i64().ok_or(CoreError::FormatError)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_nonneg_uint_needs_disambiguation() {
        let mask = TypeMask(TypeMask::ANY_NUMERIC);
        assert_eq!(
            resolve_numeric(Number::UInt(5), mask),
            Err(CoreError::WantTypeDisambiguation)
        );
    }

    #[test]
    fn negative_cannot_be_uint() {
        let mask = TypeMask(TypeMask::UINT | TypeMask::INT);
        assert_eq!(
            resolve_numeric(Number::NegInt(0), mask),
            Ok(ResourceValue::Int(-1))
        );
    }

    #[test]
    fn float_rejected_without_double_bit() {
        let mask = TypeMask(TypeMask::INT | TypeMask::UINT);
        assert_eq!(
            resolve_numeric(Number::Double(1.5), mask),
            Err(CoreError::FormatError)
        );
    }
}
