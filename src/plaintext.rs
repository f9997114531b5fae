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
//! Plain-text content format: a single resource value as raw ASCII, no container and no type tag
//! on the wire - the caller's [`TypeMask`] is the only thing that tells a bare `"25"` apart from
//! an int, a uint or a double. Opaque (`Bytes`) and object-link values have no plain-text
//! representation and are rejected with `FormatError`.
use crate::cbor_ll::Number;
use crate::error::{CoreError, Result};
use crate::leaf::resolve_numeric;
use crate::output::OutputBuffer;
use crate::path::Path;
use crate::value::{Entry, ExternalDataProvider, ExternalKind, ResourceValue, TypeMask};

/// Longest plain-text fragment this layer buffers across `feed_payload` calls.
const CAP: usize = 64;

/// Decodes one plain-text resource value. Unlike the CBOR-backed decoders, the fragment is
/// accumulated into an owned scratch buffer (rather than borrowed from the feed buffer) since
/// plain-text values may legitimately arrive split across chunks with no self-describing length
/// to anchor a zero-copy view on.
pub struct PlaintextDecoder {
    base: Path,
    buf: [u8; CAP],
    len: usize,
    is_last_seen: bool,
    done: bool,
}

impl PlaintextDecoder {
    pub fn new(base: Path) -> Self {
        PlaintextDecoder {
            base,
            buf: [0; CAP],
            len: 0,
            is_last_seen: false,
            done: false,
        }
    }

    /// Append the next chunk of wire bytes. `is_last` marks the final chunk.
    pub fn feed_payload(&mut self, chunk: &[u8], is_last: bool) -> Result<()> {
        if self.len + chunk.len() > CAP {
            return Err(CoreError::BufferTooShort);
        }
        self.buf[self.len..self.len + chunk.len()].copy_from_slice(chunk);
        self.len += chunk.len();
        if is_last {
            self.is_last_seen = true;
        }
        Ok(())
    }

    fn parse(text: &str, mask: TypeMask) -> Result<ResourceValue<'_>> {
        let numeric_allowed = mask.allows(TypeMask::ANY_NUMERIC);
        let string_allowed = mask.allows(TypeMask::STRING);
        let bool_allowed = mask.allows(TypeMask::BOOL);

        if bool_allowed && !numeric_allowed && !string_allowed {
            return match text {
                "0" => Ok(ResourceValue::Bool(false)),
                "1" => Ok(ResourceValue::Bool(true)),
                _ => Err(CoreError::FormatError),
            };
        }

        if string_allowed && !numeric_allowed && !bool_allowed {
            return Ok(ResourceValue::String(text));
        }

        if !numeric_allowed {
            return Err(CoreError::FormatError);
        }
        if let Some(rest) = text.strip_prefix('-') {
            let magnitude: u64 = rest.parse().map_err(|_| CoreError::FormatError)?;
            if magnitude == 0 {
                return resolve_numeric(Number::UInt(0), mask);
            }
            return resolve_numeric(Number::NegInt(magnitude - 1), mask);
        }
        if text.contains('.') || text.contains('e') || text.contains('E') {
            let v: f64 = text.parse().map_err(|_| CoreError::FormatError)?;
            return resolve_numeric(Number::Double(v), mask);
        }
        let v: u64 = text.parse().map_err(|_| CoreError::FormatError)?;
        resolve_numeric(Number::UInt(v), mask)
    }

    /// Decode the resource's value. Returns [`CoreError::WantMore`] until the final chunk has
    /// arrived, then [`CoreError::Eof`] once the single entry has been delivered.
    pub fn get_entry(&mut self, mask: TypeMask) -> Result<Entry<'_>> {
        if self.done {
            return Err(CoreError::Eof);
        }
        if !self.is_last_seen {
            return Err(CoreError::WantMore);
        }
        self.done = true;
        let text = core::str::from_utf8(&self.buf[..self.len]).map_err(|_| CoreError::FormatError)?;
        let value = Self::parse(text, mask)?;
        Ok(Entry::new(self.base, value))
    }

    /// True once the single entry has been delivered.
    pub fn is_finished(&self) -> bool {
        self.done
    }
}

/// Encodes one resource value as plain ASCII text.
pub struct PlaintextEncoder {
    base: Path,
    emitted: bool,
}

impl PlaintextEncoder {
    pub fn new(base: Path) -> Self {
        PlaintextEncoder {
            base,
            emitted: false,
        }
    }

    /// Encode the resource's value. May be called exactly once; a second call is a
    /// [`CoreError::LogicError`].
    pub fn new_entry<'buf>(
        &mut self,
        entry: &Entry<'buf>,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        if self.emitted {
            return Err(CoreError::LogicError);
        }
        if entry.path != self.base {
            return Err(CoreError::InputArgError);
        }

        if let ResourceValue::String(s) = entry.value {
            out.stage_header(&[])?;
            out.stage_inline_tail(s.as_bytes());
            self.emitted = true;
            return Ok(());
        }

        let mut scratch = [0u8; CAP];
        let n = match entry.value {
            ResourceValue::Int(v) => crate::utils::write_i64_decimal(v, &mut scratch)?,
            ResourceValue::UInt(v) => crate::utils::write_u64_decimal(v, &mut scratch)?,
            ResourceValue::Time(t) => crate::utils::write_i64_decimal(t, &mut scratch)?,
            ResourceValue::Double(v) => crate::utils::format_double_plain(v, &mut scratch)?,
            ResourceValue::Bool(b) => {
                scratch[0] = if b { b'1' } else { b'0' };
                1
            }
            ResourceValue::String(_) => unreachable!(),
            ResourceValue::Null | ResourceValue::Bytes(_) | ResourceValue::ObjLnk(_) => {
                return Err(CoreError::InputArgError);
            }
        };

        out.stage_header(&scratch[..n])?;
        self.emitted = true;
        Ok(())
    }

    /// Encode the resource's value from `provider` rather than an inline slice. Plain text has no
    /// opaque-value representation, so `kind` must be [`ExternalKind::String`].
    pub fn new_entry_external<'buf>(
        &mut self,
        path: Path,
        kind: ExternalKind,
        provider: &'buf mut dyn ExternalDataProvider,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        if self.emitted {
            return Err(CoreError::LogicError);
        }
        if path != self.base {
            return Err(CoreError::InputArgError);
        }
        if kind != ExternalKind::String {
            return Err(CoreError::InputArgError);
        }
        out.stage_header(&[])?;
        out.stage_external_tail(provider);
        self.emitted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_uint_from_digits() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut dec = PlaintextDecoder::new(base);
        dec.feed_payload(b"25", true).unwrap();
        let entry = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(entry.value, ResourceValue::UInt(25));
    }

    #[test]
    fn decodes_negative_int() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut dec = PlaintextDecoder::new(base);
        dec.feed_payload(b"-7", true).unwrap();
        let entry = dec.get_entry(TypeMask(TypeMask::INT)).unwrap();
        assert_eq!(entry.value, ResourceValue::Int(-7));
    }

    #[test]
    fn decodes_bool_digit() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut dec = PlaintextDecoder::new(base);
        dec.feed_payload(b"1", true).unwrap();
        let entry = dec.get_entry(TypeMask(TypeMask::BOOL)).unwrap();
        assert_eq!(entry.value, ResourceValue::Bool(true));
    }

    #[test]
    fn suspends_until_last_chunk() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut dec = PlaintextDecoder::new(base);
        dec.feed_payload(b"2", false).unwrap();
        assert_eq!(dec.get_entry(TypeMask(TypeMask::UINT)), Err(CoreError::WantMore));
        dec.feed_payload(b"5", true).unwrap();
        let entry = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(entry.value, ResourceValue::UInt(25));
    }

    #[test]
    fn encodes_uint_as_decimal() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = PlaintextEncoder::new(base);
        let entry = Entry::new(base, ResourceValue::UInt(25));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let mut buf = [0u8; 8];
        let n = out.get_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"25");
    }

    #[test]
    fn encodes_string_as_raw_text() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = PlaintextEncoder::new(base);
        let entry = Entry::new(base, ResourceValue::String("hello"));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let mut buf = [0u8; 8];
        let n = out.get_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn rejects_opaque_value() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = PlaintextEncoder::new(base);
        let entry = Entry::new(base, ResourceValue::Bytes(&[1, 2, 3]));
        let mut out = OutputBuffer::new();
        assert_eq!(enc.new_entry(&entry, &mut out), Err(CoreError::InputArgError));
    }

    struct SliceProvider<'a>(&'a [u8]);

    impl<'a> ExternalDataProvider for SliceProvider<'a> {
        fn fetch(&mut self, dst: &mut [u8], offset: usize) -> Result<()> {
            dst.copy_from_slice(&self.0[offset..offset + dst.len()]);
            Ok(())
        }
        fn len(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn encodes_external_string_as_raw_text() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = PlaintextEncoder::new(base);
        let mut provider = SliceProvider(b"hello");
        let mut out = OutputBuffer::new();
        enc.new_entry_external(base, ExternalKind::String, &mut provider, &mut out)
            .unwrap();
        let mut buf = [0u8; 8];
        let n = out.get_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn rejects_external_opaque_value() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = PlaintextEncoder::new(base);
        let mut provider = SliceProvider(&[1, 2, 3]);
        let mut out = OutputBuffer::new();
        assert_eq!(
            enc.new_entry_external(base, ExternalKind::Bytes, &mut provider, &mut out),
            Err(CoreError::InputArgError)
        );
    }
}
