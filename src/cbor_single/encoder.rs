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
use crate::cbor_ll::encoder as cbor;
use crate::error::{CoreError, Result};
use crate::output::OutputBuffer;
use crate::path::Path;
use crate::value::{Entry, ExternalDataProvider, ExternalKind, ResourceValue};

const SCRATCH_CAP: usize = 16;

/// Encodes exactly one [`Entry`], at `base`, as a single bare CBOR item.
pub struct CborSingleEncoder {
    base: Path,
    emitted: bool,
}

impl CborSingleEncoder {
    pub fn new(base: Path) -> Self {
        CborSingleEncoder {
            base,
            emitted: false,
        }
    }

    /// Encode the resource's value. May be called exactly once; a second call is a [`CoreError::LogicError`].
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

        let mut scratch = [0u8; SCRATCH_CAP];
        let mut pos = 0usize;
        let tail: Option<&'buf [u8]> = match entry.value {
            ResourceValue::Null => {
                pos += cbor::encode_null(&mut scratch[pos..])?;
                None
            }
            ResourceValue::Int(v) => {
                pos += cbor::encode_int(&mut scratch[pos..], v)?;
                None
            }
            ResourceValue::UInt(v) => {
                pos += cbor::encode_uint(&mut scratch[pos..], v)?;
                None
            }
            ResourceValue::Double(v) => {
                pos += cbor::encode_double(&mut scratch[pos..], v)?;
                None
            }
            ResourceValue::Time(t) => {
                pos += cbor::encode_epoch_time(&mut scratch[pos..], t)?;
                None
            }
            ResourceValue::Bool(b) => {
                pos += cbor::encode_bool(&mut scratch[pos..], b)?;
                None
            }
            ResourceValue::ObjLnk(link) => {
                pos += cbor::write_array_header(&mut scratch[pos..], 2)?;
                pos += cbor::encode_uint(&mut scratch[pos..], link.oid as u64)?;
                pos += cbor::encode_uint(&mut scratch[pos..], link.iid as u64)?;
                None
            }
            ResourceValue::String(s) => {
                pos += cbor::write_text_header(&mut scratch[pos..], s.len())?;
                Some(s.as_bytes())
            }
            ResourceValue::Bytes(b) => {
                pos += cbor::write_bytes_header(&mut scratch[pos..], b.len())?;
                Some(b)
            }
        };

        out.stage_header(&scratch[..pos])?;
        if let Some(data) = tail {
            out.stage_inline_tail(data);
        }
        self.emitted = true;
        Ok(())
    }

    /// Encode the resource's value from `provider` rather than an inline slice, for a byte or
    /// text string whose content is fetched lazily. Same one-shot/base-path rules as
    /// [`Self::new_entry`].
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

        let mut scratch = [0u8; SCRATCH_CAP];
        let total_len = provider.len();
        let pos = match kind {
            ExternalKind::String => cbor::write_text_header(&mut scratch, total_len)?,
            ExternalKind::Bytes => cbor::write_bytes_header(&mut scratch, total_len)?,
        };

        out.stage_header(&scratch[..pos])?;
        out.stage_external_tail(provider);
        self.emitted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(out: &mut OutputBuffer) -> std::vec::Vec<u8> {
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 4];
            let n = out.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out.has_more() {
                break;
            }
        }
        collected
    }

    #[test]
    fn encodes_single_uint() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = CborSingleEncoder::new(base);
        let entry = Entry::new(base, ResourceValue::UInt(25));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        assert_eq!(drain(&mut out), std::vec![0x18, 0x19]);
    }

    #[test]
    fn rejects_second_entry() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = CborSingleEncoder::new(base);
        let entry = Entry::new(base, ResourceValue::UInt(1));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let mut out2 = OutputBuffer::new();
        assert_eq!(enc.new_entry(&entry, &mut out2), Err(CoreError::LogicError));
    }

    #[test]
    fn rejects_entry_off_base() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = CborSingleEncoder::new(base);
        let entry = Entry::new(Path::make(&[3, 3, 4]).unwrap(), ResourceValue::UInt(1));
        let mut out = OutputBuffer::new();
        assert_eq!(enc.new_entry(&entry, &mut out), Err(CoreError::InputArgError));
    }

    struct SliceProvider<'a>(&'a [u8]);

    impl<'a> crate::value::ExternalDataProvider for SliceProvider<'a> {
        fn fetch(&mut self, dst: &mut [u8], offset: usize) -> Result<()> {
            dst.copy_from_slice(&self.0[offset..offset + dst.len()]);
            Ok(())
        }
        fn len(&self) -> usize {
            self.0.len()
        }
    }

    #[test]
    fn encodes_external_bytes_via_provider() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut enc = CborSingleEncoder::new(base);
        let mut provider = SliceProvider(b"opaque");
        let mut out = OutputBuffer::new();
        enc.new_entry_external(base, ExternalKind::Bytes, &mut provider, &mut out)
            .unwrap();
        let mut expected = std::vec![0x46u8];
        expected.extend_from_slice(b"opaque");
        assert_eq!(drain(&mut out), expected);
    }
}
