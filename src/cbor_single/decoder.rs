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
use crate::cbor_ll::{decoder::CborLLDecoder, ItemKind};
use crate::error::{CoreError, Result};
use crate::leaf::{resolve_numeric, resolve_time};
use crate::path::Path;
use crate::value::{Entry, ObjectLink, ResourceValue, TypeMask};

/// Decodes exactly one bare CBOR item, at `base`, into one [`Entry`].
pub struct CborSingleDecoder<'buf> {
    cbor: CborLLDecoder<'buf>,
    base: Path,
    done: bool,
}

impl<'buf> CborSingleDecoder<'buf> {
    pub fn new(base: Path) -> Self {
        CborSingleDecoder {
            cbor: CborLLDecoder::new(),
            base,
            done: false,
        }
    }

    /// Supply the next chunk of wire bytes; see [`CborLLDecoder::feed_payload`].
    pub fn feed_payload(&mut self, buf: &'buf [u8], is_last: bool) -> Result<()> {
        self.cbor.feed_payload(buf, is_last)
    }

    /// Decode the resource's value. Returns [`CoreError::Eof`] once the one entry has been
    /// delivered.
    pub fn get_entry(&mut self, mask: TypeMask) -> Result<Entry<'buf>> {
        if self.done {
            return Err(CoreError::Eof);
        }
        let kind = self.cbor.current_value_type()?;
        let value = match kind {
            ItemKind::UInt | ItemKind::NegInt | ItemKind::Float | ItemKind::Double => {
                resolve_numeric(self.cbor.number()?, mask)?
            }
            ItemKind::Timestamp => resolve_time(self.cbor.number()?, mask)?,
            ItemKind::Bool => {
                if !mask.allows(TypeMask::BOOL) {
                    return Err(CoreError::FormatError);
                }
                ResourceValue::Bool(self.cbor.bool_value()?)
            }
            ItemKind::Null => {
                if !mask.allows(TypeMask::NULL) {
                    return Err(CoreError::FormatError);
                }
                self.cbor.null()?;
                ResourceValue::Null
            }
            ItemKind::Bytes => {
                if !mask.allows(TypeMask::BYTES) {
                    return Err(CoreError::FormatError);
                }
                let chunk = self.cbor.bytes_chunk()?;
                if !chunk.is_last {
                    return Err(CoreError::FormatError);
                }
                ResourceValue::Bytes(chunk.data)
            }
            ItemKind::Text => {
                if !mask.allows(TypeMask::STRING) {
                    return Err(CoreError::FormatError);
                }
                let chunk = self.cbor.bytes_chunk()?;
                if !chunk.is_last {
                    return Err(CoreError::FormatError);
                }
                let s = core::str::from_utf8(chunk.data).map_err(|_| CoreError::FormatError)?;
                ResourceValue::String(s)
            }
            ItemKind::Array => {
                if !mask.allows(TypeMask::OBJLNK) {
                    return Err(CoreError::FormatError);
                }
                let count = self.cbor.enter_array()?;
                if count != Some(2) {
                    return Err(CoreError::FormatError);
                }
                let oid = u16::try_from(self.cbor.number()?.as_u64().ok_or(CoreError::FormatError)?)
                    .map_err(|_| CoreError::FormatError)?;
                let iid = u16::try_from(self.cbor.number()?.as_u64().ok_or(CoreError::FormatError)?)
                    .map_err(|_| CoreError::FormatError)?;
                ResourceValue::ObjLnk(ObjectLink { oid, iid })
            }
            _ => return Err(CoreError::FormatError),
        };
        self.done = true;
        Ok(Entry::new(self.base, value))
    }

    /// True once the single entry has been delivered.
    pub fn is_finished(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_uint() {
        let base = Path::make(&[3, 3, 3]).unwrap();
        let mut dec = CborSingleDecoder::new(base);
        dec.feed_payload(&[0x18, 0x19], true).unwrap();
        let entry = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(entry.path, base);
        assert_eq!(entry.value, ResourceValue::UInt(25));
        assert_eq!(dec.get_entry(TypeMask(TypeMask::ANY)), Err(CoreError::Eof));
    }
}
