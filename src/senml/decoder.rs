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
use crate::leaf::resolve_numeric;
use crate::path::Path;
use crate::senml::{
    KEY_OBJLNK_VALUE, LABEL_BASENAME, LABEL_BASETIME, LABEL_BOOL_VALUE, LABEL_NAME,
    LABEL_OPAQUE_VALUE, LABEL_STRING_VALUE, LABEL_TIME, LABEL_VALUE, MAX_PATH_STR,
};
use crate::value::{Entry, ObjectLink, ResourceValue, TypeMask};
#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

enum Label {
    Int(i64),
    ObjLnkValue,
}

/// Decodes a SenML-CBOR payload (an array of records) into a stream of [`Entry`] values,
/// resolving each record's basename/name pair against `base` and tracking the running base time.
pub struct SenMLDecoder<'buf> {
    cbor: CborLLDecoder<'buf>,
    base: Path,
    entered_outer: bool,
    /// Outer array element count, filled in on first entry into the array: the definite count,
    /// or `-1` if the array is indefinite-length (the original source's own sentinel for "unknown
    /// up front").
    outer_count: i64,
    basename: [u8; MAX_PATH_STR],
    basename_len: usize,
    basetime: f64,
    finished: bool,
}

impl<'buf> SenMLDecoder<'buf> {
    /// A decoder whose resolved entry paths must fall within `base` (or equal it).
    pub fn new(base: Path) -> Self {
        SenMLDecoder {
            cbor: CborLLDecoder::new(),
            base,
            entered_outer: false,
            outer_count: -1,
            basename: [0; MAX_PATH_STR],
            basename_len: 0,
            basetime: f64::NAN,
            finished: false,
        }
    }

    /// Supply the next chunk of wire bytes; see [`CborLLDecoder::feed_payload`].
    pub fn feed_payload(&mut self, buf: &'buf [u8], is_last: bool) -> Result<()> {
        self.cbor.feed_payload(buf, is_last)
    }

    fn read_text(&mut self, out: &mut [u8]) -> Result<usize> {
        let kind = self.cbor.current_value_type()?;
        if kind != ItemKind::Text {
            return Err(CoreError::FormatError);
        }
        let mut total = 0usize;
        loop {
            let chunk = self.cbor.bytes_chunk()?;
            if total + chunk.data.len() > out.len() {
                return Err(CoreError::BufferTooShort);
            }
            out[total..total + chunk.data.len()].copy_from_slice(chunk.data);
            total += chunk.data.len();
            if chunk.is_last {
                break;
            }
        }
        Ok(total)
    }

    /// A byte/text value borrowed zero-copy from the feed buffer. Only values delivered as a
    /// single CBOR chunk are supported at this layer (the common case for resource-sized
    /// payloads); a genuinely fragmented value is reported as `FormatError` rather than copied,
    /// since there is nowhere with `'buf` lifetime to copy it into.
    fn read_borrowed_bytes(&mut self) -> Result<&'buf [u8]> {
        let kind = self.cbor.current_value_type()?;
        if kind != ItemKind::Bytes {
            return Err(CoreError::FormatError);
        }
        let chunk = self.cbor.bytes_chunk()?;
        if !chunk.is_last {
            return Err(CoreError::FormatError);
        }
        Ok(chunk.data)
    }

    fn read_borrowed_str(&mut self) -> Result<&'buf str> {
        let kind = self.cbor.current_value_type()?;
        if kind != ItemKind::Text {
            return Err(CoreError::FormatError);
        }
        let chunk = self.cbor.bytes_chunk()?;
        if !chunk.is_last {
            return Err(CoreError::FormatError);
        }
        core::str::from_utf8(chunk.data).map_err(|_| CoreError::FormatError)
    }

    /// Number of records in the outer array: the definite count if the wire encoded one, or `-1`
    /// if the outer array is indefinite-length (its true count is not known until it closes).
    /// Entering the outer array happens at most once, whether triggered by this call or by the
    /// first [`Self::get_entry`].
    pub fn get_entry_count(&mut self) -> Result<i64> {
        self.ensure_entered_outer()?;
        Ok(self.outer_count)
    }

    fn ensure_entered_outer(&mut self) -> Result<()> {
        if !self.entered_outer {
            let kind = self.cbor.current_value_type()?;
            if kind != ItemKind::Array {
                return Err(CoreError::FormatError);
            }
            let n = self.cbor.enter_array()?;
            self.outer_count = match n {
                Some(c) => c as i64,
                None => -1,
            };
            self.entered_outer = true;
        }
        Ok(())
    }

    /// Decode the next record. Returns [`CoreError::Eof`] once the outer array is exhausted.
    #[cfg_attr(feature = "trace", trace)]
    pub fn get_entry(&mut self, mask: TypeMask) -> Result<Entry<'buf>> {
        if self.finished {
            return Err(CoreError::Eof);
        }
        self.ensure_entered_outer()?;
        let kind = match self.cbor.current_value_type() {
            Err(CoreError::Eof) => {
                self.finished = true;
                return Err(CoreError::Eof);
            }
            Err(e) => return Err(e),
            Ok(k) => k,
        };
        if kind != ItemKind::Map {
            return Err(CoreError::FormatError);
        }
        let pair_count = self.cbor.enter_map()?;
        let my_depth = self.cbor.nesting_level();

        let mut name_buf = [0u8; MAX_PATH_STR];
        let mut name_len = 0usize;
        let mut has_name = false;
        let mut entry_t: Option<f64> = None;
        let mut value: Option<ResourceValue<'buf>> = None;
        let mut pairs_read = 0usize;

        loop {
            match pair_count {
                Some(n) => {
                    if pairs_read >= n {
                        break;
                    }
                }
                None => {
                    let _ = self.cbor.current_value_type()?;
                    if self.cbor.nesting_level() < my_depth {
                        break;
                    }
                }
            }

            let key_kind = self.cbor.current_value_type()?;
            let label = match key_kind {
                ItemKind::UInt | ItemKind::NegInt => {
                    let n = self.cbor.number()?;
                    Label::Int(n.as_i64().ok_or(CoreError::FormatError)?)
                }
                ItemKind::Text => {
                    let mut buf = [0u8; 8];
                    let n = self.read_text(&mut buf)?;
                    if &buf[..n] == KEY_OBJLNK_VALUE.as_bytes() {
                        Label::ObjLnkValue
                    } else {
                        return Err(CoreError::FormatError);
                    }
                }
                _ => return Err(CoreError::FormatError),
            };
            pairs_read += 1;

            match label {
                Label::Int(l) if l == LABEL_BASETIME => {
                    self.basetime = self.cbor.number()?.as_f64();
                }
                Label::Int(l) if l == LABEL_BASENAME => {
                    let mut buf = [0u8; MAX_PATH_STR];
                    let n = self.read_text(&mut buf)?;
                    self.basename[..n].copy_from_slice(&buf[..n]);
                    self.basename_len = n;
                }
                Label::Int(l) if l == LABEL_NAME => {
                    name_len = self.read_text(&mut name_buf)?;
                    has_name = true;
                }
                Label::Int(l) if l == LABEL_VALUE => {
                    let n = self.cbor.number()?;
                    value = Some(resolve_numeric(n, mask)?);
                }
                Label::Int(l) if l == LABEL_STRING_VALUE => {
                    if !mask.allows(TypeMask::STRING) {
                        return Err(CoreError::FormatError);
                    }
                    value = Some(ResourceValue::String(self.read_borrowed_str()?));
                }
                Label::Int(l) if l == LABEL_BOOL_VALUE => {
                    if !mask.allows(TypeMask::BOOL) {
                        return Err(CoreError::FormatError);
                    }
                    let kind = self.cbor.current_value_type()?;
                    if kind != ItemKind::Bool {
                        return Err(CoreError::FormatError);
                    }
                    value = Some(ResourceValue::Bool(self.cbor.bool_value()?));
                }
                Label::Int(l) if l == LABEL_TIME => {
                    entry_t = Some(self.cbor.number()?.as_f64());
                }
                Label::Int(l) if l == LABEL_OPAQUE_VALUE => {
                    if !mask.allows(TypeMask::BYTES) {
                        return Err(CoreError::FormatError);
                    }
                    value = Some(ResourceValue::Bytes(self.read_borrowed_bytes()?));
                }
                Label::ObjLnkValue => {
                    if !mask.allows(TypeMask::OBJLNK) {
                        return Err(CoreError::FormatError);
                    }
                    let mut buf = [0u8; MAX_PATH_STR];
                    let n = self.read_text(&mut buf)?;
                    let s = core::str::from_utf8(&buf[..n]).map_err(|_| CoreError::FormatError)?;
                    let (oid, iid) = crate::utils::parse_objlnk(s)?;
                    value = Some(ResourceValue::ObjLnk(ObjectLink { oid, iid }));
                }
                Label::Int(_) => {
                    self.cbor.skip_item()?;
                }
            }
        }

        let mut combined = [0u8; MAX_PATH_STR * 2];
        let mut combined_len = 0usize;
        combined[..self.basename_len].copy_from_slice(&self.basename[..self.basename_len]);
        combined_len += self.basename_len;
        if has_name {
            combined[combined_len..combined_len + name_len].copy_from_slice(&name_buf[..name_len]);
            combined_len += name_len;
        }
        let path_str =
            core::str::from_utf8(&combined[..combined_len]).map_err(|_| CoreError::FormatError)?;
        let path = crate::utils::parse_absolute_path(path_str)?;
        if path.outside_base(&self.base) {
            return Err(CoreError::FormatError);
        }

        let timestamp = match entry_t {
            Some(t) => {
                if self.basetime.is_nan() {
                    t
                } else {
                    self.basetime + t
                }
            }
            None => self.basetime,
        };

        let value = value.ok_or(CoreError::FormatError)?;
        Ok(Entry::new(path, value).with_timestamp(timestamp))
    }

    /// True once every record has been delivered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_record_with_name_and_basetime() {
        let mut bytes = std::vec![0x81u8, 0xA3, 0x00, 0x66];
        bytes.extend_from_slice(b"/3/3/3");
        bytes.extend_from_slice(&[0x22, 0xFA, 0x47, 0xC3, 0x50, 0x00, 0x02, 0x18, 0x19]);
        let base = Path::ROOT;
        let mut dec = SenMLDecoder::new(base);
        dec.feed_payload(&bytes, true).unwrap();
        let entry = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(entry.path, Path::make(&[3, 3, 3]).unwrap());
        match entry.value {
            ResourceValue::UInt(25) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(entry.timestamp, 100000.0);
        assert_eq!(dec.get_entry(TypeMask(TypeMask::ANY)), Err(CoreError::Eof));
    }

    #[test]
    fn basename_persists_across_records() {
        // [{-2:"/3/0", 0:"/1", 2:5}, {2:7}]  -- second record reuses basename, no "n" -> path "/3/0"
        let mut bytes = std::vec![0x82u8, 0xA3, 0x21, 0x64];
        bytes.extend_from_slice(b"/3/0");
        bytes.extend_from_slice(&[0x00, 0x62]);
        bytes.extend_from_slice(b"/1");
        bytes.extend_from_slice(&[0x02, 0x05]);
        bytes.extend_from_slice(&[0xA1, 0x02, 0x07]);
        let base = Path::make(&[3]).unwrap();
        let mut dec = SenMLDecoder::new(base);
        dec.feed_payload(&bytes, true).unwrap();
        let e1 = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(e1.path, Path::make(&[3, 0, 1]).unwrap());
        let e2 = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(e2.path, Path::make(&[3, 0]).unwrap());
    }

    #[test]
    fn entry_count_reports_definite_array_length() {
        let mut bytes = std::vec![0x81u8, 0xA3, 0x00, 0x66];
        bytes.extend_from_slice(b"/3/3/3");
        bytes.extend_from_slice(&[0x22, 0xFA, 0x47, 0xC3, 0x50, 0x00, 0x02, 0x18, 0x19]);
        let mut dec = SenMLDecoder::new(Path::ROOT);
        dec.feed_payload(&bytes, true).unwrap();
        assert_eq!(dec.get_entry_count().unwrap(), 1);
        // still usable afterwards -- entering the outer array is idempotent
        dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
    }

    #[test]
    fn entry_count_is_negative_sentinel_for_indefinite_array() {
        // indefinite array (0x9F) holding one record, then BREAK (0xFF)
        let mut bytes = std::vec![0x9Fu8, 0xA1, 0x00, 0x66];
        bytes.extend_from_slice(b"/3/3/3");
        bytes.push(0xFF);
        let mut dec = SenMLDecoder::new(Path::ROOT);
        dec.feed_payload(&bytes, true).unwrap();
        assert_eq!(dec.get_entry_count().unwrap(), -1);
    }
}
