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
use crate::senml::{
    KEY_OBJLNK_VALUE, LABEL_BASENAME, LABEL_BASETIME, LABEL_BOOL_VALUE, LABEL_NAME,
    LABEL_OPAQUE_VALUE, LABEL_STRING_VALUE, LABEL_TIME, LABEL_VALUE, MAX_PATH_STR,
};
use crate::value::{Entry, ExternalDataProvider, ExternalKind, ResourceValue};
#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

/// Worst-case size of one record's fixed-size fields (map header, `bn`, `n`, `bt`/`t`, and the
/// value label plus - for `Bytes`/`String` - its header only, not its content).
const RECORD_SCRATCH_CAP: usize = 96;

/// Encodes a stream of [`Entry`] values as a SenML-CBOR array of records, maintaining the running
/// `bn` (base name) and `bt` (base time) state an RFC 8428 writer is expected to track so it only
/// repeats a field when the value actually changes.
///
/// The outer CBOR array itself is this encoder's responsibility too, not just the records inside
/// it - a `SenMLDecoder` always expects to find one. `item_count` (mirroring the negative-sentinel
/// convention [`SenMLDecoder::get_entry_count`] uses on the read side) picks a definite-length
/// header when the caller knows the count up front, or an indefinite one (closed by
/// [`Self::destroy`]) when it does not.
pub struct SenMLEncoder {
    base: Path,
    item_count: i64,
    entries_written: usize,
    bn_active: bool,
    last_bt: f64,
    array_opened: bool,
    array_indefinite: bool,
    array_closed: bool,
}

impl SenMLEncoder {
    /// `base` is the context's base path; entries offered to [`Self::new_entry`] must fall
    /// within it. `bn` is emitted once, on the first entry, only if `base` is a non-empty strict
    /// ancestor of that entry's path - otherwise every record's `n` carries the full path.
    /// `item_count` is the number of records the caller intends to write, or a negative value if
    /// that count is not known up front (e.g. a Composite-Read whose result set streams out as
    /// it is produced).
    pub fn new(base: Path, item_count: i64) -> Self {
        SenMLEncoder {
            base,
            item_count,
            entries_written: 0,
            bn_active: false,
            last_bt: f64::NAN,
            array_opened: false,
            array_indefinite: false,
            array_closed: false,
        }
    }

    #[cfg_attr(feature = "trace", trace)]
    fn write_label(buf: &mut [u8], pos: usize, label: i64) -> Result<usize> {
        cbor::encode_int(&mut buf[pos..], label)
    }

    fn write_path_text(buf: &mut [u8], pos: usize, path: &Path) -> Result<usize> {
        let mut path_buf = [0u8; MAX_PATH_STR];
        let plen = crate::utils::format_path(path, &mut path_buf)?;
        let s = core::str::from_utf8(&path_buf[..plen]).map_err(|_| CoreError::FormatError)?;
        cbor::encode_text(&mut buf[pos..], s)
    }

    /// Encode the next record into `out`. Paths must be fed in strictly increasing order and
    /// must fall within `base`.
    pub fn new_entry<'buf>(
        &mut self,
        entry: &Entry<'buf>,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        if entry.path.outside_base(&self.base) {
            return Err(CoreError::InputArgError);
        }

        let emit_bn = self.entries_written == 0 && self.base.length() > 0 && entry.path != self.base;
        if self.entries_written == 0 {
            self.bn_active = emit_bn;
        }

        let emit_bt;
        let emit_t;
        let mut t_delta = 0.0f64;
        if entry.has_timestamp() {
            if self.last_bt.is_nan() {
                emit_bt = true;
                emit_t = false;
                self.last_bt = entry.timestamp;
            } else if entry.timestamp == self.last_bt {
                emit_bt = false;
                emit_t = false;
            } else {
                emit_bt = false;
                emit_t = true;
                t_delta = entry.timestamp - self.last_bt;
            }
        } else {
            emit_bt = false;
            emit_t = false;
        }

        let has_value = !matches!(entry.value, ResourceValue::Null);

        let mut pairs = 1; // "n" is always present
        if emit_bn {
            pairs += 1;
        }
        if emit_bt || emit_t {
            pairs += 1;
        }
        if has_value {
            pairs += 1;
        }

        let mut scratch = [0u8; RECORD_SCRATCH_CAP];
        let mut pos = 0usize;
        if !self.array_opened {
            if self.item_count >= 0 {
                pos += cbor::write_array_header(&mut scratch[pos..], self.item_count as usize)?;
            } else {
                pos += cbor::write_array_header_indefinite(&mut scratch[pos..])?;
                self.array_indefinite = true;
            }
            self.array_opened = true;
        }
        pos += cbor::write_map_header(&mut scratch[pos..], pairs)?;

        if emit_bn {
            pos += Self::write_label(&mut scratch, pos, LABEL_BASENAME)?;
            pos += Self::write_path_text(&mut scratch, pos, &self.base)?;
        }

        pos += Self::write_label(&mut scratch, pos, LABEL_NAME)?;
        if self.bn_active {
            let base_len = self.base.length();
            let mut suffix_ids = [0u16; 4];
            let mut suffix_len = 0usize;
            for lvl in base_len..entry.path.length() {
                suffix_ids[suffix_len] = entry.path.id_at(lvl);
                suffix_len += 1;
            }
            let suffix = Path::make(&suffix_ids[..suffix_len])?;
            pos += Self::write_path_text(&mut scratch, pos, &suffix)?;
        } else {
            pos += Self::write_path_text(&mut scratch, pos, &entry.path)?;
        }

        if emit_bt {
            pos += Self::write_label(&mut scratch, pos, LABEL_BASETIME)?;
            pos += cbor::encode_double(&mut scratch[pos..], self.last_bt)?;
        } else if emit_t {
            pos += Self::write_label(&mut scratch, pos, LABEL_TIME)?;
            pos += cbor::encode_double(&mut scratch[pos..], t_delta)?;
        }

        let mut tail: Option<&'buf [u8]> = None;
        match entry.value {
            ResourceValue::Null => {}
            ResourceValue::Int(v) => {
                pos += Self::write_label(&mut scratch, pos, LABEL_VALUE)?;
                pos += cbor::encode_int(&mut scratch[pos..], v)?;
            }
            ResourceValue::UInt(v) => {
                pos += Self::write_label(&mut scratch, pos, LABEL_VALUE)?;
                pos += cbor::encode_uint(&mut scratch[pos..], v)?;
            }
            ResourceValue::Double(v) => {
                pos += Self::write_label(&mut scratch, pos, LABEL_VALUE)?;
                pos += cbor::encode_double(&mut scratch[pos..], v)?;
            }
            ResourceValue::Time(t) => {
                pos += Self::write_label(&mut scratch, pos, LABEL_VALUE)?;
                pos += cbor::encode_int(&mut scratch[pos..], t)?;
            }
            ResourceValue::Bool(b) => {
                pos += Self::write_label(&mut scratch, pos, LABEL_BOOL_VALUE)?;
                pos += cbor::encode_bool(&mut scratch[pos..], b)?;
            }
            ResourceValue::ObjLnk(link) => {
                pos += cbor::encode_text(&mut scratch[pos..], KEY_OBJLNK_VALUE)?;
                let mut link_buf = [0u8; 16];
                let llen = crate::utils::format_objlnk(link.oid, link.iid, &mut link_buf)?;
                let s = core::str::from_utf8(&link_buf[..llen]).map_err(|_| CoreError::FormatError)?;
                pos += cbor::encode_text(&mut scratch[pos..], s)?;
            }
            ResourceValue::String(s) => {
                pos += Self::write_label(&mut scratch, pos, LABEL_STRING_VALUE)?;
                pos += cbor::write_text_header(&mut scratch[pos..], s.len())?;
                tail = Some(s.as_bytes());
            }
            ResourceValue::Bytes(b) => {
                pos += Self::write_label(&mut scratch, pos, LABEL_OPAQUE_VALUE)?;
                pos += cbor::write_bytes_header(&mut scratch[pos..], b.len())?;
                tail = Some(b);
            }
        }

        out.stage_header(&scratch[..pos])?;
        if let Some(data) = tail {
            out.stage_inline_tail(data);
        }

        self.entries_written += 1;
        Ok(())
    }

    /// Encode the next record whose value is supplied lazily via `provider` rather than held
    /// inline, writing `LABEL_STRING_VALUE` or `LABEL_OPAQUE_VALUE` per `kind`. Mirrors
    /// [`Self::new_entry`]'s `bn`/`bt`/`t` bookkeeping; only the value field differs, since an
    /// externally-provided value is never `Null` so the value label is always present.
    pub fn new_entry_external<'buf>(
        &mut self,
        path: Path,
        kind: ExternalKind,
        timestamp: f64,
        provider: &'buf mut dyn ExternalDataProvider,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        if path.outside_base(&self.base) {
            return Err(CoreError::InputArgError);
        }

        let emit_bn = self.entries_written == 0 && self.base.length() > 0 && path != self.base;
        if self.entries_written == 0 {
            self.bn_active = emit_bn;
        }

        let emit_bt;
        let emit_t;
        let mut t_delta = 0.0f64;
        if !timestamp.is_nan() {
            if self.last_bt.is_nan() {
                emit_bt = true;
                emit_t = false;
                self.last_bt = timestamp;
            } else if timestamp == self.last_bt {
                emit_bt = false;
                emit_t = false;
            } else {
                emit_bt = false;
                emit_t = true;
                t_delta = timestamp - self.last_bt;
            }
        } else {
            emit_bt = false;
            emit_t = false;
        }

        let mut pairs = 2; // "n" plus the value label, always present here
        if emit_bn {
            pairs += 1;
        }
        if emit_bt || emit_t {
            pairs += 1;
        }

        let mut scratch = [0u8; RECORD_SCRATCH_CAP];
        let mut pos = 0usize;
        if !self.array_opened {
            if self.item_count >= 0 {
                pos += cbor::write_array_header(&mut scratch[pos..], self.item_count as usize)?;
            } else {
                pos += cbor::write_array_header_indefinite(&mut scratch[pos..])?;
                self.array_indefinite = true;
            }
            self.array_opened = true;
        }
        pos += cbor::write_map_header(&mut scratch[pos..], pairs)?;

        if emit_bn {
            pos += Self::write_label(&mut scratch, pos, LABEL_BASENAME)?;
            pos += Self::write_path_text(&mut scratch, pos, &self.base)?;
        }

        pos += Self::write_label(&mut scratch, pos, LABEL_NAME)?;
        if self.bn_active {
            let base_len = self.base.length();
            let mut suffix_ids = [0u16; 4];
            let mut suffix_len = 0usize;
            for lvl in base_len..path.length() {
                suffix_ids[suffix_len] = path.id_at(lvl);
                suffix_len += 1;
            }
            let suffix = Path::make(&suffix_ids[..suffix_len])?;
            pos += Self::write_path_text(&mut scratch, pos, &suffix)?;
        } else {
            pos += Self::write_path_text(&mut scratch, pos, &path)?;
        }

        if emit_bt {
            pos += Self::write_label(&mut scratch, pos, LABEL_BASETIME)?;
            pos += cbor::encode_double(&mut scratch[pos..], self.last_bt)?;
        } else if emit_t {
            pos += Self::write_label(&mut scratch, pos, LABEL_TIME)?;
            pos += cbor::encode_double(&mut scratch[pos..], t_delta)?;
        }

        let total_len = provider.len();
        match kind {
            ExternalKind::String => {
                pos += Self::write_label(&mut scratch, pos, LABEL_STRING_VALUE)?;
                pos += cbor::write_text_header(&mut scratch[pos..], total_len)?;
            }
            ExternalKind::Bytes => {
                pos += Self::write_label(&mut scratch, pos, LABEL_OPAQUE_VALUE)?;
                pos += cbor::write_bytes_header(&mut scratch[pos..], total_len)?;
            }
        }

        out.stage_header(&scratch[..pos])?;
        out.stage_external_tail(provider);

        self.entries_written += 1;
        Ok(())
    }

    /// Close the outer array. A definite-length array (`item_count >= 0` at construction) closes
    /// itself and this is a no-op; an indefinite-length one needs its `break` byte written, and an
    /// array that never saw a single entry (zero records written) still needs its header emitted
    /// here since [`Self::new_entry`] never ran. Returns `Ok(true)` if it staged a byte this call
    /// and should be called again after draining; `Ok(false)` once nothing remains to close.
    pub fn destroy<'buf>(&mut self, out: &mut OutputBuffer<'buf>) -> Result<bool> {
        if self.array_closed {
            return Ok(false);
        }
        if !self.array_opened {
            if self.item_count > 0 {
                // Caller declared records that were never delivered.
                return Err(CoreError::LogicError);
            }
            let mut scratch = [0u8; 2];
            let mut pos = 0usize;
            if self.item_count == 0 {
                pos += cbor::write_array_header(&mut scratch[pos..], 0)?;
            } else {
                pos += cbor::write_array_header_indefinite(&mut scratch[pos..])?;
                pos += cbor::write_break(&mut scratch[pos..])?;
            }
            out.stage_header(&scratch[..pos])?;
            self.array_opened = true;
            self.array_closed = true;
            return Ok(true);
        }
        if self.array_indefinite {
            let mut scratch = [0u8; 1];
            let n = cbor::write_break(&mut scratch)?;
            out.stage_header(&scratch[..n])?;
            self.array_closed = true;
            return Ok(true);
        }
        self.array_closed = true;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectLink;

    #[test]
    fn single_entry_uses_full_path_no_basename() {
        let base = Path::ROOT;
        let mut enc = SenMLEncoder::new(base, 1);
        let entry = Entry::new(Path::make(&[3, 3, 3]).unwrap(), ResourceValue::UInt(25))
            .with_timestamp(100000.0);
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 4];
            let n = out.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out.has_more() {
                break;
            }
        }
        let mut expected = std::vec![0x81u8, 0xA3, 0x00, 0x66];
        expected.extend_from_slice(b"/3/3/3");
        expected.extend_from_slice(&[0x22, 0xFA, 0x47, 0xC3, 0x50, 0x00]);
        expected.extend_from_slice(&[0x02, 0x18, 0x19]);
        assert_eq!(collected, expected);
    }

    #[test]
    fn second_entry_reuses_basename_and_basetime() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = SenMLEncoder::new(base, 2);
        let e1 = Entry::new(Path::make(&[3, 0, 1]).unwrap(), ResourceValue::Int(5))
            .with_timestamp(10.0);
        let mut out1 = OutputBuffer::new();
        enc.new_entry(&e1, &mut out1).unwrap();
        assert!(enc.bn_active);

        let e2 = Entry::new(Path::make(&[3, 0, 2]).unwrap(), ResourceValue::Int(7))
            .with_timestamp(10.0);
        let mut out2 = OutputBuffer::new();
        enc.new_entry(&e2, &mut out2).unwrap();
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 4];
            let n = out2.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out2.has_more() {
                break;
            }
        }
        // "n" (suffix "/0/2") and "v" (7): same basetime as last_bt so bt/t are omitted
        let mut expected = std::vec![0xA2u8, 0x00, 0x64];
        expected.extend_from_slice(b"/0/2");
        expected.extend_from_slice(&[0x02, 0x07]);
        assert_eq!(collected, expected);
    }

    #[test]
    fn objlnk_value_uses_vlo_key() {
        let base = Path::ROOT;
        let mut enc = SenMLEncoder::new(base, 1);
        let entry = Entry::new(
            Path::make(&[3, 0, 4]).unwrap(),
            ResourceValue::ObjLnk(ObjectLink { oid: 3, iid: 0 }),
        );
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 8];
            let n = out.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out.has_more() {
                break;
            }
        }
        assert_eq!(collected[0], 0x81);
        assert_eq!(collected[1], 0xA2);
        assert!(collected.windows(3).any(|w| w == b"vlo"));
    }

    #[test]
    fn unknown_item_count_opens_an_indefinite_array_and_destroy_closes_it() {
        let base = Path::make(&[3, 3]).unwrap();
        let mut enc = SenMLEncoder::new(base, -1);
        let entry = Entry::new(Path::make(&[3, 3, 0]).unwrap(), ResourceValue::Bool(true));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 4];
            let n = out.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out.has_more() {
                break;
            }
        }
        assert_eq!(collected[0], 0x9F);

        let mut closing = OutputBuffer::new();
        assert_eq!(enc.destroy(&mut closing).unwrap(), true);
        let mut buf = [0u8; 1];
        let n = closing.get_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0xFF]);
        assert_eq!(enc.destroy(&mut closing).unwrap(), false);
    }

    #[test]
    fn destroy_with_no_entries_written_emits_an_empty_array() {
        let base = Path::make(&[3, 3]).unwrap();
        let mut enc = SenMLEncoder::new(base, 0);
        let mut out = OutputBuffer::new();
        assert_eq!(enc.destroy(&mut out).unwrap(), true);
        let mut buf = [0u8; 1];
        let n = out.get_payload(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x80]);
    }

    #[test]
    fn destroy_refuses_a_declared_count_that_was_never_delivered() {
        let base = Path::make(&[3, 3]).unwrap();
        let mut enc = SenMLEncoder::new(base, 3);
        let mut out = OutputBuffer::new();
        assert_eq!(enc.destroy(&mut out), Err(CoreError::LogicError));
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
    fn encodes_external_opaque_value() {
        let base = Path::ROOT;
        let mut enc = SenMLEncoder::new(base, 1);
        let path = Path::make(&[3, 3, 3]).unwrap();
        let mut provider = SliceProvider(b"ab");
        let mut out = OutputBuffer::new();
        enc.new_entry_external(path, ExternalKind::Bytes, f64::NAN, &mut provider, &mut out)
            .unwrap();
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 4];
            let n = out.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out.has_more() {
                break;
            }
        }
        let mut expected = std::vec![0x81u8, 0xA2, 0x00, 0x66];
        expected.extend_from_slice(b"/3/3/3");
        expected.push(0x08); // LABEL_OPAQUE_VALUE
        expected.push(0x42); // bytes header, length 2
        expected.extend_from_slice(b"ab");
        assert_eq!(collected, expected);
    }
}
