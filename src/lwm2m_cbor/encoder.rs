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
#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

const RECORD_SCRATCH_CAP: usize = 96;

/// Encodes a stream of [`Entry`] values as one indefinite-length LwM2M-CBOR map nested per path
/// level beyond `base`. The outer map is opened on the first entry and stays open - nested maps
/// beneath it open and close as successive entries' paths diverge - until [`Self::destroy`] has
/// been called enough times to unwind everything.
pub struct LwM2MCborEncoder {
    base: Path,
    last: Option<Path>,
    root_open: bool,
    /// Number of maps open beneath the root, covering absolute levels
    /// `base.length() .. base.length()+nested_open`.
    nested_open: usize,
}

impl LwM2MCborEncoder {
    pub fn new(base: Path) -> Self {
        LwM2MCborEncoder {
            base,
            last: None,
            root_open: false,
            nested_open: 0,
        }
    }

    #[cfg_attr(feature = "trace", trace)]
    fn write_leaf_value(scratch: &mut [u8], mut pos: usize, value: &ResourceValue) -> Result<(usize, bool)> {
        let mut has_tail = false;
        match *value {
            ResourceValue::Null => {
                pos += cbor::encode_null(&mut scratch[pos..])?;
            }
            ResourceValue::Int(v) => {
                pos += cbor::encode_int(&mut scratch[pos..], v)?;
            }
            ResourceValue::UInt(v) => {
                pos += cbor::encode_uint(&mut scratch[pos..], v)?;
            }
            ResourceValue::Double(v) => {
                pos += cbor::encode_double(&mut scratch[pos..], v)?;
            }
            ResourceValue::Time(t) => {
                pos += cbor::encode_epoch_time(&mut scratch[pos..], t)?;
            }
            ResourceValue::Bool(b) => {
                pos += cbor::encode_bool(&mut scratch[pos..], b)?;
            }
            ResourceValue::ObjLnk(link) => {
                pos += cbor::write_array_header(&mut scratch[pos..], 2)?;
                pos += cbor::encode_uint(&mut scratch[pos..], link.oid as u64)?;
                pos += cbor::encode_uint(&mut scratch[pos..], link.iid as u64)?;
            }
            ResourceValue::String(_) | ResourceValue::Bytes(_) => {
                has_tail = true;
            }
        }
        Ok((pos, has_tail))
    }

    /// Encode the next leaf. Paths must be fed in strictly increasing order and fall strictly
    /// within `base` (there must be at least one path level beyond `base`).
    pub fn new_entry<'buf>(
        &mut self,
        entry: &Entry<'buf>,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        if entry.path.outside_base(&self.base) {
            return Err(CoreError::InputArgError);
        }
        let base_len = self.base.length();
        if entry.path.length() <= base_len {
            return Err(CoreError::InputArgError);
        }
        if let Some(prev) = self.last {
            if prev == entry.path || !Path::strictly_increasing(&prev, &entry.path) {
                return Err(CoreError::InputArgError);
            }
        }
        let leaf_level = entry.path.length() - 1;

        let mut scratch = [0u8; RECORD_SCRATCH_CAP];
        let mut pos = 0usize;

        if !self.root_open {
            pos += cbor::write_map_header_indefinite(&mut scratch[pos..])?;
            self.root_open = true;
        } else {
            let prev = self.last.expect("root_open implies a previous entry");
            let shared_abs = prev.common_prefix_len(&entry.path);
            let keep = shared_abs.saturating_sub(base_len).min(self.nested_open);
            let closes = self.nested_open - keep;
            for _ in 0..closes {
                pos += cbor::write_break(&mut scratch[pos..])?;
                self.nested_open -= 1;
            }
        }

        for lvl in (base_len + self.nested_open)..leaf_level {
            pos += cbor::encode_uint(&mut scratch[pos..], entry.path.id_at(lvl) as u64)?;
            pos += cbor::write_map_header_indefinite(&mut scratch[pos..])?;
            self.nested_open += 1;
        }

        pos += cbor::encode_uint(&mut scratch[pos..], entry.path.id_at(leaf_level) as u64)?;

        let tail: Option<&'buf [u8]> = match entry.value {
            ResourceValue::String(s) => {
                pos += cbor::write_text_header(&mut scratch[pos..], s.len())?;
                Some(s.as_bytes())
            }
            ResourceValue::Bytes(b) => {
                pos += cbor::write_bytes_header(&mut scratch[pos..], b.len())?;
                Some(b)
            }
            ref other => {
                let (new_pos, has_tail) = Self::write_leaf_value(&mut scratch, pos, other)?;
                debug_assert!(!has_tail);
                pos = new_pos;
                None
            }
        };

        out.stage_header(&scratch[..pos])?;
        if let Some(data) = tail {
            out.stage_inline_tail(data);
        }

        self.last = Some(entry.path);
        Ok(())
    }

    /// Encode the next leaf's value from `provider` rather than an inline slice, for a byte or
    /// text string fetched lazily. Same path-ordering and nested-map bookkeeping as
    /// [`Self::new_entry`].
    pub fn new_entry_external<'buf>(
        &mut self,
        path: Path,
        kind: ExternalKind,
        provider: &'buf mut dyn ExternalDataProvider,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        if path.outside_base(&self.base) {
            return Err(CoreError::InputArgError);
        }
        let base_len = self.base.length();
        if path.length() <= base_len {
            return Err(CoreError::InputArgError);
        }
        if let Some(prev) = self.last {
            if prev == path || !Path::strictly_increasing(&prev, &path) {
                return Err(CoreError::InputArgError);
            }
        }
        let leaf_level = path.length() - 1;

        let mut scratch = [0u8; RECORD_SCRATCH_CAP];
        let mut pos = 0usize;

        if !self.root_open {
            pos += cbor::write_map_header_indefinite(&mut scratch[pos..])?;
            self.root_open = true;
        } else {
            let prev = self.last.expect("root_open implies a previous entry");
            let shared_abs = prev.common_prefix_len(&path);
            let keep = shared_abs.saturating_sub(base_len).min(self.nested_open);
            let closes = self.nested_open - keep;
            for _ in 0..closes {
                pos += cbor::write_break(&mut scratch[pos..])?;
                self.nested_open -= 1;
            }
        }

        for lvl in (base_len + self.nested_open)..leaf_level {
            pos += cbor::encode_uint(&mut scratch[pos..], path.id_at(lvl) as u64)?;
            pos += cbor::write_map_header_indefinite(&mut scratch[pos..])?;
            self.nested_open += 1;
        }

        pos += cbor::encode_uint(&mut scratch[pos..], path.id_at(leaf_level) as u64)?;

        let total_len = provider.len();
        pos += match kind {
            ExternalKind::String => cbor::write_text_header(&mut scratch[pos..], total_len)?,
            ExternalKind::Bytes => cbor::write_bytes_header(&mut scratch[pos..], total_len)?,
        };

        out.stage_header(&scratch[..pos])?;
        out.stage_external_tail(provider);

        self.last = Some(path);
        Ok(())
    }

    /// Close one more currently-open map (innermost first, root last). Call repeatedly, draining
    /// `out` between calls, until this returns `Ok(false)`.
    pub fn destroy<'buf>(&mut self, out: &mut OutputBuffer<'buf>) -> Result<bool> {
        if self.nested_open > 0 {
            let mut b = [0u8; 1];
            cbor::write_break(&mut b)?;
            out.stage_header(&b)?;
            self.nested_open -= 1;
            return Ok(true);
        }
        if self.root_open {
            let mut b = [0u8; 1];
            cbor::write_break(&mut b)?;
            out.stage_header(&b)?;
            self.root_open = false;
            return Ok(true);
        }
        Ok(false)
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
    fn nests_two_resources_under_one_instance_map() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = LwM2MCborEncoder::new(base);
        let mut out = OutputBuffer::new();
        let e1 = Entry::new(Path::make(&[3, 0, 1]).unwrap(), ResourceValue::Int(7));
        enc.new_entry(&e1, &mut out).unwrap();
        // root map (BF), key 0 (iid), nested map (BF), key 1 (rid), value 7
        assert_eq!(drain(&mut out), std::vec![0xBF, 0x00, 0xBF, 0x01, 0x07]);

        let e2 = Entry::new(Path::make(&[3, 0, 2]).unwrap(), ResourceValue::Int(8));
        enc.new_entry(&e2, &mut out).unwrap();
        // same instance map stays open: just key 2, value 8
        assert_eq!(drain(&mut out), std::vec![0x02, 0x08]);

        assert!(enc.destroy(&mut out).unwrap());
        assert_eq!(drain(&mut out), std::vec![0xFF]); // close instance map
        assert!(enc.destroy(&mut out).unwrap());
        assert_eq!(drain(&mut out), std::vec![0xFF]); // close root map
        assert!(!enc.destroy(&mut out).unwrap());
    }

    #[test]
    fn closes_instance_map_when_instance_id_changes() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = LwM2MCborEncoder::new(base);
        let mut out = OutputBuffer::new();
        let e1 = Entry::new(Path::make(&[3, 0, 1]).unwrap(), ResourceValue::Int(1));
        enc.new_entry(&e1, &mut out).unwrap();
        assert_eq!(drain(&mut out), std::vec![0xBF, 0x00, 0xBF, 0x01, 0x01]);

        let e2 = Entry::new(Path::make(&[3, 1, 1]).unwrap(), ResourceValue::Int(2));
        enc.new_entry(&e2, &mut out).unwrap();
        // close the instance-0 map, open instance-1 map, then key 1 / value 2
        assert_eq!(drain(&mut out), std::vec![0xFF, 0x01, 0xBF, 0x01, 0x02]);
    }

    #[test]
    fn rejects_entry_not_longer_than_base() {
        let base = Path::make(&[3, 0]).unwrap();
        let mut enc = LwM2MCborEncoder::new(base);
        let mut out = OutputBuffer::new();
        let e = Entry::new(Path::make(&[3, 0]).unwrap(), ResourceValue::Int(1));
        assert_eq!(enc.new_entry(&e, &mut out), Err(CoreError::InputArgError));
    }

    #[test]
    fn rejects_duplicate_path() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = LwM2MCborEncoder::new(base);
        let mut out = OutputBuffer::new();
        let e = Entry::new(Path::make(&[3, 0, 1]).unwrap(), ResourceValue::Int(1));
        enc.new_entry(&e, &mut out).unwrap();
        let _ = drain(&mut out);
        assert_eq!(enc.new_entry(&e, &mut out), Err(CoreError::InputArgError));
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
    fn encodes_external_string_leaf() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = LwM2MCborEncoder::new(base);
        let mut out = OutputBuffer::new();
        let path = Path::make(&[3, 0, 1]).unwrap();
        let mut provider = SliceProvider(b"hi");
        enc.new_entry_external(path, ExternalKind::String, &mut provider, &mut out)
            .unwrap();
        let mut expected = std::vec![0xBF, 0x00, 0xBF, 0x01, 0x62];
        expected.extend_from_slice(b"hi");
        assert_eq!(drain(&mut out), expected);
    }
}
