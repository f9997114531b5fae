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
#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

/// One CBOR map currently entered, recording how much of `path_ids` to keep once this map's keys
/// are exhausted (i.e. the path length in effect when the map was opened, before its own key(s)
/// were pushed onto `path_ids`).
struct MapFrame {
    cbor_depth: usize,
    restore_len: usize,
}

/// Decodes an LwM2M-CBOR payload: a single indefinite-length map nested one level per path id
/// beyond `base`, into a stream of [`Entry`] values.
///
/// A map key is either a plain uint id (one path level) or an array of uint ids (several levels
/// at once, the flattened equivalent of descending through that many one-key maps) - both forms
/// are accepted on input regardless of which one an encoder happened to choose.
pub struct LwM2MCborDecoder<'buf> {
    cbor: CborLLDecoder<'buf>,
    base: Path,
    path_ids: [u16; 4],
    path_len: usize,
    frames: [Option<MapFrame>; 4],
    frame_depth: usize,
    finished: bool,
}

impl<'buf> LwM2MCborDecoder<'buf> {
    /// A decoder whose resolved entry paths must fall within `base` (or equal it).
    pub fn new(base: Path) -> Self {
        let mut path_ids = [0u16; 4];
        let base_len = base.length();
        for lvl in 0..base_len {
            path_ids[lvl] = base.id_at(lvl);
        }
        LwM2MCborDecoder {
            cbor: CborLLDecoder::new(),
            base,
            path_ids,
            path_len: base_len,
            frames: [None, None, None, None],
            frame_depth: 0,
            finished: false,
        }
    }

    /// Supply the next chunk of wire bytes; see [`CborLLDecoder::feed_payload`].
    pub fn feed_payload(&mut self, buf: &'buf [u8], is_last: bool) -> Result<()> {
        self.cbor.feed_payload(buf, is_last)
    }

    fn push_id(&mut self, id: u16) -> Result<()> {
        if self.path_len >= 4 {
            return Err(CoreError::FormatError);
        }
        self.path_ids[self.path_len] = id;
        self.path_len += 1;
        Ok(())
    }

    fn enter_map_frame(&mut self) -> Result<()> {
        if self.frame_depth >= 4 {
            return Err(CoreError::FormatError);
        }
        self.cbor.enter_map()?;
        self.frames[self.frame_depth] = Some(MapFrame {
            cbor_depth: self.cbor.nesting_level(),
            restore_len: self.path_len,
        });
        self.frame_depth += 1;
        Ok(())
    }

    /// Pop any map frames whose container has already closed (their `BREAK` consumed while
    /// peeking the next item), restoring `path_len` to what it was before that map's own key(s)
    /// were read. Returns `true` once every frame has closed (structure fully consumed).
    fn pop_closed_frames(&mut self) -> Result<bool> {
        loop {
            if self.frame_depth == 0 {
                return Ok(true);
            }
            match self.cbor.current_value_type() {
                Err(CoreError::Eof) => return Ok(true),
                Err(e) => return Err(e),
                Ok(_) => {}
            }
            let top = self.frames[self.frame_depth - 1]
                .as_ref()
                .expect("frame_depth tracks occupancy");
            if self.cbor.nesting_level() < top.cbor_depth {
                self.path_len = top.restore_len;
                self.frames[self.frame_depth - 1] = None;
                self.frame_depth -= 1;
                continue;
            }
            return Ok(false);
        }
    }

    /// Read one key: a plain uint id, or an array of uint ids consuming several levels at once.
    fn read_key(&mut self) -> Result<()> {
        let kind = self.cbor.current_value_type()?;
        match kind {
            ItemKind::UInt => {
                let n = self.cbor.number()?;
                let id = u16::try_from(n.as_u64().ok_or(CoreError::FormatError)?)
                    .map_err(|_| CoreError::FormatError)?;
                self.push_id(id)?;
            }
            ItemKind::Array => {
                let count = self.cbor.enter_array()?;
                let arr_depth = self.cbor.nesting_level();
                let mut read = 0usize;
                loop {
                    if let Some(n) = count {
                        if read >= n {
                            break;
                        }
                    }
                    let kind = match self.cbor.current_value_type() {
                        Err(CoreError::Eof) => return Err(CoreError::FormatError),
                        Err(e) => return Err(e),
                        Ok(k) => k,
                    };
                    if self.cbor.nesting_level() < arr_depth {
                        break;
                    }
                    if kind != ItemKind::UInt {
                        return Err(CoreError::FormatError);
                    }
                    let n = self.cbor.number()?;
                    let id = u16::try_from(n.as_u64().ok_or(CoreError::FormatError)?)
                        .map_err(|_| CoreError::FormatError)?;
                    self.push_id(id)?;
                    read += 1;
                }
            }
            _ => return Err(CoreError::FormatError),
        }
        Ok(())
    }

    fn read_leaf(&mut self, mask: TypeMask) -> Result<ResourceValue<'buf>> {
        let kind = self.cbor.current_value_type()?;
        match kind {
            ItemKind::UInt | ItemKind::NegInt | ItemKind::Float | ItemKind::Double => {
                resolve_numeric(self.cbor.number()?, mask)
            }
            ItemKind::Timestamp => resolve_time(self.cbor.number()?, mask),
            ItemKind::Bool => {
                if !mask.allows(TypeMask::BOOL) {
                    return Err(CoreError::FormatError);
                }
                Ok(ResourceValue::Bool(self.cbor.bool_value()?))
            }
            ItemKind::Null => {
                if !mask.allows(TypeMask::NULL) {
                    return Err(CoreError::FormatError);
                }
                self.cbor.null()?;
                Ok(ResourceValue::Null)
            }
            ItemKind::Bytes => {
                if !mask.allows(TypeMask::BYTES) {
                    return Err(CoreError::FormatError);
                }
                let chunk = self.cbor.bytes_chunk()?;
                if !chunk.is_last {
                    return Err(CoreError::FormatError);
                }
                Ok(ResourceValue::Bytes(chunk.data))
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
                Ok(ResourceValue::String(s))
            }
            ItemKind::Array => {
                if !mask.allows(TypeMask::OBJLNK) {
                    return Err(CoreError::FormatError);
                }
                let count = self.cbor.enter_array()?;
                if count != Some(2) {
                    return Err(CoreError::FormatError);
                }
                let oid = u16::try_from(
                    self.cbor.number()?.as_u64().ok_or(CoreError::FormatError)?,
                )
                .map_err(|_| CoreError::FormatError)?;
                let iid = u16::try_from(
                    self.cbor.number()?.as_u64().ok_or(CoreError::FormatError)?,
                )
                .map_err(|_| CoreError::FormatError)?;
                Ok(ResourceValue::ObjLnk(ObjectLink { oid, iid }))
            }
            _ => Err(CoreError::FormatError),
        }
    }

    /// Decode the next leaf entry. Returns [`CoreError::Eof`] once the whole map structure has
    /// closed.
    #[cfg_attr(feature = "trace", trace)]
    pub fn get_entry(&mut self, mask: TypeMask) -> Result<Entry<'buf>> {
        if self.finished {
            return Err(CoreError::Eof);
        }
        if self.frame_depth == 0 {
            let kind = self.cbor.current_value_type()?;
            if kind != ItemKind::Map {
                return Err(CoreError::FormatError);
            }
            self.enter_map_frame()?;
        }

        loop {
            if self.pop_closed_frames()? {
                self.finished = true;
                return Err(CoreError::Eof);
            }

            self.read_key()?;

            let value_kind = self.cbor.current_value_type()?;
            if value_kind == ItemKind::Map {
                self.enter_map_frame()?;
                continue;
            }

            let path = Path::make(&self.path_ids[..self.path_len])?;
            if path.outside_base(&self.base) || path.length() <= self.base.length() {
                return Err(CoreError::FormatError);
            }
            let value = self.read_leaf(mask)?;

            // Back off to the level at which this map's own key(s) live, ready for a sibling key.
            let top = self.frames[self.frame_depth - 1]
                .as_ref()
                .expect("frame_depth tracks occupancy");
            self.path_len = top.restore_len;

            return Ok(Entry::new(path, value));
        }
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
    fn decodes_two_siblings_under_one_instance_map() {
        // {0: {1: 7, 2: 8}}
        let bytes: std::vec::Vec<u8> = std::vec![0xA1, 0x00, 0xA2, 0x01, 0x07, 0x02, 0x08];
        let mut dec = LwM2MCborDecoder::new(Path::make(&[3]).unwrap());
        dec.feed_payload(&bytes, true).unwrap();
        let e1 = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(e1.path, Path::make(&[3, 0, 1]).unwrap());
        assert_eq!(e1.value, ResourceValue::UInt(7));
        let e2 = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(e2.path, Path::make(&[3, 0, 2]).unwrap());
        assert_eq!(e2.value, ResourceValue::UInt(8));
        assert_eq!(dec.get_entry(TypeMask(TypeMask::ANY)), Err(CoreError::Eof));
    }

    #[test]
    fn decodes_indefinite_map_with_break() {
        // {_ 0: {_ 1: 7 _} _}
        let bytes: std::vec::Vec<u8> = std::vec![0xBF, 0x00, 0xBF, 0x01, 0x07, 0xFF, 0xFF];
        let mut dec = LwM2MCborDecoder::new(Path::make(&[3]).unwrap());
        dec.feed_payload(&bytes, true).unwrap();
        let e = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(e.path, Path::make(&[3, 0, 1]).unwrap());
        assert_eq!(dec.get_entry(TypeMask(TypeMask::ANY)), Err(CoreError::Eof));
    }

    #[test]
    fn accepts_flattened_array_key() {
        // {[0, 1]: 7}  -- single key spanning iid+rid at once
        let bytes: std::vec::Vec<u8> = std::vec![0xA1, 0x82, 0x00, 0x01, 0x07];
        let mut dec = LwM2MCborDecoder::new(Path::make(&[3]).unwrap());
        dec.feed_payload(&bytes, true).unwrap();
        let e = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
        assert_eq!(e.path, Path::make(&[3, 0, 1]).unwrap());
        assert_eq!(e.value, ResourceValue::UInt(7));
    }

    #[test]
    fn rejects_top_level_item_that_is_not_a_map() {
        let bytes: std::vec::Vec<u8> = std::vec![0x07];
        let mut dec = LwM2MCborDecoder::new(Path::make(&[3]).unwrap());
        dec.feed_payload(&bytes, true).unwrap();
        assert_eq!(
            dec.get_entry(TypeMask(TypeMask::UINT)),
            Err(CoreError::FormatError)
        );
    }
}
