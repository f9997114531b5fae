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
//! TLV encoder: each call to [`TlvEncoder::new_entry`] stages one leaf value. Unlike CBOR, a TLV
//! container's header carries the container's total byte length, so an Instance or
//! multiple-Resource container cannot be written until every entry inside it has been seen —
//! the encoder buffers each open container's bytes internally (bounded by [`CONTAINER_CAP`]) and
//! only hands a finished container to the shared [`OutputBuffer`] once the next entry's path (or
//! a call to [`TlvEncoder::destroy`]) shows it has closed.
use crate::error::{CoreError, Result};
use crate::output::OutputBuffer;
use crate::path::{Path, ID_MAX};
use crate::tlv::{IdKind, MAX_TLV_DEPTH};
use crate::value::{Entry, ExternalDataProvider, ExternalKind, ResourceValue};
#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

const HEADER_CAP: usize = 6;

/// Bound on the buffered content of one open Instance/multiple-Resource container.
const CONTAINER_CAP: usize = 512;

/// Levels of container nesting the encoder can hold open at once (Instance, then
/// multiple-Resource) -- one less than [`MAX_TLV_DEPTH`], since the innermost level is always a
/// leaf rather than a container.
const MAX_OPEN: usize = MAX_TLV_DEPTH - 1;

#[cfg_attr(feature = "trace", trace)]
fn write_header(out: &mut [u8; HEADER_CAP], kind: IdKind, id: u16, len: usize) -> Result<usize> {
    if id > ID_MAX {
        return Err(CoreError::InputArgError);
    }
    let id_width: usize = if id > 0xFF { 2 } else { 1 };
    let (lol, len_width): (u8, usize) = if len <= 0b111 {
        (0, 0)
    } else if len <= 0xFF {
        (1, 1)
    } else if len <= 0xFFFF {
        (2, 2)
    } else {
        (3, 3)
    };
    let type_byte = (kind.to_bits() << 6)
        | if id_width == 2 { 0b0010_0000 } else { 0 }
        | (lol << 3)
        | if lol == 0 { (len as u8) & 0b111 } else { 0 };
    out[0] = type_byte;
    let mut pos = 1;
    if id_width == 1 {
        out[pos] = id as u8;
        pos += 1;
    } else {
        out[pos..pos + 2].copy_from_slice(&id.to_be_bytes());
        pos += 2;
    }
    if len_width > 0 {
        let bytes = (len as u32).to_be_bytes();
        out[pos..pos + len_width].copy_from_slice(&bytes[4 - len_width..]);
        pos += len_width;
    }
    Ok(pos)
}

struct OpenContainer {
    kind: IdKind,
    id: u16,
    buf: [u8; CONTAINER_CAP],
    len: usize,
    /// Set once any byte is pushed into this container, directly or via a nested container
    /// closing into it. An aggregate opened by [`TlvEncoder::start_aggregate`] but never
    /// populated refuses to close.
    populated: bool,
}

impl OpenContainer {
    fn new(kind: IdKind, id: u16) -> Self {
        OpenContainer {
            kind,
            id,
            buf: [0; CONTAINER_CAP],
            len: 0,
            populated: false,
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Result<()> {
        if self.len + bytes.len() > CONTAINER_CAP {
            return Err(CoreError::BufferTooShort);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        self.populated = true;
        Ok(())
    }
}

/// The container kind implied by an absolute path level: index 1 (the instance id) is always an
/// Instance container; index 2 (a resource id with a resource-instance child) is always a
/// multiple-Resource container. Index 0 (object) and 3 (resource-instance) never open containers.
fn container_kind_for_level(level: usize) -> IdKind {
    if level == 1 {
        IdKind::Instance
    } else {
        IdKind::MultiResource
    }
}

/// Encodes a stream of [`Entry`] values into OMA LwM2M TLV, one leaf at a time.
///
/// Callers present entries in strictly increasing path order (see [`Path::strictly_increasing`]).
/// After the last entry, call [`TlvEncoder::destroy`] (draining `out` between calls, same as
/// after [`TlvEncoder::new_entry`]) until it returns `Ok(false)`, to flush any containers still
/// open.
pub struct TlvEncoder {
    base: Path,
    prev_path: Option<Path>,
    open: [Option<OpenContainer>; MAX_OPEN],
    open_depth: usize,
}

impl TlvEncoder {
    /// An encoder scoped to `base` (the same request path the corresponding decoder would use).
    pub fn new(base: Path) -> Self {
        TlvEncoder {
            base,
            prev_path: None,
            open: [None, None],
            open_depth: 0,
        }
    }

    /// Open the next container level explicitly, before any entry requires it — used to encode
    /// an Instance or multiple-Resource aggregate that may end up holding exactly the entries
    /// [`Self::new_entry`] would have opened it for anyway, but whose presence must be asserted
    /// even if (incorrectly) no entry follows. `id` is the id of the level being opened; it must
    /// sit immediately below whatever is currently open, with least one free level.
    pub fn start_aggregate(&mut self, id: u16) -> Result<()> {
        if self.open_depth >= MAX_OPEN {
            return Err(CoreError::InputArgError);
        }
        let level = self.base.length() + self.open_depth;
        self.open[self.open_depth] = Some(OpenContainer::new(container_kind_for_level(level), id));
        self.open_depth += 1;
        Ok(())
    }

    fn leaf_kind_and_value_bytes(value: &ResourceValue<'_>, out: &mut [u8; 8]) -> Result<(usize, bool)> {
        match value {
            ResourceValue::Int(v) => {
                let len = Self::min_int_width(*v);
                out[8 - len..].copy_from_slice(&v.to_be_bytes()[8 - len..]);
                Ok((len, false))
            }
            ResourceValue::UInt(v) => {
                let len = Self::min_uint_width(*v);
                out[8 - len..].copy_from_slice(&v.to_be_bytes()[8 - len..]);
                Ok((len, false))
            }
            ResourceValue::Time(v) => {
                let len = Self::min_int_width(*v);
                out[8 - len..].copy_from_slice(&v.to_be_bytes()[8 - len..]);
                Ok((len, false))
            }
            ResourceValue::Bool(v) => {
                out[7] = if *v { 1 } else { 0 };
                Ok((1, false))
            }
            #[cfg(feature = "float")]
            ResourceValue::Double(v) => {
                let as_f32 = *v as f32;
                if as_f32 as f64 == *v {
                    out[4..8].copy_from_slice(&as_f32.to_be_bytes());
                    Ok((4, false))
                } else {
                    out[0..8].copy_from_slice(&v.to_be_bytes());
                    Ok((8, false))
                }
            }
            #[cfg(not(feature = "float"))]
            ResourceValue::Double(_) => Err(CoreError::InputArgError),
            ResourceValue::ObjLnk(link) => {
                out[4..6].copy_from_slice(&link.oid.to_be_bytes());
                out[6..8].copy_from_slice(&link.iid.to_be_bytes());
                Ok((4, false))
            }
            ResourceValue::Null => Ok((0, false)),
            ResourceValue::Bytes(_) | ResourceValue::String(_) => Ok((0, true)),
        }
    }

    fn min_int_width(v: i64) -> usize {
        if v >= i8::MIN as i64 && v <= i8::MAX as i64 {
            1
        } else if v >= i16::MIN as i64 && v <= i16::MAX as i64 {
            2
        } else if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
            4
        } else {
            8
        }
    }

    fn min_uint_width(v: u64) -> usize {
        if v <= u8::MAX as u64 {
            1
        } else if v <= u16::MAX as u64 {
            2
        } else if v <= u32::MAX as u64 {
            4
        } else {
            8
        }
    }

    /// Close the innermost open container, handing its bytes to its parent container (if any is
    /// still open) or, once the last one closes, to `out`. Returns `true` if a container closed.
    fn close_innermost<'buf>(&mut self, out: &mut OutputBuffer<'buf>) -> Result<bool> {
        if self.open_depth == 0 {
            return Ok(false);
        }
        let idx = self.open_depth - 1;
        if !self.open[idx].as_ref().expect("open_depth tracks occupancy").populated {
            return Err(CoreError::LogicError);
        }
        let closed = self.open[idx].take().expect("open_depth tracks occupancy");
        self.open_depth -= 1;

        let mut header = [0u8; HEADER_CAP];
        let n = write_header(&mut header, closed.kind, closed.id, closed.len)?;
        if self.open_depth == 0 {
            out.stage_header(&header[..n])?;
            out.stage_owned_tail(&closed.buf[..closed.len])?;
        } else {
            let parent = self.open[self.open_depth - 1]
                .as_mut()
                .expect("open_depth tracks occupancy");
            parent.push(&header[..n])?;
            parent.push(&closed.buf[..closed.len])?;
        }
        Ok(true)
    }

    /// Stage the next entry (in strictly increasing path order) into `out`, opening or closing
    /// Instance/multiple-Resource containers as the path requires. `out` must still hold the
    /// previous call's fully-drained payload, or be freshly constructed -- a call may close a
    /// previously-open container (producing output) without itself containing new output if the
    /// entry's own bytes land inside a newly (re)opened container instead.
    pub fn new_entry<'buf>(&mut self, entry: &Entry<'buf>, out: &mut OutputBuffer<'buf>) -> Result<()> {
        if let Some(prev) = self.prev_path {
            if !Path::strictly_increasing(&prev, &entry.path) {
                return Err(CoreError::InputArgError);
            }
        }
        if entry.path.outside_base(&self.base) {
            return Err(CoreError::InputArgError);
        }
        self.prev_path = Some(entry.path);

        let base_len = self.base.length();
        let leaf_level = entry.path.length() - 1;
        if leaf_level < base_len {
            return Err(CoreError::InputArgError);
        }
        let containers_needed = leaf_level - base_len;
        if containers_needed > MAX_OPEN {
            return Err(CoreError::InputArgError);
        }

        // Close containers that this entry's path no longer shares.
        let mut shared = containers_needed.min(self.open_depth);
        for d in 0..shared {
            let level = base_len + d;
            let wanted_id = entry.path.id_at(level);
            if self.open[d].as_ref().expect("within open_depth").id != wanted_id {
                shared = d;
                break;
            }
        }
        while self.open_depth > shared {
            self.close_innermost(out)?;
        }
        // Open any new containers this entry requires.
        while self.open_depth < containers_needed {
            let level = base_len + self.open_depth;
            let id = entry.path.id_at(level);
            self.open[self.open_depth] = Some(OpenContainer::new(container_kind_for_level(level), id));
            self.open_depth += 1;
        }

        let leaf_kind = if entry.path.kind() == crate::path::PathKind::ResourceInstance {
            IdKind::ResourceInstance
        } else {
            IdKind::Resource
        };
        let leaf_id = entry.path.id_at(leaf_level);

        let mut header = [0u8; HEADER_CAP];
        match entry.value {
            ResourceValue::Bytes(bytes) => {
                let n = write_header(&mut header, leaf_kind, leaf_id, bytes.len())?;
                self.stage_leaf(out, &header[..n], Some(bytes))?;
            }
            ResourceValue::String(s) => {
                let bytes = s.as_bytes();
                let n = write_header(&mut header, leaf_kind, leaf_id, bytes.len())?;
                self.stage_leaf(out, &header[..n], Some(bytes))?;
            }
            other => {
                let mut value_buf = [0u8; 8];
                let (len, _is_tail) = Self::leaf_kind_and_value_bytes(&other, &mut value_buf)?;
                let n = write_header(&mut header, leaf_kind, leaf_id, len)?;
                if n + len > HEADER_CAP {
                    return Err(CoreError::InputArgError);
                }
                header[n..n + len].copy_from_slice(&value_buf[8 - len..]);
                self.stage_leaf(out, &header[..n + len], None)?;
            }
        }
        Ok(())
    }

    /// Stage the next entry's value from `provider` rather than an inline slice, for a byte or
    /// text string fetched lazily. `kind` has no effect on the wire here -- TLV leaves carry no
    /// byte-vs-text tag -- but is taken for symmetry with the other encoders' `new_entry_external`.
    /// Same path and container bookkeeping as [`Self::new_entry`]; if a container is currently
    /// open the provider is drained eagerly into its buffer (bounded by [`CONTAINER_CAP`]) since
    /// a not-yet-closed container's bytes must already be in hand when it closes.
    pub fn new_entry_external<'buf>(
        &mut self,
        path: Path,
        kind: ExternalKind,
        provider: &'buf mut dyn ExternalDataProvider,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        let _ = kind;
        if let Some(prev) = self.prev_path {
            if !Path::strictly_increasing(&prev, &path) {
                return Err(CoreError::InputArgError);
            }
        }
        if path.outside_base(&self.base) {
            return Err(CoreError::InputArgError);
        }
        self.prev_path = Some(path);

        let base_len = self.base.length();
        let leaf_level = path.length() - 1;
        if leaf_level < base_len {
            return Err(CoreError::InputArgError);
        }
        let containers_needed = leaf_level - base_len;
        if containers_needed > MAX_OPEN {
            return Err(CoreError::InputArgError);
        }

        let mut shared = containers_needed.min(self.open_depth);
        for d in 0..shared {
            let level = base_len + d;
            let wanted_id = path.id_at(level);
            if self.open[d].as_ref().expect("within open_depth").id != wanted_id {
                shared = d;
                break;
            }
        }
        while self.open_depth > shared {
            self.close_innermost(out)?;
        }
        while self.open_depth < containers_needed {
            let level = base_len + self.open_depth;
            let id = path.id_at(level);
            self.open[self.open_depth] = Some(OpenContainer::new(container_kind_for_level(level), id));
            self.open_depth += 1;
        }

        let leaf_kind = if path.kind() == crate::path::PathKind::ResourceInstance {
            IdKind::ResourceInstance
        } else {
            IdKind::Resource
        };
        let leaf_id = path.id_at(leaf_level);

        let total_len = provider.len();
        let mut header = [0u8; HEADER_CAP];
        let n = write_header(&mut header, leaf_kind, leaf_id, total_len)?;

        if self.open_depth == 0 {
            out.stage_header(&header[..n])?;
            out.stage_external_tail(provider);
        } else {
            let container = self.open[self.open_depth - 1]
                .as_mut()
                .expect("open_depth tracks occupancy");
            container.push(&header[..n])?;
            let mut scratch = [0u8; 64];
            let mut off = 0usize;
            while off < total_len {
                let chunk = (total_len - off).min(scratch.len());
                provider.fetch(&mut scratch[..chunk], off)?;
                container.push(&scratch[..chunk])?;
                off += chunk;
            }
        }
        Ok(())
    }

    /// Route a leaf's bytes either straight to `out` (no container open) or into the innermost
    /// open container's buffer (copying `tail`, if any, since it no longer lives for `'buf` once
    /// wrapped inside a container).
    fn stage_leaf<'buf>(
        &mut self,
        out: &mut OutputBuffer<'buf>,
        header: &[u8],
        tail: Option<&[u8]>,
    ) -> Result<()> {
        if self.open_depth == 0 {
            out.stage_header(header)?;
            if let Some(bytes) = tail {
                out.stage_inline_tail(bytes);
            }
        } else {
            let container = self.open[self.open_depth - 1]
                .as_mut()
                .expect("open_depth tracks occupancy");
            container.push(header)?;
            if let Some(bytes) = tail {
                container.push(bytes)?;
            }
        }
        Ok(())
    }

    /// Close one more level of whatever containers remain open, in innermost-first order.
    /// Returns `Ok(true)` if a container was closed (drain `out`, then call again); `Ok(false)`
    /// once nothing remains open.
    pub fn destroy<'buf>(&mut self, out: &mut OutputBuffer<'buf>) -> Result<bool> {
        self.close_innermost(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectLink;

    fn drain(out: &mut OutputBuffer) -> std::vec::Vec<u8> {
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 8];
            let n = out.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out.has_more() {
                break;
            }
        }
        collected
    }

    #[test]
    fn encodes_single_resource_int() {
        let base = Path::make(&[3, 4]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let path = Path::make(&[3, 4, 1]).unwrap();
        let entry = Entry::new(path, ResourceValue::Int(42));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        assert_eq!(drain(&mut out), vec![0xC1, 0x01, 0x2A]);
    }

    #[test]
    fn encodes_objlnk() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let path = Path::make(&[3, 0, 1]).unwrap();
        let entry = Entry::new(path, ResourceValue::ObjLnk(ObjectLink { oid: 10, iid: 20 }));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let bytes = drain(&mut out);
        assert_eq!(bytes[0], 0xC4); // Resource, 1-byte id, inline length 4
        assert_eq!(&bytes[2..], &[0, 10, 0, 20]);
    }

    #[test]
    fn rejects_non_increasing_path() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let path = Path::make(&[3, 0, 1]).unwrap();
        let entry = Entry::new(path, ResourceValue::Int(1));
        let mut out = OutputBuffer::new();
        enc.new_entry(&entry, &mut out).unwrap();
        let mut out2 = OutputBuffer::new();
        assert_eq!(enc.new_entry(&entry, &mut out2), Err(CoreError::InputArgError));
    }

    #[test]
    fn wraps_resources_in_instance_container() {
        // base /3 (Object); entries /3/0/1=Int(1), /3/0/2=Int(2) -- both land inside one
        // Instance(0) container, which only closes (and produces output) once destroy() runs.
        let base = Path::make(&[3]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let mut out = OutputBuffer::new();

        let e1 = Entry::new(Path::make(&[3, 0, 1]).unwrap(), ResourceValue::Int(1));
        enc.new_entry(&e1, &mut out).unwrap();
        assert!(!out.has_more(), "first entry only buffers, nothing to flush yet");

        let e2 = Entry::new(Path::make(&[3, 0, 2]).unwrap(), ResourceValue::Int(2));
        enc.new_entry(&e2, &mut out).unwrap();
        assert!(!out.has_more());

        assert!(enc.destroy(&mut out).unwrap());
        let bytes = drain(&mut out);
        // Instance(0), inline length 6 (type byte 0x06), containing Resource(1)=1 and
        // Resource(2)=2.
        assert_eq!(
            bytes,
            vec![0x06, 0x00, 0xC1, 0x01, 0x01, 0xC1, 0x02, 0x02]
        );
        assert!(!enc.destroy(&mut out).unwrap());
    }

    #[test]
    fn closes_instance_when_next_instance_id_differs() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let mut out = OutputBuffer::new();

        let e1 = Entry::new(Path::make(&[3, 0, 1]).unwrap(), ResourceValue::Int(7));
        enc.new_entry(&e1, &mut out).unwrap();
        assert!(!out.has_more());

        let e2 = Entry::new(Path::make(&[3, 1, 1]).unwrap(), ResourceValue::Int(8));
        enc.new_entry(&e2, &mut out).unwrap();
        // Instance 0 closed as a side effect of seeing instance 1's entry.
        let first = drain(&mut out);
        assert_eq!(first, vec![0x03, 0x00, 0xC1, 0x01, 0x07]);

        assert!(enc.destroy(&mut out).unwrap());
        let second = drain(&mut out);
        assert_eq!(second, vec![0x03, 0x01, 0xC1, 0x01, 0x08]);
    }

    #[test]
    fn destroy_refuses_unpopulated_aggregate() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let mut out = OutputBuffer::new();
        enc.start_aggregate(0).unwrap();
        assert_eq!(enc.destroy(&mut out), Err(CoreError::LogicError));

        let e = Entry::new(Path::make(&[3, 0, 1]).unwrap(), ResourceValue::Int(1));
        enc.new_entry(&e, &mut out).unwrap();
        assert!(enc.destroy(&mut out).unwrap());
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
    fn encodes_external_bytes_at_root_level() {
        let base = Path::make(&[3, 4]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let path = Path::make(&[3, 4, 1]).unwrap();
        let mut provider = SliceProvider(b"abc");
        let mut out = OutputBuffer::new();
        enc.new_entry_external(path, ExternalKind::Bytes, &mut provider, &mut out)
            .unwrap();
        let mut expected = vec![0xC3, 0x01];
        expected.extend_from_slice(b"abc");
        assert_eq!(drain(&mut out), expected);
    }

    #[test]
    fn encodes_external_bytes_inside_instance_container() {
        let base = Path::make(&[3]).unwrap();
        let mut enc = TlvEncoder::new(base);
        let mut out = OutputBuffer::new();
        let path = Path::make(&[3, 0, 1]).unwrap();
        let mut provider = SliceProvider(b"xy");
        enc.new_entry_external(path, ExternalKind::Bytes, &mut provider, &mut out)
            .unwrap();
        assert!(!out.has_more(), "buffered inside the instance container");
        assert!(enc.destroy(&mut out).unwrap());
        let mut expected = vec![0x04, 0x00, 0xC2, 0x01];
        expected.extend_from_slice(b"xy");
        assert_eq!(drain(&mut out), expected);
    }
}
