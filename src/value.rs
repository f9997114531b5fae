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
 * Resource value model: the tagged union every codec in this crate decodes into / encodes from,
 * plus the chunked-bytes view used to stream byte/text string payloads without buffering them
 * whole.
 **************************************************************************************************/
use crate::path::Path;

/// A view onto one chunk of a (possibly multi-chunk) byte or text-string resource value.
///
/// Across successive chunks of a single value, `offset` grows monotonically by the previous
/// chunk's length, and `offset + data.len() <= full_length_hint` once the hint is known. The
/// hint becomes exact (`full_length_hint == offset + data.len()`) on the final chunk.
#[derive(Copy, Clone, Debug)]
pub struct ChunkedBytes<'buf> {
    /// The bytes making up this chunk.
    pub data: &'buf [u8],
    /// Byte offset of `data[0]` within the full value.
    pub offset: usize,
    /// Best current estimate of the full value length. Exact once the last chunk is seen.
    pub full_length_hint: usize,
    /// True iff this is the final chunk of the value.
    pub is_last: bool,
}

/// An LwM2M Object Link: a reference to `/oid/iid`. `65535` in either field is the LwM2M-defined
/// "not set" sentinel for object links specifically (distinct from [`crate::path::ID_SENTINEL`]
/// used internally by [`Path`], though the numeric value coincides).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ObjectLink {
    pub oid: u16,
    pub iid: u16,
}

impl ObjectLink {
    pub const UNSET: ObjectLink = ObjectLink {
        oid: 65535,
        iid: 65535,
    };
}

/// Supplies the bytes of a resource value whose length is known up front but whose content is
/// produced lazily (e.g. backed by flash or a sensor buffer), rather than held inline. Mirrors
/// the external data provider callback of the lower-level interface (see module docs), expressed
/// as a trait so the borrow checker - not convention - governs the lifetime of `user` state.
pub trait ExternalDataProvider {
    /// Copy `dst.len()` bytes starting at `offset` into `dst`. Must be synchronous: the codec
    /// layer never suspends mid-callback.
    fn fetch(&mut self, dst: &mut [u8], offset: usize) -> crate::error::Result<()>;
    /// Total length of the externally-provided value.
    fn len(&self) -> usize;
}

/// Distinguishes a byte-string external value from a text-string one for
/// [`crate::output::OutputBuffer::stage_external_tail`] callers, since the two differ only in
/// which header (CBOR major type, or TLV has no distinction at all) precedes the fetched bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExternalKind {
    Bytes,
    String,
}

/// One LwM2M resource value, tagged by kind. Byte/string payloads are represented by a borrowed
/// slice for the common inline case; the streaming codecs additionally support chunked delivery
/// via [`ChunkedBytes`] when decoding and [`ExternalDataProvider`] when encoding.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ResourceValue<'buf> {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Bool(bool),
    /// Epoch seconds.
    Time(i64),
    ObjLnk(ObjectLink),
    Bytes(&'buf [u8]),
    String(&'buf str),
}

impl<'buf> ResourceValue<'buf> {
    /// Human-readable kind name, used in error contexts and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResourceValue::Null => "null",
            ResourceValue::Int(_) => "int",
            ResourceValue::UInt(_) => "uint",
            ResourceValue::Double(_) => "double",
            ResourceValue::Bool(_) => "bool",
            ResourceValue::Time(_) => "time",
            ResourceValue::ObjLnk(_) => "objlnk",
            ResourceValue::Bytes(_) => "bytes",
            ResourceValue::String(_) => "string",
        }
    }
}

/// A bitmask describing which [`ResourceValue`] kinds a caller is willing to accept from
/// `get_entry`. Numeric wire values (CBOR/TLV integers) are not always unambiguously int vs.
/// uint vs. double until the caller's object model narrows it; see [`crate::error::CoreError::WantTypeDisambiguation`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeMask(pub u32);

impl TypeMask {
    pub const NULL: u32 = 1 << 0;
    pub const INT: u32 = 1 << 1;
    pub const UINT: u32 = 1 << 2;
    pub const DOUBLE: u32 = 1 << 3;
    pub const BOOL: u32 = 1 << 4;
    pub const TIME: u32 = 1 << 5;
    pub const OBJLNK: u32 = 1 << 6;
    pub const BYTES: u32 = 1 << 7;
    pub const STRING: u32 = 1 << 8;
    pub const ANY_NUMERIC: u32 = Self::INT | Self::UINT | Self::DOUBLE;
    pub const ANY: u32 = u32::MAX;

    pub fn allows(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }
}

/// One decoded or to-be-encoded record: a path, the value at that path, and an optional
/// timestamp (`NaN` meaning "omit").
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Entry<'buf> {
    pub path: Path,
    pub value: ResourceValue<'buf>,
    pub timestamp: f64,
}

impl<'buf> Entry<'buf> {
    pub fn new(path: Path, value: ResourceValue<'buf>) -> Self {
        Entry {
            path,
            value,
            timestamp: f64::NAN,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn has_timestamp(&self) -> bool {
        !self.timestamp.is_nan()
    }
}
