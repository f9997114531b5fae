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
//! Format dispatch: a tagged union of the per-format codec states, replacing a function-pointer
//! vtable with an enum whose `new_entry`/`get_entry` are match arms. [`InputContext`] and
//! [`OutputContext`] are the sole entry points a CoAP/LwM2M request handler needs - it never
//! touches `tlv`/`senml`/`lwm2m_cbor`/`cbor_single`/`plaintext` directly.
use crate::cbor_single::{decoder::CborSingleDecoder, encoder::CborSingleEncoder};
use crate::error::{CoreError, Result};
use crate::linkformat::{LinkAttrs, LinkFormatEncoder, LinkFormatOp};
use crate::lwm2m_cbor::{decoder::LwM2MCborDecoder, encoder::LwM2MCborEncoder};
use crate::output::OutputBuffer;
use crate::path::Path;
use crate::plaintext::{PlaintextDecoder, PlaintextEncoder};
use crate::senml::{decoder::SenMLDecoder, encoder::SenMLEncoder};
use crate::tlv::{decoder::TlvDecoder, encoder::TlvEncoder};
use crate::value::{Entry, ExternalDataProvider, ExternalKind, ResourceValue, TypeMask};

/// The LwM2M interface operation a context was opened for. The dispatcher does not itself branch
/// on `Op` - format selection is driven by [`Format`] - but callers carry it through `init` so a
/// future access-control layer has it available without re-deriving it from the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Read,
    ReadComposite,
    Write,
    WritePartial,
    Execute,
    Discover,
    Register,
    BootstrapRead,
}

/// Wire format a context encodes to or decodes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Tlv,
    Cbor,
    SenMLCbor,
    LwM2MCbor,
    Plaintext,
    LinkFormat,
}

impl Format {
    /// Negotiate a format for an output context carrying `item_count` entries, absent a caller
    /// override: SenML-CBOR for more than one entry, plain CBOR for exactly one.
    pub fn negotiate(item_count: usize) -> Format {
        if item_count > 1 {
            Format::SenMLCbor
        } else {
            Format::Cbor
        }
    }
}

/// Resolve one TLV leaf (`get_path` plus whichever typed getter the mask uniquely admits) into
/// an [`Entry`]. TLV carries no type tag of its own - the declared length only narrows the
/// candidate kinds - so ambiguity is resolved purely against `mask`, mirroring
/// [`crate::leaf::resolve_numeric`]'s "exactly one candidate or bust" rule but over the whole
/// kind space rather than just int/uint/double.
fn tlv_get_entry<'buf>(dec: &mut TlvDecoder<'buf>, mask: TypeMask) -> Result<Entry<'buf>> {
    let path = dec.get_path()?;
    let len = dec.current_value_len()?;
    let numeric_len_ok = len > 0 && len <= 8 && len.is_power_of_two();
    let double_len_ok = len == 4 || len == 8;

    let want_bool = mask.allows(TypeMask::BOOL) && len == 1;
    let want_objlnk = mask.allows(TypeMask::OBJLNK) && len == 4;
    let want_time = mask.allows(TypeMask::TIME) && numeric_len_ok;
    let want_int = mask.allows(TypeMask::INT) && numeric_len_ok;
    let want_uint = mask.allows(TypeMask::UINT) && numeric_len_ok;
    let want_double = mask.allows(TypeMask::DOUBLE) && double_len_ok;
    let want_string = mask.allows(TypeMask::STRING);
    let want_bytes = mask.allows(TypeMask::BYTES);

    let candidates = want_bool as u32
        + want_objlnk as u32
        + want_time as u32
        + want_int as u32
        + want_uint as u32
        + want_double as u32
        + want_string as u32
        + want_bytes as u32;

    if candidates == 0 {
        return Err(CoreError::FormatError);
    }
    if candidates > 1 {
        return Err(CoreError::WantTypeDisambiguation);
    }

    let value = if want_bool {
        ResourceValue::Bool(dec.get_bool()?)
    } else if want_objlnk {
        ResourceValue::ObjLnk(dec.get_objlnk()?)
    } else if want_time {
        ResourceValue::Time(dec.get_time()?)
    } else if want_int {
        ResourceValue::Int(dec.get_int()?)
    } else if want_uint {
        ResourceValue::UInt(dec.get_uint()?)
    } else if want_double {
        ResourceValue::Double(dec.get_double()?)
    } else if want_string {
        let chunk = dec.get_bytes_chunk()?;
        if !chunk.is_last {
            return Err(CoreError::FormatError);
        }
        ResourceValue::String(core::str::from_utf8(chunk.data).map_err(|_| CoreError::FormatError)?)
    } else {
        let chunk = dec.get_bytes_chunk()?;
        if !chunk.is_last {
            return Err(CoreError::FormatError);
        }
        ResourceValue::Bytes(chunk.data)
    };

    dec.next_entry()?;
    Ok(Entry::new(path, value))
}

enum InputState<'buf> {
    Tlv(TlvDecoder<'buf>),
    Cbor(CborSingleDecoder<'buf>),
    SenMLCbor(SenMLDecoder<'buf>),
    LwM2MCbor(LwM2MCborDecoder<'buf>),
    Plaintext(PlaintextDecoder),
}

/// A format-erased decoding context: the single type a request handler needs regardless of
/// which wire format the peer actually used.
pub struct InputContext<'buf> {
    state: InputState<'buf>,
    format: Format,
}

impl<'buf> InputContext<'buf> {
    /// Open a decoding context for `op` at `base`, parsing `format`. `LinkFormat` has no reader
    /// (link-format is only ever produced by this core) and is rejected with `FormatError`.
    pub fn init(_op: Op, base: Path, format: Format) -> Result<Self> {
        let state = match format {
            Format::Tlv => InputState::Tlv(TlvDecoder::new(base)),
            Format::Cbor => InputState::Cbor(CborSingleDecoder::new(base)),
            Format::SenMLCbor => InputState::SenMLCbor(SenMLDecoder::new(base)),
            Format::LwM2MCbor => InputState::LwM2MCbor(LwM2MCborDecoder::new(base)),
            Format::Plaintext => InputState::Plaintext(PlaintextDecoder::new(base)),
            Format::LinkFormat => return Err(CoreError::FormatError),
        };
        Ok(InputContext { state, format })
    }

    /// Supply the next chunk of wire bytes.
    pub fn feed(&mut self, buf: &'buf [u8], is_last: bool) -> Result<()> {
        match &mut self.state {
            InputState::Tlv(d) => d.feed_payload(buf, is_last),
            InputState::Cbor(d) => d.feed_payload(buf, is_last),
            InputState::SenMLCbor(d) => d.feed_payload(buf, is_last),
            InputState::LwM2MCbor(d) => d.feed_payload(buf, is_last),
            InputState::Plaintext(d) => d.feed_payload(buf, is_last),
        }
    }

    /// Decode the next entry.
    pub fn get_entry(&mut self, mask: TypeMask) -> Result<Entry<'buf>> {
        match &mut self.state {
            InputState::Tlv(d) => tlv_get_entry(d, mask),
            InputState::Cbor(d) => d.get_entry(mask),
            InputState::SenMLCbor(d) => d.get_entry(mask),
            InputState::LwM2MCbor(d) => d.get_entry(mask),
            InputState::Plaintext(d) => d.get_entry(mask),
        }
    }

    /// Pre-scan the outer record count. Only meaningful for SenML-CBOR (see
    /// [`SenMLDecoder::get_entry_count`]); any other format is a `LogicError`.
    pub fn get_entry_count(&mut self) -> Result<i64> {
        match &mut self.state {
            InputState::SenMLCbor(d) => d.get_entry_count(),
            _ => Err(CoreError::LogicError),
        }
    }

    /// True once every entry has been delivered.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            InputState::Tlv(d) => d.is_finished(),
            InputState::Cbor(d) => d.is_finished(),
            InputState::SenMLCbor(d) => d.is_finished(),
            InputState::LwM2MCbor(d) => d.is_finished(),
            InputState::Plaintext(d) => d.is_finished(),
        }
    }

    /// The format this context was opened with.
    pub fn format(&self) -> Format {
        self.format
    }
}

enum OutputState {
    Tlv(TlvEncoder),
    Cbor(CborSingleEncoder),
    SenMLCbor(SenMLEncoder),
    LwM2MCbor(LwM2MCborEncoder),
    Plaintext(PlaintextEncoder),
    LinkFormat(LinkFormatEncoder),
}

/// A format-erased encoding context.
///
/// `LinkFormat` does not transport [`ResourceValue`] entries at all - Register/Discover
/// responses are path-plus-attribute strings, not resource values - so it is driven through
/// [`OutputContext::new_link_entry`] instead of [`OutputContext::new_entry`]; calling the wrong
/// one for the active format is a `LogicError`.
pub struct OutputContext {
    state: OutputState,
    format: Format,
}

impl OutputContext {
    /// Open an encoding context writing `format` rooted at `base`. `link_op` selects
    /// Register-vs-Discover attribute rules and is ignored for every other format. `item_count`
    /// is the number of entries the caller intends to write - only SenML-CBOR's outer array uses
    /// it (a negative value opens an indefinite-length array for callers that don't know their
    /// result set size up front, e.g. a streamed Composite-Read); every other format ignores it.
    pub fn init(base: Path, format: Format, link_op: LinkFormatOp, item_count: i64) -> Result<Self> {
        let state = match format {
            Format::Tlv => OutputState::Tlv(TlvEncoder::new(base)),
            Format::Cbor => OutputState::Cbor(CborSingleEncoder::new(base)),
            Format::SenMLCbor => OutputState::SenMLCbor(SenMLEncoder::new(base, item_count)),
            Format::LwM2MCbor => OutputState::LwM2MCbor(LwM2MCborEncoder::new(base)),
            Format::Plaintext => OutputState::Plaintext(PlaintextEncoder::new(base)),
            Format::LinkFormat => OutputState::LinkFormat(LinkFormatEncoder::new(base, link_op)),
        };
        Ok(OutputContext { state, format })
    }

    /// Encode one resource-value entry. `LogicError` if this context is writing `LinkFormat`.
    pub fn new_entry<'buf>(&mut self, entry: &Entry<'buf>, out: &mut OutputBuffer<'buf>) -> Result<()> {
        match &mut self.state {
            OutputState::Tlv(e) => e.new_entry(entry, out),
            OutputState::Cbor(e) => e.new_entry(entry, out),
            OutputState::SenMLCbor(e) => e.new_entry(entry, out),
            OutputState::LwM2MCbor(e) => e.new_entry(entry, out),
            OutputState::Plaintext(e) => e.new_entry(entry, out),
            OutputState::LinkFormat(_) => Err(CoreError::LogicError),
        }
    }

    /// Encode one entry whose value is supplied lazily via an [`ExternalDataProvider`] rather
    /// than held inline. `timestamp` is used only by SenML-CBOR (`NaN` to omit); every other
    /// format ignores it, matching how [`Self::new_entry`] never reads a plaintext/TLV/CBOR
    /// entry's timestamp either. `LogicError` if this context is writing `LinkFormat`.
    pub fn new_entry_external<'buf>(
        &mut self,
        path: Path,
        kind: ExternalKind,
        timestamp: f64,
        provider: &'buf mut dyn ExternalDataProvider,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        match &mut self.state {
            OutputState::Tlv(e) => e.new_entry_external(path, kind, provider, out),
            OutputState::Cbor(e) => e.new_entry_external(path, kind, provider, out),
            OutputState::SenMLCbor(e) => e.new_entry_external(path, kind, timestamp, provider, out),
            OutputState::LwM2MCbor(e) => e.new_entry_external(path, kind, provider, out),
            OutputState::Plaintext(e) => e.new_entry_external(path, kind, provider, out),
            OutputState::LinkFormat(_) => Err(CoreError::LogicError),
        }
    }

    /// Append one link-format entry. `LogicError` unless this context is writing `LinkFormat`.
    pub fn new_link_entry<'buf>(
        &mut self,
        path: Path,
        attrs: &LinkAttrs<'_>,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        match &mut self.state {
            OutputState::LinkFormat(e) => e.new_entry(path, attrs, out),
            _ => Err(CoreError::LogicError),
        }
    }

    /// Close any open aggregate containers (TLV, LwM2M-CBOR). A no-op returning `Ok(true)` for
    /// formats with no container state of their own.
    pub fn destroy<'buf>(&mut self, out: &mut OutputBuffer<'buf>) -> Result<bool> {
        match &mut self.state {
            OutputState::Tlv(e) => e.destroy(out),
            OutputState::LwM2MCbor(e) => e.destroy(out),
            OutputState::SenMLCbor(e) => e.destroy(out),
            _ => Ok(true),
        }
    }

    /// The format this context was opened with.
    pub fn format(&self) -> Format {
        self.format
    }
}
