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
use crate::cbor_ll::{additional_info, major_type, ItemKind, Number, TAG_DECIMAL_FRACTION, TAG_EPOCH_DATE_TIME, TAG_STRING_DATE_TIME};
use crate::constants::*;
use crate::error::{CoreError, Result};
use crate::value::ChunkedBytes;
#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "string-time")]
mod time;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

/// Upper bound on array/map nesting depth. A fixed array, not a growable stack, so depth cannot
/// be used to exhaust memory.
pub const MAX_NEST: usize = 8;

#[derive(Copy, Clone, Debug)]
struct Frame {
    /// `Some(n)` = definite container with `n` remaining child *items* (a map's `n` counts
    /// key+value individually, i.e. twice its pair count). `None` = indefinite, closed by BREAK.
    declared_remaining: Option<u64>,
    /// Whether this frame is a map, so an indefinite-length instance can be checked for an even
    /// item count (a dangling key with no value) when it closes on `BREAK`.
    is_map: bool,
    /// Items produced so far in this frame. Only consulted for indefinite-length maps.
    items_seen: u64,
}

#[derive(Copy, Clone, Debug)]
struct RawHeader {
    major: u8,
    ai: u8,
    value: u64,
    indefinite: bool,
}

#[derive(Copy, Clone, Debug)]
struct CurrentItem {
    kind: ItemKind,
    number: Option<Number>,
    bool_val: bool,
    /// For Bytes/Text: declared length, if definite.
    str_len: Option<u64>,
    /// For Bytes/Text: true if this is an indefinite-length container of definite chunks.
    str_indefinite: bool,
    /// For Array/Map: declared element count (items, not pairs), if definite.
    container_len: Option<u64>,
    container_indefinite: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ContentState {
    Idle,
    Definite { remaining: usize },
    IndefiniteAwaitingChunk,
    IndefiniteInChunk { remaining: usize },
    Done,
}

/// In-flight progress of a semantic-tag sub-parser (tag 0/1/4), so a `WantMore` suspension in the
/// middle of one can be resumed on the next `feed_payload` instead of `ensure_current` mistaking
/// the tag's unparsed tail for a fresh top-level item.
#[derive(Copy, Clone, Debug)]
enum TagResume {
    None,
    EpochTime,
    StringTimeHeader,
    StringTimeBody {
        scratch: [u8; 35],
        len: usize,
        got: usize,
    },
    DecimalFractionHeader,
    DecimalFractionExponent,
    DecimalFractionMantissa {
        exponent: i64,
    },
}

/// A streaming, suspendable, non-allocating CBOR decoder.
///
/// `'buf` is the lifetime shared by every byte slice ever passed to [`feed_payload`]: all such
/// slices must outlive the decoder, since byte/text-string chunks are handed back to the caller
/// as zero-copy `&'buf [u8]` views (see [`Self::bytes_chunk`]).
pub struct CborLLDecoder<'buf> {
    window: &'buf [u8],
    pos: usize,
    is_last: bool,
    started: bool,

    prebuffer: [u8; 9],
    prebuffer_len: usize,

    stack: [Frame; MAX_NEST],
    depth: usize,

    after_tag: bool,
    current: Option<CurrentItem>,
    content: ContentState,
    bytes_offset: usize,
    finished: bool,
    tag_resume: TagResume,
}

impl<'buf> CborLLDecoder<'buf> {
    /// A decoder with no input yet. Call [`feed_payload`] before anything else.
    pub fn new() -> Self {
        CborLLDecoder {
            window: &[],
            pos: 0,
            is_last: false,
            started: false,
            prebuffer: [0; 9],
            prebuffer_len: 0,
            stack: [Frame {
                declared_remaining: None,
                is_map: false,
                items_seen: 0,
            }; MAX_NEST],
            depth: 0,
            after_tag: false,
            current: None,
            content: ContentState::Idle,
            bytes_offset: 0,
            finished: false,
            tag_resume: TagResume::None,
        }
    }

    /// Supply the next chunk of wire bytes. `is_last` marks this as the final chunk of the
    /// entire payload. Fails with [`CoreError::LogicError`] if the previous chunk has not been
    /// fully consumed yet, or if a chunk was already marked final.
    #[cfg_attr(feature = "trace", trace)]
    pub fn feed_payload(&mut self, buf: &'buf [u8], is_last: bool) -> Result<()> {
        if self.started && self.pos < self.window.len() {
            return Err(CoreError::LogicError);
        }
        if self.started && self.is_last {
            return Err(CoreError::LogicError);
        }
        self.window = buf;
        self.pos = 0;
        self.is_last = is_last;
        self.started = true;
        Ok(())
    }

    /// Current nesting depth (0 at the top level).
    pub fn nesting_level(&self) -> usize {
        self.depth
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.pos < self.window.len() {
            let b = self.window[self.pos];
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }

    fn at_end_of_input(&self) -> bool {
        self.pos >= self.window.len()
    }

    fn ext_len_for_ai(ai: u8) -> usize {
        match ai {
            PAYLOAD_ONE_BYTE => 1,
            PAYLOAD_TWO_BYTES => 2,
            PAYLOAD_FOUR_BYTES => 4,
            PAYLOAD_EIGHT_BYTES => 8,
            _ => 0,
        }
    }

    /// Reassemble one CBOR header (major/AI byte plus its extension bytes, if any) across
    /// however many `feed_payload` calls it takes. Retains at most 9 bytes in `self.prebuffer`
    /// across a suspension.
    #[cfg_attr(feature = "trace", trace)]
    fn read_header(&mut self) -> Result<RawHeader> {
        if self.prebuffer_len == 0 {
            let b = match self.next_byte() {
                Some(b) => b,
                None => {
                    return if self.is_last {
                        Err(CoreError::FormatError)
                    } else {
                        Err(CoreError::WantMore)
                    }
                }
            };
            self.prebuffer[0] = b;
            self.prebuffer_len = 1;
        }
        let first = self.prebuffer[0];
        let ai = additional_info(first);
        let ext_len = Self::ext_len_for_ai(ai);
        let total = 1 + ext_len;
        while self.prebuffer_len < total {
            match self.next_byte() {
                Some(b) => {
                    self.prebuffer[self.prebuffer_len] = b;
                    self.prebuffer_len += 1;
                }
                None => {
                    return if self.is_last {
                        Err(CoreError::FormatError)
                    } else {
                        Err(CoreError::WantMore)
                    }
                }
            }
        }
        let value: u64 = match ext_len {
            0 => ai as u64,
            1 => self.prebuffer[1] as u64,
            2 => u16::from_be_bytes([self.prebuffer[1], self.prebuffer[2]]) as u64,
            4 => u32::from_be_bytes([
                self.prebuffer[1],
                self.prebuffer[2],
                self.prebuffer[3],
                self.prebuffer[4],
            ]) as u64,
            8 => u64::from_be_bytes([
                self.prebuffer[1],
                self.prebuffer[2],
                self.prebuffer[3],
                self.prebuffer[4],
                self.prebuffer[5],
                self.prebuffer[6],
                self.prebuffer[7],
                self.prebuffer[8],
            ]),
            _ => unreachable!(),
        };
        self.prebuffer_len = 0;
        Ok(RawHeader {
            major: major_type(first),
            ai,
            value,
            indefinite: ai == PAYLOAD_INDEFINITE,
        })
    }

    /// Read a header that must resolve to a plain number (major 0, 1, or a float under major 7).
    fn read_numeric_header(&mut self) -> Result<Number> {
        let h = self.read_header()?;
        match h.major {
            0 => Ok(Number::UInt(h.value)),
            1 => Ok(Number::NegInt(h.value)),
            7 if cfg!(feature = "float") => match h.ai {
                PAYLOAD_TWO_BYTES => {
                    #[cfg(feature = "float")]
                    {
                        let f = half::f16::from_bits(h.value as u16).to_f32();
                        Ok(Number::Float(f))
                    }
                    #[cfg(not(feature = "float"))]
                    Err(CoreError::FormatError)
                }
                PAYLOAD_FOUR_BYTES => Ok(Number::Float(f32::from_bits(h.value as u32))),
                PAYLOAD_EIGHT_BYTES => Ok(Number::Double(f64::from_bits(h.value))),
                _ => Err(CoreError::FormatError),
            },
            _ => Err(CoreError::FormatError),
        }
    }

    fn note_item_produced(&mut self) -> Result<()> {
        if self.depth > 0 {
            let top = &mut self.stack[self.depth - 1];
            if let Some(rem) = top.declared_remaining {
                if rem == 0 {
                    return Err(CoreError::FormatError);
                }
                top.declared_remaining = Some(rem - 1);
            }
            top.items_seen += 1;
        }
        Ok(())
    }

    fn pop_exhausted_frames(&mut self) {
        while self.depth > 0 && self.stack[self.depth - 1].declared_remaining == Some(0) {
            self.depth -= 1;
        }
    }

    fn top_is_indefinite(&self) -> bool {
        self.depth > 0 && self.stack[self.depth - 1].declared_remaining.is_none()
    }

    fn peek_is_break(&mut self) -> Result<bool> {
        if self.pos < self.window.len() {
            Ok(self.window[self.pos] == BREAK)
        } else if self.is_last {
            Ok(false)
        } else {
            Err(CoreError::WantMore)
        }
    }

    /// Ensure `self.current` holds the next item, suspending with `WantMore` as needed, or
    /// failing with `Eof` once every open container has closed and no input remains.
    #[cfg_attr(feature = "trace", trace)]
    fn ensure_current(&mut self) -> Result<()> {
        if self.current.is_some() {
            return Ok(());
        }
        loop {
            if !matches!(self.tag_resume, TagResume::None) {
                return self.resume_tag_parse();
            }
            self.pop_exhausted_frames();
            if self.top_is_indefinite() && self.peek_is_break()? {
                let top = self.stack[self.depth - 1];
                if top.is_map && top.items_seen % 2 != 0 {
                    return Err(CoreError::FormatError);
                }
                self.pos += 1;
                self.depth -= 1;
                continue;
            }
            if self.at_end_of_input() {
                if self.depth == 0 && !self.after_tag {
                    self.finished = true;
                    return Err(CoreError::Eof);
                } else if !self.is_last {
                    return Err(CoreError::WantMore);
                } else {
                    return Err(CoreError::FormatError);
                }
            }
            let h = self.read_header()?;
            let was_after_tag = self.after_tag;
            self.after_tag = false;
            let _ = was_after_tag;
            match h.major {
                0 => {
                    self.current = Some(CurrentItem {
                        kind: ItemKind::UInt,
                        number: Some(Number::UInt(h.value)),
                        bool_val: false,
                        str_len: None,
                        str_indefinite: false,
                        container_len: None,
                        container_indefinite: false,
                    });
                    self.note_item_produced()?;
                    return Ok(());
                }
                1 => {
                    self.current = Some(CurrentItem {
                        kind: ItemKind::NegInt,
                        number: Some(Number::NegInt(h.value)),
                        bool_val: false,
                        str_len: None,
                        str_indefinite: false,
                        container_len: None,
                        container_indefinite: false,
                    });
                    self.note_item_produced()?;
                    return Ok(());
                }
                2 | 3 => {
                    let kind = if h.major == 2 {
                        ItemKind::Bytes
                    } else {
                        ItemKind::Text
                    };
                    if h.indefinite {
                        #[cfg(feature = "indefinite-strings")]
                        {
                            self.current = Some(CurrentItem {
                                kind,
                                number: None,
                                bool_val: false,
                                str_len: None,
                                str_indefinite: true,
                                container_len: None,
                                container_indefinite: false,
                            });
                            self.content = ContentState::IndefiniteAwaitingChunk;
                            self.bytes_offset = 0;
                            self.note_item_produced()?;
                            return Ok(());
                        }
                        #[cfg(not(feature = "indefinite-strings"))]
                        return Err(CoreError::FormatError);
                    }
                    self.current = Some(CurrentItem {
                        kind,
                        number: None,
                        bool_val: false,
                        str_len: Some(h.value),
                        str_indefinite: false,
                        container_len: None,
                        container_indefinite: false,
                    });
                    self.content = ContentState::Definite {
                        remaining: h.value as usize,
                    };
                    self.bytes_offset = 0;
                    self.note_item_produced()?;
                    return Ok(());
                }
                4 | 5 => {
                    let is_map = h.major == 5;
                    let declared = if h.indefinite {
                        None
                    } else if is_map {
                        Some(h.value.saturating_mul(2))
                    } else {
                        Some(h.value)
                    };
                    self.current = Some(CurrentItem {
                        kind: if is_map { ItemKind::Map } else { ItemKind::Array },
                        number: None,
                        bool_val: false,
                        str_len: None,
                        str_indefinite: false,
                        container_len: declared,
                        container_indefinite: h.indefinite,
                    });
                    self.note_item_produced()?;
                    return Ok(());
                }
                6 => {
                    self.after_tag = true;
                    match h.value {
                        TAG_STRING_DATE_TIME => {
                            #[cfg(feature = "string-time")]
                            {
                                self.tag_resume = TagResume::StringTimeHeader;
                                let n = self.drive_string_time()?;
                                self.finish_timestamp(n)?;
                                return Ok(());
                            }
                            #[cfg(not(feature = "string-time"))]
                            return Err(CoreError::FormatError);
                        }
                        TAG_EPOCH_DATE_TIME => {
                            self.tag_resume = TagResume::EpochTime;
                            let n = self.read_numeric_header()?;
                            self.tag_resume = TagResume::None;
                            self.finish_timestamp(n)?;
                            return Ok(());
                        }
                        TAG_DECIMAL_FRACTION => {
                            #[cfg(feature = "decimal-fractions")]
                            {
                                self.tag_resume = TagResume::DecimalFractionHeader;
                                let v = self.drive_decimal_fraction()?;
                                self.finish_decimal(v)?;
                                return Ok(());
                            }
                            #[cfg(not(feature = "decimal-fractions"))]
                            return Err(CoreError::FormatError);
                        }
                        _ => continue,
                    }
                }
                7 => match h.ai {
                    SIMPLE_FALSE => {
                        self.current = Some(CurrentItem {
                            kind: ItemKind::Bool,
                            number: None,
                            bool_val: false,
                            str_len: None,
                            str_indefinite: false,
                            container_len: None,
                            container_indefinite: false,
                        });
                        self.note_item_produced()?;
                        return Ok(());
                    }
                    SIMPLE_TRUE => {
                        self.current = Some(CurrentItem {
                            kind: ItemKind::Bool,
                            number: None,
                            bool_val: true,
                            str_len: None,
                            str_indefinite: false,
                            container_len: None,
                            container_indefinite: false,
                        });
                        self.note_item_produced()?;
                        return Ok(());
                    }
                    SIMPLE_NULL => {
                        self.current = Some(CurrentItem {
                            kind: ItemKind::Null,
                            number: None,
                            bool_val: false,
                            str_len: None,
                            str_indefinite: false,
                            container_len: None,
                            container_indefinite: false,
                        });
                        self.note_item_produced()?;
                        return Ok(());
                    }
                    SIMPLE_UNDEFINED => {
                        self.current = Some(CurrentItem {
                            kind: ItemKind::Undefined,
                            number: None,
                            bool_val: false,
                            str_len: None,
                            str_indefinite: false,
                            container_len: None,
                            container_indefinite: false,
                        });
                        self.note_item_produced()?;
                        return Ok(());
                    }
                    PAYLOAD_TWO_BYTES | PAYLOAD_FOUR_BYTES | PAYLOAD_EIGHT_BYTES => {
                        #[cfg(feature = "float")]
                        {
                            let (kind, number) = if h.ai == PAYLOAD_EIGHT_BYTES {
                                (ItemKind::Double, Number::Double(f64::from_bits(h.value)))
                            } else if h.ai == PAYLOAD_FOUR_BYTES {
                                (
                                    ItemKind::Float,
                                    Number::Float(f32::from_bits(h.value as u32)),
                                )
                            } else {
                                (
                                    ItemKind::Float,
                                    Number::Float(half::f16::from_bits(h.value as u16).to_f32()),
                                )
                            };
                            self.current = Some(CurrentItem {
                                kind,
                                number: Some(number),
                                bool_val: false,
                                str_len: None,
                                str_indefinite: false,
                                container_len: None,
                                container_indefinite: false,
                            });
                            self.note_item_produced()?;
                            return Ok(());
                        }
                        #[cfg(not(feature = "float"))]
                        return Err(CoreError::FormatError);
                    }
                    _ => return Err(CoreError::FormatError),
                },
                _ => return Err(CoreError::FormatError),
            }
        }
    }

    /// Resume an in-flight tag-0/tag-1/tag-4 sub-parse left incomplete by a prior `WantMore`.
    /// Called from the top of [`Self::ensure_current`]'s loop whenever `self.tag_resume` is not
    /// `None`, instead of reading a fresh header at whatever offset the suspension left `self.pos`.
    fn resume_tag_parse(&mut self) -> Result<()> {
        match self.tag_resume {
            TagResume::None => unreachable!(),
            TagResume::EpochTime => {
                let n = self.read_numeric_header()?;
                self.tag_resume = TagResume::None;
                self.finish_timestamp(n)
            }
            #[cfg(feature = "string-time")]
            TagResume::StringTimeHeader | TagResume::StringTimeBody { .. } => {
                let n = self.drive_string_time()?;
                self.finish_timestamp(n)
            }
            #[cfg(not(feature = "string-time"))]
            TagResume::StringTimeHeader | TagResume::StringTimeBody { .. } => unreachable!(),
            #[cfg(feature = "decimal-fractions")]
            TagResume::DecimalFractionHeader
            | TagResume::DecimalFractionExponent
            | TagResume::DecimalFractionMantissa { .. } => {
                let v = self.drive_decimal_fraction()?;
                self.finish_decimal(v)
            }
            #[cfg(not(feature = "decimal-fractions"))]
            TagResume::DecimalFractionHeader
            | TagResume::DecimalFractionExponent
            | TagResume::DecimalFractionMantissa { .. } => unreachable!(),
        }
    }

    fn finish_timestamp(&mut self, n: Number) -> Result<()> {
        self.current = Some(CurrentItem {
            kind: ItemKind::Timestamp,
            number: Some(n),
            bool_val: false,
            str_len: None,
            str_indefinite: false,
            container_len: None,
            container_indefinite: false,
        });
        self.after_tag = false;
        self.note_item_produced()
    }

    #[cfg(feature = "decimal-fractions")]
    fn finish_decimal(&mut self, v: f64) -> Result<()> {
        self.current = Some(CurrentItem {
            kind: ItemKind::Double,
            number: Some(Number::Double(v)),
            bool_val: false,
            str_len: None,
            str_indefinite: false,
            container_len: None,
            container_indefinite: false,
        });
        self.after_tag = false;
        self.note_item_produced()
    }

    /// Drives the tag-4 (decimal fraction) sub-parse through `self.tag_resume`'s stages, so a
    /// `WantMore` at any stage leaves enough on `self` (exponent included) to pick back up here
    /// rather than re-reading a header from the middle of the mantissa.
    #[cfg(feature = "decimal-fractions")]
    fn drive_decimal_fraction(&mut self) -> Result<f64> {
        loop {
            match self.tag_resume {
                TagResume::DecimalFractionHeader => {
                    let arr = self.read_header()?;
                    if arr.major != 4 || arr.indefinite || arr.value != 2 {
                        self.tag_resume = TagResume::None;
                        return Err(CoreError::FormatError);
                    }
                    self.tag_resume = TagResume::DecimalFractionExponent;
                }
                TagResume::DecimalFractionExponent => {
                    let exponent = self.read_numeric_header()?;
                    let exp = match exponent.as_i64() {
                        Some(e) => e,
                        None => {
                            self.tag_resume = TagResume::None;
                            return Err(CoreError::FormatError);
                        }
                    };
                    self.tag_resume = TagResume::DecimalFractionMantissa { exponent: exp };
                }
                TagResume::DecimalFractionMantissa { exponent } => {
                    let mantissa = self.read_numeric_header()?;
                    self.tag_resume = TagResume::None;
                    let mant = mantissa.as_i64().ok_or(CoreError::FormatError)? as f64;
                    return Ok(mant * libm_pow10(exponent as i32));
                }
                _ => unreachable!(),
            }
        }
    }

    /// Drives the tag-0 (string date-time) sub-parse through `self.tag_resume`'s stages. The
    /// partially-read string content lives in `TagResume::StringTimeBody::scratch` on `self`, not
    /// a local, so a `WantMore` mid-string can resume from the exact byte it stopped at.
    #[cfg(feature = "string-time")]
    fn drive_string_time(&mut self) -> Result<Number> {
        loop {
            match self.tag_resume {
                TagResume::StringTimeHeader => {
                    let h = self.read_header()?;
                    if h.major != 3 || h.indefinite {
                        self.tag_resume = TagResume::None;
                        return Err(CoreError::FormatError);
                    }
                    let len = h.value as usize;
                    if len == 0 || len > 35 {
                        self.tag_resume = TagResume::None;
                        return Err(CoreError::FormatError);
                    }
                    self.tag_resume = TagResume::StringTimeBody {
                        scratch: [0u8; 35],
                        len,
                        got: 0,
                    };
                }
                TagResume::StringTimeBody {
                    mut scratch,
                    len,
                    mut got,
                } => {
                    while got < len {
                        match self.next_byte() {
                            Some(b) => {
                                scratch[got] = b;
                                got += 1;
                            }
                            None => {
                                self.tag_resume = TagResume::StringTimeBody { scratch, len, got };
                                return if self.is_last {
                                    self.tag_resume = TagResume::None;
                                    Err(CoreError::FormatError)
                                } else {
                                    Err(CoreError::WantMore)
                                };
                            }
                        }
                    }
                    self.tag_resume = TagResume::None;
                    return time::parse_rfc3339(&scratch[..len]);
                }
                _ => unreachable!(),
            }
        }
    }

    /// The CBOR type of the item the decoder is currently positioned on. Lazily drives the
    /// preprocessing state machine; may suspend with [`CoreError::WantMore`].
    #[cfg_attr(feature = "trace", trace)]
    pub fn current_value_type(&mut self) -> Result<ItemKind> {
        self.ensure_current()?;
        Ok(self.current.unwrap().kind)
    }

    /// Enter the array the decoder is currently positioned on, returning its element count (or
    /// `None` if indefinite-length).
    #[cfg_attr(feature = "trace", trace)]
    pub fn enter_array(&mut self) -> Result<Option<usize>> {
        self.ensure_current()?;
        let cur = self.current.take().ok_or(CoreError::LogicError)?;
        if cur.kind != ItemKind::Array {
            self.current = Some(cur);
            return Err(CoreError::FormatError);
        }
        if self.depth >= MAX_NEST {
            return Err(CoreError::FormatError);
        }
        self.stack[self.depth] = Frame {
            declared_remaining: cur.container_len,
            is_map: false,
            items_seen: 0,
        };
        self.depth += 1;
        Ok(cur.container_len.map(|n| n as usize))
    }

    /// Enter the map the decoder is currently positioned on, returning its pair count (or `None`
    /// if indefinite-length).
    #[cfg_attr(feature = "trace", trace)]
    pub fn enter_map(&mut self) -> Result<Option<usize>> {
        self.ensure_current()?;
        let cur = self.current.take().ok_or(CoreError::LogicError)?;
        if cur.kind != ItemKind::Map {
            self.current = Some(cur);
            return Err(CoreError::FormatError);
        }
        if self.depth >= MAX_NEST {
            return Err(CoreError::FormatError);
        }
        self.stack[self.depth] = Frame {
            declared_remaining: cur.container_len,
            is_map: true,
            items_seen: 0,
        };
        self.depth += 1;
        Ok(cur.container_len.map(|n| (n / 2) as usize))
    }

    /// Consume a `null` item.
    pub fn null(&mut self) -> Result<()> {
        self.ensure_current()?;
        let cur = self.current.take().ok_or(CoreError::LogicError)?;
        if cur.kind != ItemKind::Null {
            self.current = Some(cur);
            return Err(CoreError::FormatError);
        }
        Ok(())
    }

    /// Consume a `bool` item.
    pub fn bool_value(&mut self) -> Result<bool> {
        self.ensure_current()?;
        let cur = self.current.take().ok_or(CoreError::LogicError)?;
        if cur.kind != ItemKind::Bool {
            self.current = Some(cur);
            return Err(CoreError::FormatError);
        }
        Ok(cur.bool_val)
    }

    /// Consume a numeric item: `UInt`, `NegInt`, `Float`, `Double`, or a `Timestamp` wrapping one
    /// of those.
    #[cfg_attr(feature = "trace", trace)]
    pub fn number(&mut self) -> Result<Number> {
        self.ensure_current()?;
        let cur = self.current.take().ok_or(CoreError::LogicError)?;
        match cur.number {
            Some(n) => Ok(n),
            None => {
                self.current = Some(cur);
                Err(CoreError::FormatError)
            }
        }
    }

    /// Total declared length of the byte/text-string item the decoder is positioned on, or
    /// `None` if it is indefinite-length (its true length is known only once fully drained).
    pub fn bytes_len(&mut self) -> Result<Option<usize>> {
        self.ensure_current()?;
        let cur = self.current.as_ref().ok_or(CoreError::LogicError)?;
        if cur.kind != ItemKind::Bytes && cur.kind != ItemKind::Text {
            return Err(CoreError::FormatError);
        }
        Ok(cur.str_len.map(|n| n as usize))
    }

    /// Pull the next contiguous chunk of the byte/text-string item the decoder is positioned on.
    /// A chunk never copies: it borrows directly from whichever `feed_payload` buffer currently
    /// backs it. May return a zero-length, non-final chunk once when a suspension boundary falls
    /// exactly between two chunks.
    #[cfg_attr(feature = "trace", trace)]
    pub fn bytes_chunk(&mut self) -> Result<ChunkedBytes<'buf>> {
        self.ensure_current()?;
        {
            let cur = self.current.as_ref().ok_or(CoreError::LogicError)?;
            if cur.kind != ItemKind::Bytes && cur.kind != ItemKind::Text {
                return Err(CoreError::FormatError);
            }
        }
        loop {
            match self.content {
                ContentState::Idle | ContentState::Done => {
                    return Err(CoreError::LogicError);
                }
                ContentState::Definite { remaining } => {
                    let avail = (self.window.len() - self.pos).min(remaining);
                    if avail == 0 && remaining > 0 {
                        if self.is_last {
                            return Err(CoreError::FormatError);
                        }
                        return Err(CoreError::WantMore);
                    }
                    let slice = &self.window[self.pos..self.pos + avail];
                    self.pos += avail;
                    let offset = self.bytes_offset;
                    self.bytes_offset += avail;
                    let left = remaining - avail;
                    self.content = ContentState::Definite { remaining: left };
                    let is_last_chunk = left == 0;
                    if is_last_chunk {
                        self.content = ContentState::Done;
                        self.current = None;
                    }
                    return Ok(ChunkedBytes {
                        data: slice,
                        offset,
                        full_length_hint: offset + avail + left,
                        is_last: is_last_chunk,
                    });
                }
                #[cfg(feature = "indefinite-strings")]
                ContentState::IndefiniteAwaitingChunk => {
                    if self.peek_is_break()? {
                        self.pos += 1;
                        self.content = ContentState::Done;
                        self.current = None;
                        return Ok(ChunkedBytes {
                            data: &[],
                            offset: self.bytes_offset,
                            full_length_hint: self.bytes_offset,
                            is_last: true,
                        });
                    }
                    let expect_text = self.current.as_ref().unwrap().kind == ItemKind::Text;
                    let h = self.read_header()?;
                    let matches = if expect_text { h.major == 3 } else { h.major == 2 };
                    if !matches || h.indefinite {
                        return Err(CoreError::FormatError);
                    }
                    self.content = ContentState::IndefiniteInChunk {
                        remaining: h.value as usize,
                    };
                    continue;
                }
                #[cfg(not(feature = "indefinite-strings"))]
                ContentState::IndefiniteAwaitingChunk => return Err(CoreError::FormatError),
                #[cfg(feature = "indefinite-strings")]
                ContentState::IndefiniteInChunk { remaining } => {
                    let avail = (self.window.len() - self.pos).min(remaining);
                    if avail == 0 && remaining > 0 {
                        if self.is_last {
                            return Err(CoreError::FormatError);
                        }
                        return Err(CoreError::WantMore);
                    }
                    let slice = &self.window[self.pos..self.pos + avail];
                    self.pos += avail;
                    let offset = self.bytes_offset;
                    self.bytes_offset += avail;
                    let left = remaining - avail;
                    self.content = if left == 0 {
                        ContentState::IndefiniteAwaitingChunk
                    } else {
                        ContentState::IndefiniteInChunk { remaining: left }
                    };
                    return Ok(ChunkedBytes {
                        data: slice,
                        offset,
                        full_length_hint: offset + avail,
                        is_last: false,
                    });
                }
                #[cfg(not(feature = "indefinite-strings"))]
                ContentState::IndefiniteInChunk { .. } => return Err(CoreError::FormatError),
            }
        }
    }

    /// Skip the current item (of any kind) and all of its descendants, without examining its
    /// value.
    pub fn skip_item(&mut self) -> Result<()> {
        let kind = self.current_value_type()?;
        match kind {
            ItemKind::Null => self.null(),
            ItemKind::Bool => self.bool_value().map(|_| ()),
            ItemKind::UInt | ItemKind::NegInt | ItemKind::Float | ItemKind::Double | ItemKind::Timestamp => {
                self.number().map(|_| ())
            }
            ItemKind::Undefined => {
                self.current = None;
                Ok(())
            }
            ItemKind::Bytes | ItemKind::Text => loop {
                let chunk = self.bytes_chunk()?;
                if chunk.is_last {
                    return Ok(());
                }
            },
            ItemKind::Array => {
                let n = self.enter_array()?;
                self.skip_container(n)
            }
            ItemKind::Map => {
                let n = self.enter_map()?;
                self.skip_container(n.map(|p| p * 2))
            }
        }
    }

    fn skip_container(&mut self, declared: Option<usize>) -> Result<()> {
        match declared {
            Some(n) => {
                for _ in 0..n {
                    self.skip_item()?;
                }
                Ok(())
            }
            None => loop {
                self.pop_exhausted_frames();
                if self.top_is_indefinite() && self.peek_is_break()? {
                    self.pos += 1;
                    self.depth -= 1;
                    return Ok(());
                }
                self.skip_item()?;
            },
        }
    }

    /// True once every open container has closed and no further items remain.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<'buf> Default for CborLLDecoder<'buf> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "decimal-fractions")]
fn libm_pow10(exp: i32) -> f64 {
    let mut result = 1.0f64;
    let mut e = exp;
    let base = if e < 0 {
        e = -e;
        0.1f64
    } else {
        10.0f64
    };
    for _ in 0..e {
        result *= base;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_small_uint() {
        let mut d = CborLLDecoder::new();
        d.feed_payload(&[0x18, 0x19], true).unwrap();
        assert_eq!(d.current_value_type().unwrap(), ItemKind::UInt);
        assert_eq!(d.number().unwrap(), Number::UInt(25));
    }

    #[test]
    fn decodes_half_float() {
        let mut d = CborLLDecoder::new();
        d.feed_payload(&[0xF9, 0x50, 0x00], true).unwrap();
        assert_eq!(d.current_value_type().unwrap(), ItemKind::Float);
        match d.number().unwrap() {
            Number::Float(f) => assert_eq!(f, 32.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn suspends_on_split_header() {
        let mut d = CborLLDecoder::new();
        d.feed_payload(&[0x18], false).unwrap();
        assert_eq!(d.current_value_type(), Err(CoreError::WantMore));
        d.feed_payload(&[0x19], true).unwrap();
        assert_eq!(d.current_value_type().unwrap(), ItemKind::UInt);
        assert_eq!(d.number().unwrap(), Number::UInt(25));
    }

    #[test]
    fn nested_map_two_entries() {
        // BF 03 18 19 01 0B FF : {3: 25, 1: 11}
        let mut d = CborLLDecoder::new();
        d.feed_payload(&[0xBF, 0x03, 0x18, 0x19, 0x01, 0x0B, 0xFF], true)
            .unwrap();
        assert_eq!(d.current_value_type().unwrap(), ItemKind::Map);
        assert_eq!(d.enter_map().unwrap(), None);
        assert_eq!(d.number().unwrap(), Number::UInt(3));
        assert_eq!(d.number().unwrap(), Number::UInt(25));
        assert_eq!(d.number().unwrap(), Number::UInt(1));
        assert_eq!(d.number().unwrap(), Number::UInt(11));
        assert_eq!(d.current_value_type(), Err(CoreError::Eof));
    }

    #[cfg(feature = "string-time")]
    #[test]
    fn decodes_string_time_with_offset() {
        let mut d = CborLLDecoder::new();
        let mut bytes = vec![0xC0, 0x78, 0x19];
        bytes.extend_from_slice(b"2003-12-13T18:30:02+01:00");
        d.feed_payload(&bytes, true).unwrap();
        assert_eq!(d.current_value_type().unwrap(), ItemKind::Timestamp);
        assert_eq!(d.number().unwrap().as_i64(), Some(1071336602));
    }
}
