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
//! Output buffering shared by every encoder in this crate: a small staging area for the next
//! record's header bytes, plus a tail that is either an inline slice or an
//! [`ExternalDataProvider`] callback, pulled a caller-buffer's-worth at a time via
//! [`OutputBuffer::get_payload`].
use crate::error::Result;
use crate::value::ExternalDataProvider;

const STAGING_CAP: usize = 96;

/// Bound on a tail copied into the buffer's own storage (see [`Tail::Owned`]); sized to hold one
/// fully-assembled TLV container (see [`crate::tlv::encoder`]).
pub(crate) const OWNED_TAIL_CAP: usize = 512;

enum Tail<'src> {
    None,
    Inline(&'src [u8]),
    /// A tail copied into the buffer's own storage rather than borrowed from the caller -- used
    /// when the bytes being staged were assembled internally by an encoder (e.g. a closed TLV
    /// container) and don't live as long as `'src`.
    Owned {
        buf: [u8; OWNED_TAIL_CAP],
        len: usize,
    },
    External {
        provider: &'src mut dyn ExternalDataProvider,
        total_len: usize,
    },
}

/// Staged output for one record: a short header (always inline, bounded by `STAGING_CAP`) and
/// an optional tail of arbitrary length.
pub struct OutputBuffer<'src> {
    staging: [u8; STAGING_CAP],
    staging_len: usize,
    staging_pos: usize,
    tail: Tail<'src>,
    tail_offset: usize,
}

impl<'src> OutputBuffer<'src> {
    pub fn new() -> Self {
        OutputBuffer {
            staging: [0; STAGING_CAP],
            staging_len: 0,
            staging_pos: 0,
            tail: Tail::None,
            tail_offset: 0,
        }
    }

    /// Stage a record's header bytes (and clear any previous tail). `bytes.len()` must be
    /// `<= STAGING_CAP`.
    pub fn stage_header(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > STAGING_CAP {
            return Err(crate::error::CoreError::InputArgError);
        }
        self.staging[..bytes.len()].copy_from_slice(bytes);
        self.staging_len = bytes.len();
        self.staging_pos = 0;
        self.tail = Tail::None;
        self.tail_offset = 0;
        Ok(())
    }

    /// Append an inline byte/text tail after the currently-staged header.
    pub fn stage_inline_tail(&mut self, data: &'src [u8]) {
        self.tail = Tail::Inline(data);
        self.tail_offset = 0;
    }

    /// Append a tail by copying `data` into the buffer's own storage. Use this instead of
    /// [`Self::stage_inline_tail`] when `data` was assembled by the encoder itself (so it does
    /// not live for `'src`). `data.len()` must be `<= OWNED_TAIL_CAP`.
    pub fn stage_owned_tail(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > OWNED_TAIL_CAP {
            return Err(crate::error::CoreError::BufferTooShort);
        }
        let mut buf = [0u8; OWNED_TAIL_CAP];
        buf[..data.len()].copy_from_slice(data);
        self.tail = Tail::Owned {
            buf,
            len: data.len(),
        };
        self.tail_offset = 0;
        Ok(())
    }

    /// Append an externally-provided tail after the currently-staged header.
    pub fn stage_external_tail(&mut self, provider: &'src mut dyn ExternalDataProvider) {
        let total_len = provider.len();
        self.tail = Tail::External { provider, total_len };
        self.tail_offset = 0;
    }

    /// True while there is still header or tail data waiting to be copied out.
    pub fn has_more(&self) -> bool {
        self.staging_pos < self.staging_len || !matches!(self.tail, Tail::None)
    }

    /// Copy as much of the staged record as fits in `dst`, returning the number of bytes
    /// written. May return fewer bytes than `dst.len()` if the record is exhausted; callers
    /// distinguish "more to come" from "record done" via [`has_more`].
    pub fn get_payload(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        while written < dst.len() && self.staging_pos < self.staging_len {
            dst[written] = self.staging[self.staging_pos];
            written += 1;
            self.staging_pos += 1;
        }
        if written >= dst.len() {
            return Ok(written);
        }
        match &mut self.tail {
            Tail::None => {}
            Tail::Inline(data) => {
                let remaining = data.len() - self.tail_offset;
                let n = remaining.min(dst.len() - written);
                dst[written..written + n]
                    .copy_from_slice(&data[self.tail_offset..self.tail_offset + n]);
                self.tail_offset += n;
                written += n;
                if self.tail_offset >= data.len() {
                    self.tail = Tail::None;
                }
            }
            Tail::Owned { buf, len } => {
                let remaining = *len - self.tail_offset;
                let n = remaining.min(dst.len() - written);
                dst[written..written + n]
                    .copy_from_slice(&buf[self.tail_offset..self.tail_offset + n]);
                self.tail_offset += n;
                written += n;
                if self.tail_offset >= *len {
                    self.tail = Tail::None;
                }
            }
            Tail::External {
                provider,
                total_len,
            } => {
                let remaining = *total_len - self.tail_offset;
                let n = remaining.min(dst.len() - written);
                if n > 0 {
                    provider.fetch(&mut dst[written..written + n], self.tail_offset)?;
                }
                self.tail_offset += n;
                written += n;
                if self.tail_offset >= *total_len {
                    self.tail = Tail::None;
                }
            }
        }
        Ok(written)
    }
}

impl<'src> Default for OutputBuffer<'src> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_header_then_inline_tail_across_small_buffers() {
        let mut ob = OutputBuffer::new();
        ob.stage_header(&[0xC1, 0x05]).unwrap();
        ob.stage_inline_tail(b"hello");
        let mut out = [0u8; 0];
        let mut collected = alloc_vec();
        loop {
            let mut buf = [0u8; 3];
            let n = ob.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !ob.has_more() {
                break;
            }
        }
        let _ = out;
        assert_eq!(collected, b"\xC1\x05hello".to_vec());
    }

    #[test]
    fn drains_header_then_owned_tail() {
        let mut ob = OutputBuffer::new();
        ob.stage_header(&[0xC8, 0x03]).unwrap();
        ob.stage_owned_tail(b"abc").unwrap();
        let mut collected = alloc_vec();
        loop {
            let mut buf = [0u8; 2];
            let n = ob.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !ob.has_more() {
                break;
            }
        }
        assert_eq!(collected, b"\xC8\x03abc".to_vec());
    }

    fn alloc_vec() -> std::vec::Vec<u8> {
        std::vec::Vec::new()
    }
}
