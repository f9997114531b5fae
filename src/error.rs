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
 * lwm2m_codec_core error API
 *
 * A single error enum shared by the CBOR low-level codec, the TLV codec, and the higher-level
 * SenML-CBOR / LwM2M-CBOR / link-format layers built on top of them.
 **************************************************************************************************/
use core::result;

#[cfg(any(feature = "full", test))]
use thiserror::Error;

/// An alias for `Result<T, CoreError>` used throughout this crate.
pub type Result<T> = result::Result<T, CoreError>;

/// `CoreError` is returned by every fallible entry point in this crate. It distinguishes hard
/// failures (which poison the owning context - only `destroy` is legal afterwards) from the
/// soft "try again" signals `WantMore` and `WantTypeDisambiguation`, and from the terminal
/// (non-error) `Eof` signal. The encoder side has no error-typed suspension signal of its own:
/// `OutputBuffer::get_payload` always succeeds with a possibly-short write, and callers poll
/// `OutputBuffer::has_more` to know whether to call again.
#[cfg_attr(any(feature = "full", test), derive(Copy, Clone, Error, Debug, PartialEq))]
#[cfg_attr(all(not(feature = "full"), not(test)), derive(Copy, Clone, Debug, PartialEq))]
pub enum CoreError {
    /// The wire bytes seen so far violate the format being decoded (bad header, oversize
    /// integer, inconsistent container length, malformed date, path outside base, ...).
    #[cfg_attr(any(feature = "full", test), error("malformed input for the active wire format"))]
    FormatError,
    /// The caller misused the API: fed a new payload before the previous one was fully
    /// consumed, called `get_entry` after `Eof`, left an opened aggregate empty, or similar.
    #[cfg_attr(any(feature = "full", test), error("context used out of its valid sequence"))]
    LogicError,
    /// An argument passed to an entry point was invalid for the requested operation.
    #[cfg_attr(any(feature = "full", test), error("invalid argument for this operation"))]
    InputArgError,
    /// The decoder needs more input before it can produce the next item. Not a failure: feed
    /// another chunk (or the same chunk with `is_last = true` if none remains) and retry.
    #[cfg_attr(any(feature = "full", test), error("decoder suspended - more input required"))]
    WantMore,
    /// The caller's type mask still matches more than one CBOR/TLV numeric kind; narrow the
    /// mask using the returned path and retry the same entry.
    #[cfg_attr(
        any(feature = "full", test),
        error("ambiguous type - narrow the type mask and retry")
    )]
    WantTypeDisambiguation,
    /// All entries have been delivered; any further `get_entry`/`get_payload` call is a logic
    /// error.
    #[cfg_attr(any(feature = "full", test), error("end of entries reached"))]
    Eof,
    /// The plaintext decoder's input fragment does not fit in the caller-provided buffer.
    #[cfg_attr(any(feature = "full", test), error("caller buffer too short for this fragment"))]
    BufferTooShort,
}

impl CoreError {
    /// True for the non-terminal "try again" signals that are not really errors.
    pub fn is_suspension(&self) -> bool {
        matches!(
            self,
            CoreError::WantMore | CoreError::WantTypeDisambiguation
        )
    }
}
