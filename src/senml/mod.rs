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
//! SenML-CBOR (RFC 8428 over CBOR): an outer array of "records" (CBOR maps), each naming a value
//! by an absolute or basename-relative path and carrying an optional timestamp. The record label
//! table this crate understands: `-3` base time, `-2` base name, `0` name, `2` numeric value,
//! `3` string value, `4` bool value, `6` time (delta from base time), `8` opaque (byte) value,
//! and the LwM2M extension label `"vlo"` (object-link value, `"oid:iid"`).
pub mod decoder;
pub mod encoder;

/// Longest formatted absolute path this crate's SenML layer will buffer (`/65534/65534/65534/65534`
/// is 24 bytes; this leaves headroom).
pub(crate) const MAX_PATH_STR: usize = 32;

pub(crate) const LABEL_BASETIME: i64 = -3;
pub(crate) const LABEL_BASENAME: i64 = -2;
pub(crate) const LABEL_NAME: i64 = 0;
pub(crate) const LABEL_VALUE: i64 = 2;
pub(crate) const LABEL_STRING_VALUE: i64 = 3;
pub(crate) const LABEL_BOOL_VALUE: i64 = 4;
pub(crate) const LABEL_TIME: i64 = 6;
pub(crate) const LABEL_OPAQUE_VALUE: i64 = 8;
pub(crate) const KEY_OBJLNK_VALUE: &str = "vlo";
