/***************************************************************************************************
 * Copyright (c) 2020-2022, Qualcomm Innovation Center, Inc. All rights reserved.
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
 * lwm2m_codec_core module definition
 *
 * Streaming, non-allocating serialization layer for LwM2M resource values: TLV, CBOR, SenML-CBOR,
 * LwM2M-CBOR, plain-text and link-format, behind a single dispatcher facade.
 **************************************************************************************************/

// Default configuration
#![no_std]
#![warn(missing_docs)]

//! # lwm2m_codec_core
//!
//! `lwm2m_codec_core` serializes and deserializes LwM2M resource values (OMA TS-1) across the
//! content formats a CoAP/LwM2M stack has to speak: OMA TLV, plain CBOR, SenML-CBOR (RFC 8428),
//! LwM2M-CBOR (nested CBOR maps), plain text, and RFC 6690 link-format for Register/Discover.
//!
//! This crate does not know about CoAP, sockets, observation, or the LwM2M object registry - it
//! only turns a stream of wire bytes into [`value::Entry`] values at a [`path::Path`], and back.
//! Every decoder is suspendable: `feed_payload`/`get_entry` return [`error::CoreError::WantMore`]
//! rather than blocking when the next chunk hasn't arrived yet, so it fits naturally into an
//! event-loop-driven CoAP stack with no threads, no allocator, and no heap.
//!
//! ## Layout
//!
//! - [`cbor_ll`] - low-level streaming CBOR codec (RFC 8949), the substrate everything else is
//!   built on.
//! - [`tlv`] - OMA LwM2M TLV binary encoding.
//! - [`senml`] - SenML-CBOR (RFC 8428 over CBOR).
//! - [`lwm2m_cbor`] - LwM2M-CBOR (nested maps keyed by numeric ids).
//! - [`cbor_single`] - one bare CBOR item, no container, for single-resource read/write.
//! - [`plaintext`] - the plain-text content format.
//! - [`linkformat`] - RFC 6690 link-format writer for Register/Discover.
//! - [`dispatcher`] - the tagged-enum facade ([`dispatcher::InputContext`] /
//!   [`dispatcher::OutputContext`]) that picks among the above by [`dispatcher::Format`].
//!
//! ## Example
//!
//! ```
//! use lwm2m_codec_core::dispatcher::{InputContext, Op, Format, OutputContext};
//! use lwm2m_codec_core::linkformat::LinkFormatOp;
//! use lwm2m_codec_core::output::OutputBuffer;
//! use lwm2m_codec_core::path::Path;
//! use lwm2m_codec_core::value::{Entry, ResourceValue, TypeMask};
//!
//! let base = Path::make(&[3, 3, 3]).unwrap();
//! let entry = Entry::new(base, ResourceValue::UInt(25));
//!
//! let mut out = OutputBuffer::new();
//! let mut enc = OutputContext::init(base, Format::Cbor, LinkFormatOp::Register, 1).unwrap();
//! enc.new_entry(&entry, &mut out).unwrap();
//!
//! let mut wire = [0u8; 8];
//! let n = out.get_payload(&mut wire).unwrap();
//!
//! let mut dec = InputContext::init(Op::Read, base, Format::Cbor).unwrap();
//! dec.feed(&wire[..n], true).unwrap();
//! let decoded = dec.get_entry(TypeMask(TypeMask::UINT)).unwrap();
//! assert_eq!(decoded.value, ResourceValue::UInt(25));
//! ```

// Pull in std if we are testing or if it is defined as feature (because we run tests on a
// platform supporting I/O and full feature set.
#[cfg(any(feature = "full", test))]
extern crate std;

// If we are really building no_std, pull in core as well. It is aliased as std so that "use"
// statements are always the same
#[cfg(all(not(feature = "std"), not(test)))]
extern crate core as std;

#[cfg(any(feature = "float", test))]
extern crate half;

#[cfg(any(feature = "full", test))]
extern crate chrono;

pub(crate) mod constants;
pub(crate) mod leaf;
pub(crate) mod utils;

/// Error type and `Result` alias shared by every codec in this crate.
pub mod error;

/// The hierarchical Object/Instance/Resource/Resource-Instance path model.
pub mod path;

/// The resource-value model ([`value::ResourceValue`], [`value::Entry`], [`value::TypeMask`])
/// every codec decodes into and encodes from.
pub mod value;

/// The chunked output-staging buffer every encoder drains into.
pub mod output;

/// Low-level streaming CBOR codec (RFC 8949).
pub mod cbor_ll;

/// OMA LwM2M TLV binary encoding.
pub mod tlv;

/// SenML-CBOR (RFC 8428 over CBOR).
pub mod senml;

/// LwM2M-CBOR: nested indefinite-length CBOR maps keyed by numeric path ids.
pub mod lwm2m_cbor;

/// A single bare CBOR item, for single-resource read/write with no surrounding container.
pub mod cbor_single;

/// The plain-text content format.
pub mod plaintext;

/// RFC 6690 link-format writer for Register and Discover responses.
pub mod linkformat;

/// The format-erased [`dispatcher::InputContext`]/[`dispatcher::OutputContext`] facade.
pub mod dispatcher;
