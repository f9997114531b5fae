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
//! OMA LwM2M TLV binary encoding: a 4-level hierarchical Tag-Length-Value format.
//!
//! The type field's top two bits select an id-kind: Instance (0), Resource-Instance (1),
//! multiple-Resource i.e. an array of resource instances (2), or plain Resource (3). Per this
//! crate's model, Resource and Resource-Instance entries are always leaves; Instance and
//! multiple-Resource entries are always containers (see [`decoder::TlvDecoder`]).
pub mod decoder;
pub mod encoder;

/// Upper bound on TLV container nesting (Object -> Instance -> multiple-Resource).
pub const MAX_TLV_DEPTH: usize = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum IdKind {
    Instance,
    ResourceInstance,
    MultiResource,
    Resource,
}

impl IdKind {
    pub(crate) fn from_bits(bits: u8) -> IdKind {
        match bits {
            0 => IdKind::Instance,
            1 => IdKind::ResourceInstance,
            2 => IdKind::MultiResource,
            _ => IdKind::Resource,
        }
    }

    pub(crate) fn to_bits(self) -> u8 {
        match self {
            IdKind::Instance => 0,
            IdKind::ResourceInstance => 1,
            IdKind::MultiResource => 2,
            IdKind::Resource => 3,
        }
    }

    pub(crate) fn is_leaf(self) -> bool {
        matches!(self, IdKind::Resource | IdKind::ResourceInstance)
    }
}
