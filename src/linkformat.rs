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
//! Link-format (RFC 6690) writer for Register and Discover responses: `</o/i/r>;attr=value,...`.
//! There is no reader here - link-format is only ever produced by this core, never consumed by
//! it; a server parses Register payloads with its own CoRE-link library.
use crate::error::{CoreError, Result};
use crate::output::OutputBuffer;
use crate::path::{Path, PathKind};

/// Longest one entry's formatted bytes this writer buffers before handing it to [`OutputBuffer`].
const SCRATCH_CAP: usize = 160;

/// Which operation this writer is serving - gates which attributes are legal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkFormatOp {
    Register,
    Discover,
}

const OID_SECURITY: u16 = 0;
const OID_SERVER: u16 = 1;
const OID_OSCORE: u16 = 21;

/// Discover-only observation attributes (§4.10). Integer fields are written in decimal; `gt`/
/// `lt`/`st` are written with [`crate::utils::format_double_plain`] (shortest round-trip decimal,
/// no exponent).
#[derive(Copy, Clone, Debug, Default)]
pub struct DiscoverAttrs {
    pub pmin: Option<u32>,
    pub pmax: Option<u32>,
    pub gt: Option<f64>,
    pub lt: Option<f64>,
    pub st: Option<f64>,
    pub epmin: Option<u32>,
    pub epmax: Option<u32>,
    pub edge: Option<bool>,
    pub con: Option<bool>,
    pub hqmax: Option<u32>,
}

/// Attributes attached to one link-format entry. `ver` must match `\d+\.\d+`; `ssid`/`uri`/`dim`
/// are restricted to particular path kinds (see [`LinkFormatEncoder::new_entry`]); `discover` is
/// only legal with [`LinkFormatOp::Discover`].
#[derive(Copy, Clone, Debug, Default)]
pub struct LinkAttrs<'a> {
    pub dim: Option<u8>,
    pub ver: Option<&'a str>,
    pub ssid: Option<u16>,
    pub uri: Option<&'a str>,
    pub discover: Option<DiscoverAttrs>,
}

fn is_valid_ver(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    let start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == start || i >= bytes.len() || bytes[i] != b'.' {
        return false;
    }
    i += 1;
    let frac_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    i == bytes.len() && i > frac_start
}

/// Writes a sequence of link-format entries, enforcing strictly increasing paths and the
/// attribute-placement restrictions RFC 6690 plus the LwM2M TS layer on top of it.
pub struct LinkFormatEncoder {
    base: Path,
    op: LinkFormatOp,
    last: Option<Path>,
}

impl LinkFormatEncoder {
    pub fn new(base: Path, op: LinkFormatOp) -> Self {
        LinkFormatEncoder {
            base,
            op,
            last: None,
        }
    }

    fn write_uint_attr(scratch: &mut [u8; SCRATCH_CAP], pos: &mut usize, key: &str, v: u32) -> Result<()> {
        Self::write_str(scratch, pos, ";")?;
        Self::write_str(scratch, pos, key)?;
        Self::write_str(scratch, pos, "=")?;
        let n = crate::utils::write_u64_decimal(v as u64, &mut scratch[*pos..])?;
        *pos += n;
        Ok(())
    }

    fn write_double_attr(scratch: &mut [u8; SCRATCH_CAP], pos: &mut usize, key: &str, v: f64) -> Result<()> {
        Self::write_str(scratch, pos, ";")?;
        Self::write_str(scratch, pos, key)?;
        Self::write_str(scratch, pos, "=")?;
        let n = crate::utils::format_double_plain(v, &mut scratch[*pos..])?;
        *pos += n;
        Ok(())
    }

    fn write_bool_attr(scratch: &mut [u8; SCRATCH_CAP], pos: &mut usize, key: &str, v: bool) -> Result<()> {
        Self::write_str(scratch, pos, ";")?;
        Self::write_str(scratch, pos, key)?;
        Self::write_str(scratch, pos, "=")?;
        scratch[*pos] = if v { b'1' } else { b'0' };
        *pos += 1;
        Ok(())
    }

    fn write_str(scratch: &mut [u8; SCRATCH_CAP], pos: &mut usize, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        if *pos + bytes.len() > SCRATCH_CAP {
            return Err(CoreError::BufferTooShort);
        }
        scratch[*pos..*pos + bytes.len()].copy_from_slice(bytes);
        *pos += bytes.len();
        Ok(())
    }

    /// Append one link-format entry to `out`. Entries must be fed in strictly increasing path
    /// order relative to the previous call.
    pub fn new_entry<'buf>(
        &mut self,
        path: Path,
        attrs: &LinkAttrs<'_>,
        out: &mut OutputBuffer<'buf>,
    ) -> Result<()> {
        if path.outside_base(&self.base) {
            return Err(CoreError::InputArgError);
        }
        if let Some(prev) = self.last {
            if !Path::strictly_increasing(&prev, &path) {
                return Err(CoreError::InputArgError);
            }
        }

        let oid = path.oid();
        if self.op == LinkFormatOp::Register {
            if attrs.discover.is_some() {
                return Err(CoreError::InputArgError);
            }
            if oid == Some(OID_SECURITY) || oid == Some(OID_OSCORE) {
                return Err(CoreError::InputArgError);
            }
        }
        if attrs.ssid.is_some() && !matches!(oid, Some(OID_SECURITY) | Some(OID_SERVER) | Some(OID_OSCORE)) {
            return Err(CoreError::InputArgError);
        }
        if attrs.uri.is_some() && oid != Some(OID_SECURITY) {
            return Err(CoreError::InputArgError);
        }
        if attrs.ver.is_some() && path.kind() != PathKind::Object {
            return Err(CoreError::InputArgError);
        }
        if let Some(ver) = attrs.ver {
            if !is_valid_ver(ver) {
                return Err(CoreError::InputArgError);
            }
        }
        if attrs.dim.is_some() && path.kind() != PathKind::Resource {
            return Err(CoreError::InputArgError);
        }

        let mut scratch = [0u8; SCRATCH_CAP];
        let mut pos = 0usize;

        if self.last.is_some() {
            Self::write_str(&mut scratch, &mut pos, ",")?;
        }
        Self::write_str(&mut scratch, &mut pos, "<")?;
        let mut path_buf = [0u8; 32];
        let plen = crate::utils::format_path(&path, &mut path_buf)?;
        let path_str = core::str::from_utf8(&path_buf[..plen]).map_err(|_| CoreError::FormatError)?;
        Self::write_str(&mut scratch, &mut pos, path_str)?;
        Self::write_str(&mut scratch, &mut pos, ">")?;

        if let Some(dim) = attrs.dim {
            Self::write_uint_attr(&mut scratch, &mut pos, "dim", dim as u32)?;
        }
        if let Some(ver) = attrs.ver {
            Self::write_str(&mut scratch, &mut pos, ";ver=")?;
            Self::write_str(&mut scratch, &mut pos, ver)?;
        }
        if let Some(ssid) = attrs.ssid {
            Self::write_uint_attr(&mut scratch, &mut pos, "ssid", ssid as u32)?;
        }
        if let Some(uri) = attrs.uri {
            Self::write_str(&mut scratch, &mut pos, ";uri=\"")?;
            Self::write_str(&mut scratch, &mut pos, uri)?;
            Self::write_str(&mut scratch, &mut pos, "\"")?;
        }
        if let Some(d) = attrs.discover {
            if self.op != LinkFormatOp::Discover {
                return Err(CoreError::InputArgError);
            }
            if let Some(v) = d.pmin {
                Self::write_uint_attr(&mut scratch, &mut pos, "pmin", v)?;
            }
            if let Some(v) = d.pmax {
                Self::write_uint_attr(&mut scratch, &mut pos, "pmax", v)?;
            }
            if let Some(v) = d.gt {
                Self::write_double_attr(&mut scratch, &mut pos, "gt", v)?;
            }
            if let Some(v) = d.lt {
                Self::write_double_attr(&mut scratch, &mut pos, "lt", v)?;
            }
            if let Some(v) = d.st {
                Self::write_double_attr(&mut scratch, &mut pos, "st", v)?;
            }
            if let Some(v) = d.epmin {
                Self::write_uint_attr(&mut scratch, &mut pos, "epmin", v)?;
            }
            if let Some(v) = d.epmax {
                Self::write_uint_attr(&mut scratch, &mut pos, "epmax", v)?;
            }
            if let Some(v) = d.edge {
                Self::write_bool_attr(&mut scratch, &mut pos, "edge", v)?;
            }
            if let Some(v) = d.con {
                Self::write_bool_attr(&mut scratch, &mut pos, "con", v)?;
            }
            if let Some(v) = d.hqmax {
                Self::write_uint_attr(&mut scratch, &mut pos, "hqmax", v)?;
            }
        }

        out.stage_owned_tail(&scratch[..pos])?;
        self.last = Some(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(out: &mut OutputBuffer) -> std::string::String {
        let mut collected = std::vec::Vec::new();
        loop {
            let mut buf = [0u8; 16];
            let n = out.get_payload(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if !out.has_more() {
                break;
            }
        }
        std::string::String::from_utf8(collected).unwrap()
    }

    #[test]
    fn writes_resource_entry_with_dim_and_ver() {
        let mut enc = LinkFormatEncoder::new(Path::ROOT, LinkFormatOp::Register);
        let mut out = OutputBuffer::new();
        let attrs = LinkAttrs {
            dim: Some(3),
            ..Default::default()
        };
        enc.new_entry(Path::make(&[3, 0, 7]).unwrap(), &attrs, &mut out)
            .unwrap();
        assert_eq!(drain(&mut out), "</3/0/7>;dim=3");
    }

    #[test]
    fn second_entry_is_comma_separated() {
        let mut enc = LinkFormatEncoder::new(Path::ROOT, LinkFormatOp::Register);
        let mut out = OutputBuffer::new();
        enc.new_entry(Path::make(&[1]).unwrap(), &LinkAttrs::default(), &mut out)
            .unwrap();
        let _ = drain(&mut out);
        enc.new_entry(Path::make(&[3]).unwrap(), &LinkAttrs::default(), &mut out)
            .unwrap();
        assert_eq!(drain(&mut out), ",</3>");
    }

    #[test]
    fn register_rejects_security_object() {
        let mut enc = LinkFormatEncoder::new(Path::ROOT, LinkFormatOp::Register);
        let mut out = OutputBuffer::new();
        assert_eq!(
            enc.new_entry(Path::make(&[0, 0]).unwrap(), &LinkAttrs::default(), &mut out),
            Err(CoreError::InputArgError)
        );
    }

    #[test]
    fn ssid_rejected_off_security_server_oscore() {
        let mut enc = LinkFormatEncoder::new(Path::ROOT, LinkFormatOp::Register);
        let mut out = OutputBuffer::new();
        let attrs = LinkAttrs {
            ssid: Some(42),
            ..Default::default()
        };
        assert_eq!(
            enc.new_entry(Path::make(&[3, 0]).unwrap(), &attrs, &mut out),
            Err(CoreError::InputArgError)
        );
    }

    #[test]
    fn ver_must_match_digits_dot_digits() {
        let mut enc = LinkFormatEncoder::new(Path::ROOT, LinkFormatOp::Register);
        let mut out = OutputBuffer::new();
        let attrs = LinkAttrs {
            ver: Some("v1"),
            ..Default::default()
        };
        assert_eq!(
            enc.new_entry(Path::make(&[3]).unwrap(), &attrs, &mut out),
            Err(CoreError::InputArgError)
        );
    }

    #[test]
    fn discover_emits_typed_attributes() {
        let mut enc = LinkFormatEncoder::new(Path::ROOT, LinkFormatOp::Discover);
        let mut out = OutputBuffer::new();
        let attrs = LinkAttrs {
            discover: Some(DiscoverAttrs {
                pmin: Some(5),
                gt: Some(1.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        enc.new_entry(Path::make(&[3, 0, 1]).unwrap(), &attrs, &mut out)
            .unwrap();
        assert_eq!(drain(&mut out), "</3/0/1>;pmin=5;gt=1.5");
    }
}
