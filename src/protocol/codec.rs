//! MySQL wire protocol encoding and decoding primitives.
//!
//! MySQL uses little-endian fixed-width integers plus length-encoded
//! integers and strings.

use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

use crate::error::{Error, Result};

fn short_buffer(what: &str, have: usize, need: usize) -> Error {
    Error::Protocol(format!("{what}: buffer too short: {have} < {need}"))
}

/// Read 1-byte unsigned integer.
#[inline]
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&first, rest)) => Ok((first, rest)),
        None => Err(Error::Protocol("read_u8: empty buffer".into())),
    }
}

/// Read 2-byte little-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (value, rest) =
        U16LE::read_from_prefix(data).map_err(|_| short_buffer("read_u16", data.len(), 2))?;
    Ok((value.get(), rest))
}

/// Read 3-byte little-endian unsigned integer.
#[inline]
pub fn read_u24(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 3 {
        return Err(short_buffer("read_u24", data.len(), 3));
    }
    let value = u32::from(data[0]) | (u32::from(data[1]) << 8) | (u32::from(data[2]) << 16);
    Ok((value, &data[3..]))
}

/// Read 4-byte little-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (value, rest) =
        U32LE::read_from_prefix(data).map_err(|_| short_buffer("read_u32", data.len(), 4))?;
    Ok((value.get(), rest))
}

/// Read 8-byte little-endian unsigned integer.
#[inline]
pub fn read_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    let (value, rest) =
        U64LE::read_from_prefix(data).map_err(|_| short_buffer("read_u64", data.len(), 8))?;
    Ok((value.get(), rest))
}

/// Read fixed-length bytes.
#[inline]
pub fn read_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(short_buffer("read_bytes", data.len(), len));
    }
    Ok(data.split_at(len))
}

/// Read a length-encoded integer.
///
/// `0xfb` (NULL) and `0xff` (ERR) are not valid here; callers that accept
/// NULL check for it before calling.
#[inline]
pub fn read_lenenc_int(data: &[u8]) -> Result<(u64, &[u8])> {
    let (first, rest) = read_u8(data)?;
    match first {
        0x00..=0xfa => Ok((u64::from(first), rest)),
        0xfc => {
            let (value, rest) = read_u16(rest)?;
            Ok((u64::from(value), rest))
        }
        0xfd => {
            let (value, rest) = read_u24(rest)?;
            Ok((u64::from(value), rest))
        }
        0xfe => read_u64(rest),
        _ => Err(Error::Protocol(format!(
            "read_lenenc_int: invalid prefix 0x{first:02x}"
        ))),
    }
}

/// Read a length-encoded string.
#[inline]
pub fn read_lenenc_bytes(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_lenenc_int(data)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("read_lenenc_bytes: length {len} overflows")))?;
    read_bytes(rest, len)
}

/// Read a length-encoded string as &str.
#[inline]
pub fn read_lenenc_str(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_lenenc_bytes(data)?;
    let s = simdutf8::basic::from_utf8(bytes)
        .map_err(|_| Error::Protocol("read_lenenc_str: invalid UTF-8".into()))?;
    Ok((s, rest))
}

/// Write 1-byte unsigned integer.
#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian unsigned integer.
#[inline]
pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian unsigned integer.
#[inline]
pub fn write_u24(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 4-byte little-endian unsigned integer.
#[inline]
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian unsigned integer.
#[inline]
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write raw bytes.
#[inline]
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write a length-encoded integer.
pub fn write_lenenc_int(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfa => out.push(value as u8),
        0xfb..=0xffff => {
            out.push(0xfc);
            write_u16(out, value as u16);
        }
        0x1_0000..=0xff_ffff => {
            out.push(0xfd);
            write_u24(out, value as u32);
        }
        _ => {
            out.push(0xfe);
            write_u64(out, value);
        }
    }
}

/// Write a length-encoded string.
pub fn write_lenenc_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_lenenc_int(out, data.len() as u64);
    out.extend_from_slice(data);
}
