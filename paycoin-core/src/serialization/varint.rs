//! Variable-length integer encoding
//!
//! Counts and byte-string lengths on the wire use a 1, 3, 5 or 9 byte
//! self-describing encoding:
//! - value < 0xfd: single byte
//! - value <= 0xffff: 0xfd prefix + 2 bytes little-endian
//! - value <= 0xffffffff: 0xfe prefix + 4 bytes little-endian
//! - otherwise: 0xff prefix + 8 bytes little-endian
//!
//! Only the shortest form is accepted when decoding, so a decoded value
//! always re-encodes to the bytes it came from.

use crate::error::{CodecError, Result};

/// Number of bytes `value` occupies once encoded.
pub fn varint_size(value: u64) -> usize {
    if value < 0xfd {
        1
    } else if value <= 0xffff {
        3
    } else if value <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Appends the encoding of `value` to `out`.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Encodes `value` into a fresh buffer.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_size(value));
    write_varint(&mut out, value);
    out
}

/// Appends `bytes` prefixed with its varint length.
pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Encoded size of a varint-prefixed byte string.
pub fn var_bytes_size(len: usize) -> usize {
    varint_size(len as u64) + len
}

/// Decodes a varint from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let first = *data
        .first()
        .ok_or(CodecError::BufferUnderrun { needed: 1, remaining: 0 })?;

    let width = match first {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        b => return Ok((b as u64, 1)),
    };
    let body = data.get(1..1 + width).ok_or(CodecError::BufferUnderrun {
        needed: width,
        remaining: data.len() - 1,
    })?;

    let mut le = [0u8; 8];
    le[..width].copy_from_slice(body);
    let value = u64::from_le_bytes(le);

    if varint_size(value) != 1 + width {
        return Err(CodecError::violation(format!(
            "non-canonical varint: {} encoded in {} bytes",
            value,
            1 + width
        )));
    }
    Ok((value, 1 + width))
}
