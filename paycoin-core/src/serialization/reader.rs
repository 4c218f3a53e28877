//! Cursor-based decoder over a shared byte buffer.

use bytes::Bytes;

use crate::crypto::Sha256Hash;
use crate::error::{CodecError, Result};
use crate::serialization::varint::decode_varint;

/// Reads little-endian wire fields from a [`Bytes`] buffer.
///
/// Slices handed out by [`ByteReader::read_bytes`] share the underlying
/// allocation, so nodes built from one payload never copy it.
#[derive(Debug, Clone)]
pub struct ByteReader {
    buf: Bytes,
    cursor: usize,
}

impl ByteReader {
    /// Creates a reader positioned at the start of `buf`.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into(), cursor: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(CodecError::BufferUnderrun {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.buf[start..self.cursor])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a big-endian u16 (used only for peer address ports).
    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Reads a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian i32.
    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian i64.
    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Reads a canonical varint.
    pub fn read_var_int(&mut self) -> Result<u64> {
        let (value, used) = decode_varint(&self.buf[self.cursor..])?;
        self.cursor += used;
        Ok(value)
    }

    /// Reads a varint element count and rejects counts that could not fit
    /// in the remaining bytes at `min_item_size` bytes each.
    pub fn read_count(&mut self, min_item_size: usize, what: &str) -> Result<usize> {
        let count = self.read_var_int()?;
        let max = (self.remaining() / min_item_size.max(1)) as u64;
        if count > max {
            return Err(CodecError::violation(format!(
                "implausible {} count {} with {} bytes left",
                what,
                count,
                self.remaining()
            )));
        }
        Ok(count as usize)
    }

    /// Reads `n` bytes as a shared slice of the underlying buffer.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        if self.remaining() < n {
            return Err(CodecError::BufferUnderrun {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = self.buf.slice(self.cursor..self.cursor + n);
        self.cursor += n;
        Ok(slice)
    }

    /// Reads a varint-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_var_int()?;
        let len = usize::try_from(len)
            .map_err(|_| CodecError::violation(format!("byte string length {} too large", len)))?;
        self.read_bytes(len)
    }

    /// Reads a varint-prefixed string, replacing invalid UTF-8.
    pub fn read_var_str(&mut self) -> Result<String> {
        let bytes = self.read_var_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads a 32-byte hash in wire order.
    pub fn read_hash(&mut self) -> Result<Sha256Hash> {
        Ok(Sha256Hash(self.read_array()?))
    }

    /// Reads a fixed-size array.
    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.read_array()
    }

    /// Advances the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Advances past a varint-prefixed byte string.
    pub fn skip_var_bytes(&mut self) -> Result<()> {
        self.read_var_bytes().map(|_| ())
    }

    /// The unread bytes, without advancing.
    pub fn rest(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    /// Shared slice from `start` up to the cursor.
    pub fn slice_from(&self, start: usize) -> Bytes {
        self.buf.slice(start..self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_read_fixed_width() {
        let mut reader = ByteReader::new(Bytes::from_static(&hex!(
            "01000000 aa3d0b54 ffffffffffffffff 208d"
        )));
        assert_eq!(reader.read_u32_le().unwrap(), 1);
        assert_eq!(reader.read_u32_le().unwrap(), 0x540b3daa);
        assert_eq!(reader.read_i64_le().unwrap(), -1);
        assert_eq!(reader.read_u16_be().unwrap(), 8333);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_underrun_does_not_advance() {
        let mut reader = ByteReader::new(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(
            reader.read_u32_le(),
            Err(CodecError::BufferUnderrun { needed: 4, remaining: 3 })
        );
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_var_bytes_shares_buffer() {
        let buf = Bytes::from_static(&hex!("03 aabbcc 00"));
        let mut reader = ByteReader::new(buf.clone());
        let script = reader.read_var_bytes().unwrap();
        assert_eq!(&script[..], &hex!("aabbcc"));
        assert_eq!(script.as_ptr(), buf[1..].as_ptr());
        assert_eq!(reader.read_var_bytes().unwrap().len(), 0);
    }

    #[test]
    fn test_read_var_bytes_truncated() {
        let mut reader = ByteReader::new(Bytes::from_static(&hex!("05 aabb")));
        assert_eq!(
            reader.read_var_bytes(),
            Err(CodecError::BufferUnderrun { needed: 5, remaining: 2 })
        );
    }

    #[test]
    fn test_read_count_plausibility() {
        let mut reader = ByteReader::new(Bytes::from_static(&hex!("fd e803 000000")));
        assert!(matches!(
            reader.read_count(41, "input"),
            Err(CodecError::ProtocolViolation(_))
        ));

        let mut reader = ByteReader::new(Bytes::from_static(&hex!("02 0000")));
        assert_eq!(reader.read_count(1, "byte").unwrap(), 2);
    }

    #[test]
    fn test_slice_from() {
        let mut reader = ByteReader::new(Bytes::from_static(b"paycoin"));
        reader.skip(3).unwrap();
        let start = reader.position();
        reader.skip(4).unwrap();
        assert_eq!(&reader.slice_from(start)[..], b"coin");
    }

    #[test]
    fn test_rest_does_not_advance() {
        let mut reader = ByteReader::new(Bytes::from_static(b"paycoin"));
        reader.skip(3).unwrap();
        assert_eq!(reader.rest(), b"coin");
        assert_eq!(reader.position(), 3);
    }
}
