//! Sequential little-endian byte reader and writer.
//!
//! The reader only moves forward. Every read checks the remaining length first
//! so that a short input surfaces as [`GzipError::TruncatedInput`] with the
//! offending offset rather than a bare I/O error.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{GzipError, Result};

/// Forward-only reader over an in-memory buffer.
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Create a reader positioned at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        let mut cursor = Cursor::new(data);
        cursor.set_position(offset as u64);
        Self { cursor }
    }

    pub fn data(&self) -> &'a [u8] {
        *self.cursor.get_ref()
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.data().len().saturating_sub(self.position())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Everything from the current position to the end.
    pub fn rest(&self) -> &'a [u8] {
        let data = self.data();
        &data[self.position().min(data.len())..]
    }

    /// Bytes between `start` and the current position.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data()[start..self.position()]
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if available < needed {
            return Err(GzipError::TruncatedInput {
                offset: self.position(),
                needed,
                available,
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.cursor.read_u8()?)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.cursor.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    /// Read exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let start = self.position();
        let bytes = &self.data()[start..start + n];
        self.cursor.set_position((start + n) as u64);
        Ok(bytes)
    }

    /// Read up to a NUL terminator; the terminator is consumed but not returned.
    pub fn read_cstring(&mut self) -> Result<&'a [u8]> {
        let rest = self.rest();
        match rest.iter().position(|&b| b == 0) {
            Some(len) => {
                let bytes = &rest[..len];
                self.cursor.set_position((self.position() + len + 1) as u64);
                Ok(bytes)
            }
            None => Err(GzipError::TruncatedInput {
                offset: self.position(),
                needed: rest.len() + 1,
                available: rest.len(),
            }),
        }
    }

    /// Move forward `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }
}

/// Append-only writer producing little-endian output.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue writing after existing bytes.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes written since position `start`.
    pub fn written_since(&self, start: usize) -> &[u8] {
        &self.buf[start..]
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write `bytes` followed by a NUL terminator. Callers guarantee `bytes`
    /// holds no NUL.
    pub fn write_cstring(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_integers() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0x1234_5678);
        assert!(reader.is_empty());
    }

    #[test]
    fn short_read_reports_position() {
        let data = [0xaa, 0xbb, 0xcc];
        let mut reader = ByteReader::new(&data);
        reader.read_u16_le().unwrap();
        let err = reader.read_u32_le().unwrap_err();
        assert!(matches!(
            err,
            GzipError::TruncatedInput {
                offset: 2,
                needed: 4,
                available: 1
            }
        ));
        // A failed read does not move the cursor.
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn cstring_consumes_terminator() {
        let data = b"name\0rest";
        let mut reader = ByteReader::new(data);
        assert_eq!(reader.read_cstring().unwrap(), b"name");
        assert_eq!(reader.position(), 5);
        assert_eq!(reader.rest(), b"rest");
    }

    #[test]
    fn unterminated_cstring_is_truncated() {
        let mut reader = ByteReader::new(b"abc");
        assert!(matches!(
            reader.read_cstring(),
            Err(GzipError::TruncatedInput { needed: 4, available: 3, .. })
        ));
    }

    #[test]
    fn reader_starts_at_offset() {
        let data = [0u8, 0, 9, 8];
        let mut reader = ByteReader::at(&data, 2);
        assert_eq!(reader.read_bytes(2).unwrap(), &[9, 8]);
        assert_eq!(reader.consumed_since(2), &[9, 8]);
    }

    #[test]
    fn writer_mirrors_reader() {
        let mut writer = ByteWriter::new();
        writer.write_u8(7);
        writer.write_u16_le(0xbeef);
        writer.write_u32_le(0xdead_beef);
        writer.write_cstring(b"hi");
        writer.write_bytes(&[1, 2]);
        let bytes = writer.into_inner();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16_le().unwrap(), 0xbeef);
        assert_eq!(reader.read_u32_le().unwrap(), 0xdead_beef);
        assert_eq!(reader.read_cstring().unwrap(), b"hi");
        assert_eq!(reader.read_bytes(2).unwrap(), &[1, 2]);
    }
}
