//! Bounds-checked byte cursor and growable writer.
//!
//! Every read validates the requested length against the remaining
//! buffer before touching it. Bytecode is self-generated, so a failure
//! here means a builder bug, not hostile input; the VM halts the flow
//! rather than surfacing the error.

use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;

use crate::error::{BytecodeError, Result};

/// Maximum encodable string length.
///
/// Leaves room in the u16 `data_size` header for the 2-byte length
/// prefix and a trailing register operand, so a maximum-length string
/// still produces a representable payload.
pub const MAX_STRING_LEN: usize = u16::MAX as usize - 3;

/// A reading cursor over a byte slice.
#[derive(Debug)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Start reading at the beginning of a slice.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Start reading at a byte offset. Fails if the offset is outside
    /// the buffer.
    pub fn at(bytes: &'a [u8], pos: usize) -> Result<Self> {
        if pos > bytes.len() {
            return Err(BytecodeError::UnexpectedEof {
                needed: pos,
                remaining: bytes.len(),
            });
        }
        Ok(Self { bytes, pos })
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether the cursor has consumed the whole buffer.
    #[must_use]
    pub const fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(BytecodeError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Vec3::new(x, y, z))
    }

    /// Read a u16-length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<&'a str> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)?)
    }
}

/// A growable little-endian byte writer.
///
/// Wraps a plain `Vec<u8>` so compilation buffers can be pooled and
/// recycled; `into_bytes` hands the vector back.
#[derive(Debug, Default)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    /// Start with an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Reuse an existing buffer, clearing any previous contents.
    #[must_use]
    pub fn with_buffer(mut bytes: Vec<u8>) -> Self {
        bytes.clear();
        Self { bytes }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// View the written bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the underlying buffer back.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    /// Write a u16-length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        if value.len() > MAX_STRING_LEN {
            return Err(BytecodeError::StringTooLong {
                len: value.len(),
                max: MAX_STRING_LEN,
            });
        }
        self.write_u16(value.len() as u16);
        self.bytes.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Overwrite a previously written i32 in place.
    ///
    /// Used by the builder's forward-jump patch; the offset must point at
    /// four bytes already written.
    pub fn patch_i32(&mut self, offset: usize, value: i32) -> Result<()> {
        if offset + 4 > self.bytes.len() {
            return Err(BytecodeError::UnexpectedEof {
                needed: offset + 4,
                remaining: self.bytes.len(),
            });
        }
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let mut writer = Writer::new();
        writer.write_u8(0xAB);
        writer.write_u16(0x1234);
        writer.write_i32(-77);
        writer.write_f32(1.5);
        writer.write_vec3(Vec3::new(1.0, 2.0, 3.0));

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_u8().unwrap(), 0xAB);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_i32().unwrap(), -77);
        assert_eq!(cursor.read_f32().unwrap(), 1.5);
        assert_eq!(cursor.read_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut writer = Writer::new();
        writer.write_u16(0x0102);
        assert_eq!(writer.as_bytes(), &[0x02, 0x01]);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut writer = Writer::new();
        writer.write_str("fireball.cast").unwrap();
        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_str().unwrap(), "fireball.cast");
    }

    #[test]
    fn test_eof_detected() {
        let bytes = [1u8, 2];
        let mut cursor = Cursor::new(&bytes);
        assert!(matches!(
            cursor.read_i32(),
            Err(BytecodeError::UnexpectedEof {
                needed: 4,
                remaining: 2
            })
        ));
    }

    #[test]
    fn test_patch_i32() {
        let mut writer = Writer::new();
        writer.write_i32(0);
        writer.write_u8(9);
        writer.patch_i32(0, 42).unwrap();

        let bytes = writer.into_bytes();
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_i32().unwrap(), 42);
        assert_eq!(cursor.read_u8().unwrap(), 9);
    }
}
