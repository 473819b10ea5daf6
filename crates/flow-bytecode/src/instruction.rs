//! Fixed-format instruction header.
//!
//! Wire layout (little-endian, packed, 4 bytes):
//! `opcode: u8, flags: u8, data_size: u16`, followed immediately by
//! `data_size` bytes of opcode-specific operand data.

use crate::cursor::{Cursor, Writer};
use crate::error::{BytecodeError, Result};
use crate::opcode::Opcode;

/// Decoded instruction header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstructionHeader {
    pub opcode: Opcode,
    /// Reserved; unused by core opcodes.
    pub flags: u8,
    /// Exact byte length of the operand payload.
    pub data_size: u16,
}

impl InstructionHeader {
    /// Encoded header size in bytes.
    pub const SIZE: usize = 4;

    /// Create a header with zeroed flags.
    #[must_use]
    pub const fn new(opcode: Opcode, data_size: u16) -> Self {
        Self {
            opcode,
            flags: 0,
            data_size,
        }
    }

    /// Append the header to a writer.
    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u8(self.opcode.get());
        writer.write_u8(self.flags);
        writer.write_u16(self.data_size);
    }

    /// Decode a header and validate that its payload fits the buffer.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let opcode = Opcode(cursor.read_u8()?);
        let flags = cursor.read_u8()?;
        let data_size = cursor.read_u16()?;
        if (data_size as usize) > cursor.remaining() {
            return Err(BytecodeError::UnexpectedEof {
                needed: data_size as usize,
                remaining: cursor.remaining(),
            });
        }
        Ok(Self {
            opcode,
            flags,
            data_size,
        })
    }

    /// Total encoded size of the instruction, header plus payload.
    #[must_use]
    pub const fn instruction_size(&self) -> usize {
        Self::SIZE + self.data_size as usize
    }
}
