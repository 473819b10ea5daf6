//! flow-bytecode - Binary instruction encoding for gameplay flows
//!
//! The wire format is a packed little-endian stream of instructions:
//! a 4-byte header (`opcode: u8, flags: u8, data_size: u16`) followed by
//! exactly `data_size` bytes of opcode-specific operand data.
//!
//! Decoding goes through a bounds-checked [`Cursor`]; nothing in this
//! crate reinterprets raw bytes unchecked. Programs are authored through
//! the fluent [`ProgramBuilder`], which handles the two-pass forward
//! patch for `ForEachTarget`/`EndForEach` loop offsets.

mod builder;
mod cursor;
mod error;
mod instruction;
mod opcode;
mod operand;

pub use builder::ProgramBuilder;
pub use cursor::{Cursor, MAX_STRING_LEN, Writer};
pub use error::{BytecodeError, Result};
pub use instruction::InstructionHeader;
pub use opcode::Opcode;
pub use operand::{
    ApplyBurningOp, ApplyForceOp, AreaDamageOp, EndForEachOp, ForEachTargetOp, JumpOp,
    ModifyAttributeOp, MoveForwardOp, MoveToOp, PlayAnimationOp, QueryNearbyOp, SetDamageOp,
    SpawnEntityOp, WaitSecondsOp, WatchOp,
};
