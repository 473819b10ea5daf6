//! Bytecode encode/decode errors.

use thiserror::Error;

/// Errors from instruction encoding, decoding, or builder misuse.
#[derive(Error, Debug)]
pub enum BytecodeError {
    /// A read ran past the end of the buffer.
    #[error("unexpected end of bytecode: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// An operand payload exceeds the u16 size field.
    #[error("operand payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// A string operand exceeds the u16 length prefix.
    #[error("string too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },

    /// A string operand held invalid UTF-8.
    #[error("invalid UTF-8 in string operand")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// `for_each_target` while another loop is still open.
    /// The builder keeps a single patch slot; loops cannot nest.
    #[error("nested for-each loops are not supported")]
    NestedLoop,

    /// `end_for_each` with no open loop.
    #[error("end_for_each without a matching for_each_target")]
    UnmatchedLoopEnd,

    /// `finish` with a loop still open.
    #[error("program finished with an unclosed for-each loop")]
    UnclosedLoop,
}

/// Result alias for bytecode operations.
pub type Result<T> = std::result::Result<T, BytecodeError>;
