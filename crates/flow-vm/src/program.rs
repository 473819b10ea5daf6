//! Immutable compiled programs.

use flow_bytecode::{Cursor, InstructionHeader, Result as BytecodeResult};

use crate::tag::FlowTag;

/// A compiled instruction buffer for one event tag.
///
/// Owned by the program cache and shared with VMs as `Arc<Program>`;
/// nothing mutates it after construction.
#[derive(Debug)]
pub struct Program {
    tag: FlowTag,
    bytes: Box<[u8]>,
}

impl Program {
    /// Freeze a built byte stream into a program.
    #[must_use]
    pub fn new(tag: FlowTag, bytes: &[u8]) -> Self {
        Self {
            tag,
            bytes: bytes.into(),
        }
    }

    /// The event tag this program was built for.
    #[must_use]
    pub const fn tag(&self) -> &FlowTag {
        &self.tag
    }

    /// The raw instruction stream.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte length of the instruction stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the program contains no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Walk the instruction headers, skipping payloads.
    ///
    /// Backs the pre-trigger handler check and tooling; execution
    /// decodes lazily instead.
    pub fn headers(&self) -> impl Iterator<Item = BytecodeResult<InstructionHeader>> + '_ {
        let mut cursor = Cursor::new(&self.bytes);
        let mut failed = false;
        std::iter::from_fn(move || {
            if failed || cursor.is_at_end() {
                return None;
            }
            let result = InstructionHeader::decode(&mut cursor).and_then(|header| {
                cursor.skip(header.data_size as usize)?;
                Ok(header)
            });
            failed = result.is_err();
            Some(result)
        })
    }

    /// Number of decodable instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.headers().take_while(Result::is_ok).count()
    }
}
