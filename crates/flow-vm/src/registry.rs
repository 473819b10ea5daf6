//! Opcode dispatch table.
//!
//! A 256-entry table of handler functions. Core opcodes are installed by
//! [`OpcodeRegistry::with_core_ops`]; modules claim contiguous ranges
//! above the core block through [`OpcodeRegistry::allocate_range`] so
//! extensions never collide. Construction is explicit — there is no
//! process-wide table and no static-initializer registration.

use flow_bytecode::{Cursor, Opcode, Result as BytecodeResult};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::handlers;
use crate::vm::{ExecContext, FlowVm};

/// An opcode handler. The cursor is positioned at the start of the
/// instruction's operand payload.
pub type OpcodeHandler =
    fn(&mut ExecContext<'_>, &mut FlowVm, &mut Cursor<'_>) -> BytecodeResult<()>;

fn noop(
    _ctx: &mut ExecContext<'_>,
    _vm: &mut FlowVm,
    _cursor: &mut Cursor<'_>,
) -> BytecodeResult<()> {
    Ok(())
}

/// A module's claimed opcode range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ModuleRange {
    first: u8,
    count: u8,
}

/// Maps each opcode byte to its handler.
pub struct OpcodeRegistry {
    table: [OpcodeHandler; 256],
    registered: [bool; 256],
    ranges: FxHashMap<String, ModuleRange>,
    next_module_opcode: u16,
}

impl OpcodeRegistry {
    /// An empty registry; every opcode dispatches to a no-op.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            table: [noop as OpcodeHandler; 256],
            registered: [false; 256],
            ranges: FxHashMap::default(),
            next_module_opcode: u16::from(Opcode::CORE_END),
        }
    }

    /// A registry with all core opcode handlers installed.
    #[must_use]
    pub fn with_core_ops() -> Self {
        let mut registry = Self::empty();
        handlers::install_core(&mut registry);
        registry
    }

    /// Install a handler for one opcode, replacing any previous one.
    pub fn register(&mut self, opcode: Opcode, handler: OpcodeHandler) {
        self.table[opcode.get() as usize] = handler;
        self.registered[opcode.get() as usize] = true;
    }

    /// The handler for an opcode. Unregistered opcodes dispatch to a
    /// no-op so a stray byte never aborts a flow.
    #[must_use]
    pub fn handler(&self, opcode: Opcode) -> OpcodeHandler {
        if !self.registered[opcode.get() as usize] {
            debug!(opcode = ?opcode, "dispatching unregistered opcode as no-op");
        }
        self.table[opcode.get() as usize]
    }

    /// Whether a handler is installed for an opcode.
    #[must_use]
    pub const fn is_registered(&self, opcode: Opcode) -> bool {
        self.registered[opcode.get() as usize]
    }

    /// Claim a contiguous range of `count` opcodes for a module.
    ///
    /// Returns the first opcode of the range, or `None` when the table is
    /// exhausted. Idempotent per module name: asking again with the same
    /// count returns the original range; a different count is refused.
    pub fn allocate_range(&mut self, module: &str, count: u8) -> Option<u8> {
        if count == 0 {
            return None;
        }
        if let Some(range) = self.ranges.get(module) {
            return (range.count == count).then_some(range.first);
        }
        let first = self.next_module_opcode;
        let end = first + u16::from(count);
        if end > 256 {
            return None;
        }
        self.next_module_opcode = end;
        self.ranges
            .insert(module.to_owned(), ModuleRange { first: first as u8, count });
        Some(first as u8)
    }

    /// Drop every module range and handler above the core block.
    ///
    /// Core handlers stay installed. Intended for test isolation.
    pub fn reset_modules(&mut self) {
        for index in Opcode::CORE_END as usize..256 {
            self.table[index] = noop;
            self.registered[index] = false;
        }
        self.ranges.clear();
        self.next_module_opcode = u16::from(Opcode::CORE_END);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_ops_installed() {
        let registry = OpcodeRegistry::with_core_ops();
        assert!(registry.is_registered(Opcode::WAIT_SECONDS));
        assert!(registry.is_registered(Opcode::FOR_EACH_TARGET));
        assert!(registry.is_registered(Opcode::END));
        assert!(!registry.is_registered(Opcode(Opcode::CORE_END)));
    }

    #[test]
    fn test_range_allocation_disjoint() {
        let mut registry = OpcodeRegistry::empty();
        let first = registry.allocate_range("combat-ext", 8).unwrap();
        let second = registry.allocate_range("movement-ext", 4).unwrap();
        assert_eq!(first, Opcode::CORE_END);
        assert_eq!(second, Opcode::CORE_END + 8);
    }

    #[test]
    fn test_range_allocation_idempotent() {
        let mut registry = OpcodeRegistry::empty();
        let first = registry.allocate_range("ext", 8).unwrap();
        assert_eq!(registry.allocate_range("ext", 8), Some(first));
        // Same module, different size: refused.
        assert_eq!(registry.allocate_range("ext", 16), None);
    }

    #[test]
    fn test_range_exhaustion() {
        let mut registry = OpcodeRegistry::empty();
        assert!(registry.allocate_range("big", 224).is_some());
        assert!(registry.allocate_range("one-more", 1).is_none());
    }

    #[test]
    fn test_reset_modules_keeps_core() {
        let mut registry = OpcodeRegistry::with_core_ops();
        let first = registry.allocate_range("ext", 2).unwrap();
        registry.register(Opcode(first), noop);
        registry.reset_modules();

        assert!(registry.is_registered(Opcode::END));
        assert!(!registry.is_registered(Opcode(first)));
        // The range is free again.
        assert_eq!(registry.allocate_range("other", 2), Some(Opcode::CORE_END));
    }
}
