//! The flow virtual machine.
//!
//! One `FlowVm` per active flow. Each tick the VM decodes and dispatches
//! instructions until an opcode blocks it, the program ends, or the step
//! budget runs out. Suspension is logical: state is retained across
//! ticks, nothing ever blocks the simulation thread.
//!
//! The VM never panics over bad data. A wrong register tag or stale
//! handle makes the opcode a silent no-op; a malformed instruction halts
//! the flow.

use std::sync::Arc;

use flow_bytecode::{Cursor, InstructionHeader};
use flow_db::{EntityDatabase, Generation, PlayerHandle, UnitHandle};
use flow_spatial::SpatialGrid;
use glam::Vec3;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::command::CommandBuffer;
use crate::event::SignalKind;
use crate::program::Program;
use crate::register::{REGISTER_COUNT, Register};
use crate::registry::OpcodeRegistry;

/// Upper bound on instructions executed in one tick; a program that
/// exceeds it is assumed to be jump-looping and is halted.
const STEP_BUDGET: usize = 4096;

/// Mutable simulation state handed to opcode handlers.
pub struct ExecContext<'a> {
    pub db: &'a mut EntityDatabase,
    pub spatial: &'a mut SpatialGrid,
    pub commands: &'a mut CommandBuffer,
    /// Signals raised by the host this tick.
    pub signals: &'a FxHashSet<(UnitHandle, SignalKind)>,
}

/// What a blocked-on-handle wait is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitKind {
    /// Resume only when the watched unit is destroyed.
    Destroyed,
    /// Resume on a collision signal, or when the unit is destroyed.
    Collision,
    /// Resume on an arrival signal, or when the unit is destroyed.
    Arrival,
    /// Resume on a custom host signal, or when the unit is destroyed.
    Signal,
}

impl WaitKind {
    /// The signal that releases this wait early, if any.
    #[must_use]
    pub const fn signal(self) -> Option<SignalKind> {
        match self {
            Self::Destroyed => None,
            Self::Collision => Some(SignalKind::Collision),
            Self::Arrival => Some(SignalKind::Arrival),
            Self::Signal => Some(SignalKind::Custom),
        }
    }
}

/// Execution state of one flow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VmState {
    Running,
    /// Counting down a fixed wait.
    BlockedOnTimer(f32),
    /// Polling a watched unit handle each tick.
    BlockedOnHandle {
        register: u8,
        kind: WaitKind,
        /// Most recent observed position of the watched unit. Written
        /// into the register when the unit disappears.
        last_position: Vec3,
    },
    Halted,
}

/// A single running flow: register file, program counter, owner handles,
/// and the bound program.
pub struct FlowVm {
    registers: [Register; REGISTER_COUNT],
    owner_unit: UnitHandle,
    owner_player: PlayerHandle,
    program: Option<Arc<Program>>,
    pc: usize,
    state: VmState,
    /// Iteration position of the single open for-each loop.
    loop_index: usize,
    /// Byte offset of the instruction currently being dispatched.
    instruction_start: usize,
    /// Set by jump/loop handlers; consumed by the decode loop.
    jump_target: Option<usize>,
}

impl Default for FlowVm {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowVm {
    /// An unbound, halted VM.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: std::array::from_fn(|_| Register::Empty),
            owner_unit: UnitHandle::new(u32::MAX, Generation::new()),
            owner_player: PlayerHandle::new(u32::MAX),
            program: None,
            pc: 0,
            state: VmState::Halted,
            loop_index: 0,
            instruction_start: 0,
            jump_target: None,
        }
    }

    /// Bind the VM to an owner and program, ready to run from the top.
    ///
    /// Register 0 is preloaded with the owner unit's current position.
    pub fn bind(
        &mut self,
        owner_unit: UnitHandle,
        owner_player: PlayerHandle,
        program: Arc<Program>,
        owner_position: Vec3,
    ) {
        self.reset();
        self.owner_unit = owner_unit;
        self.owner_player = owner_player;
        self.program = Some(program);
        self.registers[0] = Register::Vector(owner_position);
        self.state = VmState::Running;
    }

    /// Clear all state; the VM becomes an unbound pool resident again.
    pub fn reset(&mut self) {
        for register in &mut self.registers {
            *register = Register::Empty;
        }
        self.owner_unit = UnitHandle::new(u32::MAX, Generation::new());
        self.owner_player = PlayerHandle::new(u32::MAX);
        self.program = None;
        self.pc = 0;
        self.state = VmState::Halted;
        self.loop_index = 0;
        self.instruction_start = 0;
        self.jump_target = None;
    }

    /// Current execution state.
    #[must_use]
    pub const fn state(&self) -> VmState {
        self.state
    }

    /// Whether the flow has finished (or was never bound).
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        matches!(self.state, VmState::Halted)
    }

    /// The unit this flow is bound to.
    #[must_use]
    pub const fn owner_unit(&self) -> UnitHandle {
        self.owner_unit
    }

    /// The player controlling the owner unit.
    #[must_use]
    pub const fn owner_player(&self) -> PlayerHandle {
        self.owner_player
    }

    /// Read a register. Out-of-range indices read as `None`.
    #[must_use]
    pub fn register(&self, index: u8) -> Option<&Register> {
        self.registers.get(index as usize)
    }

    /// Write a register. Out-of-range indices are ignored.
    pub fn set_register(&mut self, index: u8, value: Register) {
        if let Some(slot) = self.registers.get_mut(index as usize) {
            *slot = value;
        } else {
            debug!(index, "register write out of range");
        }
    }

    /// Byte offset of the instruction currently being dispatched.
    #[must_use]
    pub const fn instruction_start(&self) -> usize {
        self.instruction_start
    }

    /// Redirect the program counter after the current instruction.
    pub fn request_jump(&mut self, target: usize) {
        self.jump_target = Some(target);
    }

    /// Halt the flow.
    pub fn halt(&mut self) {
        self.state = VmState::Halted;
    }

    /// Suspend on a countdown timer.
    pub fn block_on_timer(&mut self, seconds: f32) {
        self.state = VmState::BlockedOnTimer(seconds);
    }

    /// Suspend watching the unit handle held in `register`.
    pub fn block_on_handle(&mut self, register: u8, kind: WaitKind, last_position: Vec3) {
        self.state = VmState::BlockedOnHandle {
            register,
            kind,
            last_position,
        };
    }

    /// Current iteration index of the open for-each loop.
    #[must_use]
    pub const fn loop_index(&self) -> usize {
        self.loop_index
    }

    /// Step to the next loop element.
    pub fn advance_loop(&mut self) {
        self.loop_index += 1;
    }

    /// Reset iteration state when a loop completes.
    pub fn reset_loop(&mut self) {
        self.loop_index = 0;
    }

    /// Advance the flow by one simulation tick.
    pub fn tick(&mut self, ctx: &mut ExecContext<'_>, registry: &OpcodeRegistry, dt: f32) {
        match self.state {
            VmState::Halted => return,
            VmState::BlockedOnTimer(remaining) => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.state = VmState::BlockedOnTimer(remaining);
                    return;
                }
                self.state = VmState::Running;
            }
            VmState::BlockedOnHandle {
                register,
                kind,
                last_position,
            } => {
                if !self.poll_watched_handle(ctx, register, kind, last_position) {
                    return;
                }
            }
            VmState::Running => {}
        }
        self.run(ctx, registry);
    }

    /// Poll a blocked-on-handle wait. Returns true when the VM resumed.
    fn poll_watched_handle(
        &mut self,
        ctx: &mut ExecContext<'_>,
        register: u8,
        kind: WaitKind,
        last_position: Vec3,
    ) -> bool {
        let watched = self.register(register).and_then(Register::as_unit);
        match watched {
            Some(handle) if ctx.db.is_valid(handle) => {
                if kind
                    .signal()
                    .is_some_and(|signal| ctx.signals.contains(&(handle, signal)))
                {
                    self.state = VmState::Running;
                    return true;
                }
                // Still waiting: pull the unit's logical position from
                // its externally driven visual and keep the grid current.
                let position = ctx.db.sync_from_visual(handle).unwrap_or(last_position);
                ctx.spatial.update(handle, position);
                self.state = VmState::BlockedOnHandle {
                    register,
                    kind,
                    last_position: position,
                };
                false
            }
            Some(_) => {
                // The watched unit is gone; its last known position
                // replaces the stale handle.
                self.set_register(register, Register::Vector(last_position));
                self.state = VmState::Running;
                true
            }
            None => {
                // Register no longer holds a handle; nothing to watch.
                self.state = VmState::Running;
                true
            }
        }
    }

    /// Decode-dispatch loop; runs until blocked, halted, or out of budget.
    fn run(&mut self, ctx: &mut ExecContext<'_>, registry: &OpcodeRegistry) {
        let Some(program) = self.program.clone() else {
            self.state = VmState::Halted;
            return;
        };
        let bytes = program.bytes();
        let mut steps = 0usize;

        while matches!(self.state, VmState::Running) {
            if self.pc >= bytes.len() {
                self.state = VmState::Halted;
                break;
            }
            steps += 1;
            if steps > STEP_BUDGET {
                warn!(
                    tag = %program.tag(),
                    "flow exceeded {STEP_BUDGET} instructions in one tick; halting"
                );
                self.state = VmState::Halted;
                break;
            }

            let mut cursor = match Cursor::at(bytes, self.pc) {
                Ok(cursor) => cursor,
                Err(_) => {
                    self.state = VmState::Halted;
                    break;
                }
            };
            let header = match InstructionHeader::decode(&mut cursor) {
                Ok(header) => header,
                Err(err) => {
                    debug!(tag = %program.tag(), error = %err, "malformed instruction header");
                    self.state = VmState::Halted;
                    break;
                }
            };

            self.instruction_start = self.pc;
            let next_pc = self.pc + header.instruction_size();
            let handler = registry.handler(header.opcode);
            if let Err(err) = handler(ctx, self, &mut cursor) {
                debug!(
                    tag = %program.tag(),
                    opcode = ?header.opcode,
                    error = %err,
                    "malformed operand payload; halting flow"
                );
                self.state = VmState::Halted;
                break;
            }
            self.pc = self.jump_target.take().unwrap_or(next_pc);
        }
    }
}
