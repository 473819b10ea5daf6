//! flow-vm - Register-based virtual machine for gameplay flows
//!
//! A flow is a short bytecode program bound to one unit: cast an
//! ability, wait, spawn a projectile, watch it, deal damage. Each active
//! flow runs on a pooled [`FlowVm`] that executes until an opcode
//! suspends it (timer or watched handle) and resumes on a later tick;
//! suspension is logical, nothing blocks the simulation thread.
//!
//! [`FlowWorld`] wires the collaborators together: the entity database,
//! the spatial grid, the opcode dispatch table, tag-keyed flow
//! definitions with hierarchical fallback, a program cache, and the VM
//! and buffer pools. Side effects leave through a [`Command`] buffer the
//! host drains after each tick.

mod cache;
mod command;
mod config;
mod definition;
mod error;
mod event;
mod handlers;
mod pool;
mod program;
mod register;
mod registry;
mod tag;
mod vm;
mod world;

pub use cache::ProgramCache;
pub use command::{Command, CommandBuffer};
pub use config::FlowConfig;
pub use definition::{DefinitionFn, DefinitionRegistry, FlowDefinition, FlowTuning};
pub use error::{FlowError, FlowResult};
pub use event::{GameplayEvent, SignalKind};
pub use pool::{BytecodePool, PoolStats, VmPool, VmSlot};
pub use program::Program;
pub use register::{REGISTER_COUNT, Register};
pub use registry::{OpcodeHandler, OpcodeRegistry};
pub use tag::FlowTag;
pub use vm::{ExecContext, FlowVm, VmState, WaitKind};
pub use world::FlowWorld;
