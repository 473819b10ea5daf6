//! The flow world: every collaborator wired together, no globals.
//!
//! `FlowWorld` owns the database, spatial grid, dispatch table,
//! definitions, caches, and pools, and threads them through trigger and
//! tick explicitly. Hosts that need a custom wiring can assemble the
//! same pieces themselves; nothing here reaches for process-wide state.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use flow_db::{EntityDatabase, PlayerHandle, UnitHandle};
use flow_spatial::SpatialGrid;
use glam::Vec3;

use crate::cache::ProgramCache;
use crate::command::{Command, CommandBuffer};
use crate::config::FlowConfig;
use crate::definition::{DefinitionRegistry, FlowDefinition, FlowTuning};
use crate::error::{FlowError, FlowResult};
use crate::event::{GameplayEvent, SignalKind};
use crate::pool::{BytecodePool, PoolStats, VmPool, VmSlot};
use crate::register::Register;
use crate::registry::OpcodeRegistry;
use crate::tag::FlowTag;
use crate::vm::{ExecContext, FlowVm, VmState};

/// Owns and drives every active flow plus the simulation state they
/// operate on.
pub struct FlowWorld {
    config: FlowConfig,
    db: EntityDatabase,
    spatial: SpatialGrid,
    opcodes: OpcodeRegistry,
    definitions: DefinitionRegistry,
    cache: ProgramCache,
    vms: VmPool,
    buffers: BytecodePool,
    commands: CommandBuffer,
    /// Signals raised by the host since the last tick finished.
    signals: FxHashSet<(UnitHandle, SignalKind)>,
    tuning: FlowTuning,
}

impl Default for FlowWorld {
    fn default() -> Self {
        Self::new(FlowConfig::default())
    }
}

impl FlowWorld {
    /// Assemble a world from its configuration, with core opcodes
    /// installed and pools prewarmed.
    #[must_use]
    pub fn new(config: FlowConfig) -> Self {
        let mut vms = VmPool::new(config.vm_pool_max_idle, config.vm_pool_max_active);
        vms.prewarm(config.prewarm_vms);
        let mut buffers = BytecodePool::new(config.buffer_pool_max_idle);
        buffers.prewarm(1);

        Self {
            spatial: SpatialGrid::new(config.grid_cell_size),
            db: EntityDatabase::new(),
            opcodes: OpcodeRegistry::with_core_ops(),
            definitions: DefinitionRegistry::new(),
            cache: ProgramCache::new(),
            vms,
            buffers,
            commands: CommandBuffer::new(),
            signals: FxHashSet::default(),
            tuning: FlowTuning::new(),
            config,
        }
    }

    /// Register (or replace) the definition for an event tag.
    ///
    /// Replacing drops every cached program: a cached descendant tag may
    /// have resolved through the old definition via ancestor fallback.
    pub fn register_flow(&mut self, tag: FlowTag, definition: Box<dyn FlowDefinition>) {
        self.definitions.register(tag, definition);
        self.cache.clear();
    }

    /// Start the flow for an event. Failures are logged and swallowed;
    /// the tick loop never aborts over one bad event.
    pub fn trigger(&mut self, event: &GameplayEvent) -> Option<VmSlot> {
        match self.try_trigger(event) {
            Ok(slot) => Some(slot),
            Err(err) => {
                warn!(tag = %event.tag, error = %err, "flow trigger failed");
                None
            }
        }
    }

    /// Start the flow for an event, surfacing the failure.
    ///
    /// Resolves the definition (with ancestor fallback), compiles or
    /// fetches the cached program, checks out a VM, and binds it to the
    /// event's subject. Register 0 holds the subject's position; register
    /// 1 holds the event's target unit when one was supplied. A program
    /// naming an opcode with no installed handler is refused here, before
    /// a VM is spent on it.
    pub fn try_trigger(&mut self, event: &GameplayEvent) -> FlowResult<VmSlot> {
        if !self.db.is_valid(event.subject) {
            return Err(FlowError::InvalidHandle(event.subject));
        }
        let program = self.cache.get_or_build(
            event,
            &self.tuning,
            &mut self.definitions,
            &mut self.buffers,
        )?;
        if let Some(unknown) = program
            .headers()
            .filter_map(Result::ok)
            .find(|header| !self.opcodes.is_registered(header.opcode))
        {
            return Err(FlowError::OpcodeNotFound(unknown.opcode.get()));
        }

        let slot = self.vms.acquire()?;
        let owner_player = self
            .db
            .owner(event.subject)
            .unwrap_or(PlayerHandle::new(u32::MAX));
        let owner_position = self.db.location(event.subject);
        if let Some(vm) = self.vms.get_mut(slot) {
            vm.bind(event.subject, owner_player, program, owner_position);
            if let Some(target) = event.target {
                vm.set_register(1, Register::Unit(target));
            }
        }
        debug!(tag = %event.tag, slot = slot.index(), "flow started");
        Ok(slot)
    }

    /// Raise a signal against a unit. Consumed by blocked flows during
    /// the next [`FlowWorld::tick`] and cleared afterwards.
    pub fn raise_signal(&mut self, unit: UnitHandle, kind: SignalKind) {
        self.signals.insert((unit, kind));
    }

    /// Advance every active flow by one simulation tick.
    ///
    /// Flows run in acquisition order; a flow that halts is returned to
    /// the pool. Pending signals are cleared once all flows have seen
    /// them.
    pub fn tick(&mut self, dt: f32) {
        for slot in self.vms.active_slots() {
            let Some(mut vm) = self.vms.take(slot) else {
                continue;
            };
            let mut ctx = ExecContext {
                db: &mut self.db,
                spatial: &mut self.spatial,
                commands: &mut self.commands,
                signals: &self.signals,
            };
            vm.tick(&mut ctx, &self.opcodes, dt);
            let halted = vm.is_halted();
            self.vms.put_back(slot, vm);
            if halted {
                self.vms.release(slot);
            }
        }
        self.signals.clear();
    }

    /// Drain the commands emitted since the last drain, in order.
    pub fn drain_commands(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.commands.drain()
    }

    /// Allocate a unit and index it spatially.
    pub fn spawn_unit(&mut self, owner: PlayerHandle, position: Vec3, yaw: f32) -> UnitHandle {
        let handle = self.db.alloc_unit(owner, position, yaw);
        self.spatial.insert(handle, position);
        handle
    }

    /// Free a unit and drop it from the spatial index.
    ///
    /// Flows blocked watching the handle resume on their next tick with
    /// the unit's last known position.
    pub fn despawn_unit(&mut self, handle: UnitHandle) {
        self.spatial.remove(handle);
        self.db.free_unit(handle);
        self.commands.push(Command::DespawnVisual { unit: handle });
    }

    /// Execution state of a checked-out flow.
    #[must_use]
    pub fn vm_state(&self, slot: VmSlot) -> Option<VmState> {
        self.vms.get(slot).map(FlowVm::state)
    }

    /// Borrow a checked-out flow's VM.
    #[must_use]
    pub fn vm(&self, slot: VmSlot) -> Option<&FlowVm> {
        self.vms.get(slot)
    }

    /// VM pool occupancy.
    #[must_use]
    pub fn vm_stats(&self) -> PoolStats {
        self.vms.stats()
    }

    /// Compilation buffer pool occupancy.
    #[must_use]
    pub fn buffer_stats(&self) -> PoolStats {
        self.buffers.stats()
    }

    /// Number of compiled programs currently cached.
    #[must_use]
    pub fn cached_programs(&self) -> usize {
        self.cache.len()
    }

    /// The world's construction parameters.
    #[must_use]
    pub const fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// The entity database.
    #[must_use]
    pub const fn db(&self) -> &EntityDatabase {
        &self.db
    }

    /// Mutable access to the entity database.
    ///
    /// Position writes made here are not reflected in the spatial index;
    /// prefer [`FlowWorld::spawn_unit`] and [`FlowWorld::despawn_unit`]
    /// for lifecycle changes.
    pub fn db_mut(&mut self) -> &mut EntityDatabase {
        &mut self.db
    }

    /// The spatial index.
    #[must_use]
    pub const fn spatial(&self) -> &SpatialGrid {
        &self.spatial
    }

    /// Mutable access to the spatial index.
    pub fn spatial_mut(&mut self) -> &mut SpatialGrid {
        &mut self.spatial
    }

    /// Named tuning constants read by definitions at build time.
    #[must_use]
    pub const fn tuning(&self) -> &FlowTuning {
        &self.tuning
    }

    /// Mutable access to the tuning table.
    ///
    /// Cached programs baked the old values in; call this before the
    /// first trigger of the tags it affects, or clear the cache.
    pub fn tuning_mut(&mut self) -> &mut FlowTuning {
        &mut self.tuning
    }

    /// Mutable access to the opcode dispatch table, for module
    /// extensions claiming ranges above the core block.
    pub fn opcodes_mut(&mut self) -> &mut OpcodeRegistry {
        &mut self.opcodes
    }
}
