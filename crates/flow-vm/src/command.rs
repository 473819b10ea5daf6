//! Outbound commands toward the rest of the system.
//!
//! Opcode handlers accumulate commands here; the host drains them after
//! each tick and forwards them to presentation, movement, and status
//! processors. The core itself renders and networks nothing.

use flow_db::UnitHandle;
use glam::Vec3;

/// A logical side effect produced by an opcode handler.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Play an animation on a unit's visual actor.
    PlayAnimation { unit: UnitHandle, name: String },
    /// A unit was allocated for `tag`; spawn its presentation.
    SpawnVisual { unit: UnitHandle, tag: String },
    /// A unit was freed; tear down its presentation.
    DespawnVisual { unit: UnitHandle },
    /// Steer a unit toward a destination.
    MoveTo {
        unit: UnitHandle,
        dest: Vec3,
        speed: f32,
    },
    /// Move a unit along its facing.
    MoveForward { unit: UnitHandle, speed: f32 },
    /// Stop a unit's movement.
    StopMovement { unit: UnitHandle },
    /// Apply a physical impulse to a unit.
    ApplyForce { unit: UnitHandle, force: Vec3 },
    /// Start a damage-over-time burn on a unit.
    ApplyBurning {
        unit: UnitHandle,
        damage_per_second: f32,
        duration: f32,
    },
}

/// Accumulates commands during a tick; drained by the host afterwards.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Queue a command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no commands are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drain all pending commands in emission order.
    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.commands.drain(..)
    }
}
