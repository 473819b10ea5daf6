//! Opcode identifiers.
//!
//! An opcode is a bare byte so that modules can claim ranges beyond the
//! core block at runtime. Core opcodes occupy `0x00..=0x1F`; the dispatch
//! registry hands out module ranges above [`Opcode::CORE_END`].

use std::fmt;

/// A one-byte instruction identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    /// Halt the flow.
    pub const END: Self = Self(0x00);
    /// Unconditional relative jump.
    pub const JUMP: Self = Self(0x01);

    /// Play an animation on a unit.
    pub const PLAY_ANIMATION: Self = Self(0x02);

    /// Suspend for a fixed duration.
    pub const WAIT_SECONDS: Self = Self(0x03);
    /// Suspend until the watched unit is destroyed.
    pub const WAIT_UNTIL_DESTROYED: Self = Self(0x04);
    /// Suspend until the watched unit collides (or is destroyed).
    pub const WAIT_UNTIL_COLLISION: Self = Self(0x05);
    /// Suspend until the watched unit arrives (or is destroyed).
    pub const WAIT_UNTIL_ARRIVAL: Self = Self(0x06);
    /// Suspend until the host raises a custom signal (or the unit dies).
    pub const WAIT_UNTIL_SIGNAL: Self = Self(0x07);

    /// Issue a move-to command for the owner unit.
    pub const MOVE_TO: Self = Self(0x08);
    /// Issue a move-forward command for a unit.
    pub const MOVE_FORWARD: Self = Self(0x09);
    /// Stop the owner unit's movement.
    pub const STOP: Self = Self(0x0A);
    /// Apply a physical impulse to a unit.
    pub const APPLY_FORCE: Self = Self(0x0B);

    /// Allocate a new unit and bind a visual spawn command.
    pub const SPAWN_ENTITY: Self = Self(0x0C);
    /// Free the unit held in a register.
    pub const DESTROY_ENTITY: Self = Self(0x0D);

    /// Apply direct damage, reduced by defense.
    pub const SET_DAMAGE: Self = Self(0x0E);
    /// Apply area damage with linear distance falloff.
    pub const AREA_DAMAGE: Self = Self(0x0F);
    /// Apply a damage-over-time burn.
    pub const APPLY_BURNING: Self = Self(0x10);
    /// Add a raw delta to one attribute.
    pub const MODIFY_ATTRIBUTE: Self = Self(0x11);

    /// Range-query the spatial index into a unit-list register.
    pub const QUERY_NEARBY: Self = Self(0x12);
    /// Begin iterating a unit-list register.
    pub const FOR_EACH_TARGET: Self = Self(0x13);
    /// Close the open iteration.
    pub const END_FOR_EACH: Self = Self(0x14);

    /// One past the last core opcode; module ranges start here.
    pub const CORE_END: u8 = 0x20;

    /// Raw byte value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Human-readable name for core opcodes.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            0x00 => "End",
            0x01 => "Jump",
            0x02 => "PlayAnimation",
            0x03 => "WaitSeconds",
            0x04 => "WaitUntilDestroyed",
            0x05 => "WaitUntilCollision",
            0x06 => "WaitUntilArrival",
            0x07 => "WaitUntilSignal",
            0x08 => "MoveTo",
            0x09 => "MoveForward",
            0x0A => "Stop",
            0x0B => "ApplyForce",
            0x0C => "SpawnEntity",
            0x0D => "DestroyEntity",
            0x0E => "SetDamage",
            0x0F => "AreaDamage",
            0x10 => "ApplyBurning",
            0x11 => "ModifyAttribute",
            0x12 => "QueryNearby",
            0x13 => "ForEachTarget",
            0x14 => "EndForEach",
            _ => "Module",
        }
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.0)
    }
}
