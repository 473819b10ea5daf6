//! Handles referring into the unit and player tables.
//!
//! Freed unit slots go back on a free list and come back for new units,
//! so a bare index would silently alias whatever moved in next. A unit
//! handle therefore also remembers which occupant of the slot it was
//! issued for; the database compares that against the slot's current
//! generation before honoring the handle.

use std::fmt;

/// Which occupant of a recycled slot a handle was issued for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Generation(u32);

impl Generation {
    /// Generation of a slot that has never been recycled.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// The generation the slot takes on its next reuse. Wraps at
    /// `u32::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Raw slot index into the unit arrays.
pub type UnitIndex = u32;

/// Refers to one simulated unit.
///
/// Valid only while the slot is active and still on the generation the
/// handle carries; once the unit is freed and the slot reused, the old
/// handle stops validating instead of pointing at the new occupant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitHandle {
    index: UnitIndex,
    generation: Generation,
}

impl UnitHandle {
    #[must_use]
    pub const fn new(index: UnitIndex, generation: Generation) -> Self {
        Self { index, generation }
    }

    /// Slot index in the unit arrays.
    #[must_use]
    pub const fn index(self) -> UnitIndex {
        self.index
    }

    /// Slot occupant this handle was issued for.
    #[must_use]
    pub const fn generation(self) -> Generation {
        self.generation
    }
}

impl fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit({}v{})", self.index, self.generation.0)
    }
}

impl fmt::Display for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation.0)
    }
}

/// Refers to one controlling player.
///
/// Player slots deactivate but are never handed out again, so a bare
/// index is enough here.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerHandle {
    index: u32,
}

impl PlayerHandle {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self { index }
    }

    /// Slot index in the player table.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_slot_different_occupant_not_equal() {
        let first = UnitHandle::new(4, Generation::new());
        let second = UnitHandle::new(4, Generation::new().next());
        assert_ne!(first, second);
        assert_eq!(first.index(), second.index());
    }

    #[test]
    fn test_generation_wraps() {
        let g = Generation(u32::MAX);
        assert_eq!(g.next().get(), 0);
    }
}
