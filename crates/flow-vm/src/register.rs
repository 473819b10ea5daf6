//! Tagged VM registers.
//!
//! The tag is the enum discriminant and every accessor pattern-matches,
//! so a register can never be reinterpreted as the wrong type. A
//! wrong-tag read yields `None` and the opcode degrades to a no-op.

use flow_db::{PlayerHandle, UnitHandle};
use glam::Vec3;

/// Number of general-purpose registers per VM.
pub const REGISTER_COUNT: usize = 8;

/// One slot of a flow's working storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Register {
    #[default]
    Empty,
    Unit(UnitHandle),
    Player(PlayerHandle),
    Vector(Vec3),
    Scalar(f32),
    Integer(i32),
    UnitList(Vec<UnitHandle>),
}

impl Register {
    /// The unit handle, if this register holds one.
    #[must_use]
    pub const fn as_unit(&self) -> Option<UnitHandle> {
        match self {
            Self::Unit(handle) => Some(*handle),
            _ => None,
        }
    }

    /// The player handle, if this register holds one.
    #[must_use]
    pub const fn as_player(&self) -> Option<PlayerHandle> {
        match self {
            Self::Player(handle) => Some(*handle),
            _ => None,
        }
    }

    /// The vector, if this register holds one.
    #[must_use]
    pub const fn as_vector(&self) -> Option<Vec3> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// The scalar, if this register holds one.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f32> {
        match self {
            Self::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// The integer, if this register holds one.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The unit list, if this register holds one.
    #[must_use]
    pub fn as_unit_list(&self) -> Option<&[UnitHandle]> {
        match self {
            Self::UnitList(list) => Some(list),
            _ => None,
        }
    }

    /// Whether the register holds nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
