//! Caller-supplied presentation proxies.
//!
//! The database owns one optional visual per unit and forwards despawns
//! when the unit is freed. The core never renders anything itself; a
//! visual is only a back-reference to whatever the presentation layer
//! spawned for the unit.

use glam::Vec3;

/// Identifier of an external visual actor, assigned by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisualId(pub u64);

/// A presentation-layer actor bound to one unit.
pub trait Visual {
    /// The caller's identifier for this actor.
    fn id(&self) -> VisualId;

    /// Current world-space position of the actor, if it still exists.
    ///
    /// Used for one-way visual-to-logic position sync while a flow is
    /// blocked watching the unit.
    fn world_position(&self) -> Option<Vec3>;

    /// Tear down the external actor. Called when the owning unit is freed.
    fn despawn(&mut self);
}
