//! Triggering events and host-raised signals.

use flow_db::UnitHandle;
use glam::Vec3;

use crate::tag::FlowTag;

/// An external event that may start a flow.
///
/// The core reads `tag`, `location`, and the handles; `magnitude` and
/// `frame_number` pass through untouched for definitions to interpret.
#[derive(Clone, Debug)]
pub struct GameplayEvent {
    pub event_id: u64,
    /// The unit the flow will be bound to.
    pub subject: UnitHandle,
    pub tag: FlowTag,
    pub target: Option<UnitHandle>,
    pub location: Vec3,
    pub magnitude: f32,
    pub frame_number: u64,
}

impl GameplayEvent {
    /// Convenience constructor for the common subject-only case.
    #[must_use]
    pub fn new(event_id: u64, subject: UnitHandle, tag: FlowTag) -> Self {
        Self {
            event_id,
            subject,
            tag,
            target: None,
            location: Vec3::ZERO,
            magnitude: 0.0,
            frame_number: 0,
        }
    }
}

/// Signals the host raises against a unit, consumed by blocked flows at
/// the end of the tick they were raised in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// The unit's collision volume was hit.
    Collision,
    /// The unit reached its movement destination.
    Arrival,
    /// A host-defined signal for `WaitUntilSignal`.
    Custom,
}
