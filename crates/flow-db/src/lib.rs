//! flow-db - Handle-based entity/player database
//!
//! Structure-of-arrays storage for simulated units and their controlling
//! players, addressed through generational handles.
//!
//! # Key Concepts
//!
//! - **UnitHandle**: `(index, generation)` pair; valid only while the
//!   slot's generation matches and the slot is active
//! - **Generation**: bumped when a freed slot is reused, so stale handles
//!   can never alias the new occupant
//! - **AttributeSet**: fixed array of gameplay attributes with health
//!   clamped into `[0, MaxHealth]`
//! - **Visual**: caller-supplied presentation proxy, despawned when its
//!   unit is freed
//!
//! All accessors fail silently (`None`/default) on invalid handles; the
//! simulation loop never panics over a stale reference.

mod attributes;
mod database;
mod handle;
mod visual;

pub use attributes::{Attribute, AttributeSet};
pub use database::EntityDatabase;
pub use handle::{Generation, PlayerHandle, UnitHandle, UnitIndex};
pub use visual::{Visual, VisualId};
