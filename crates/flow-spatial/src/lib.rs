//! flow-spatial - Broad-phase range queries over unit positions
//!
//! A sparse uniform grid keyed by quantized x/z coordinates. Sphere and
//! box queries enumerate the overlapping cell range and union their
//! members, de-duplicated by handle. Results are a superset of the exact
//! shape: units in an overlapping cell but outside the exact radius are
//! returned too, by design.

mod bounds;
mod grid;

pub use bounds::Aabb;
pub use grid::{CellCoord, SpatialGrid};
