//! Sparse uniform grid over unit positions.
//!
//! Units are bucketed by `floor(position / cell_size)` on the x/z plane.
//! Cells exist only while occupied; a reverse handle-to-cell map gives
//! O(1) removal and movement updates.

use flow_db::UnitHandle;
use glam::Vec3;
use hashbrown::HashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::bounds::Aabb;

/// Integer grid coordinate of one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

type CellMembers = SmallVec<[UnitHandle; 8]>;

/// A sparse 2D broad-phase grid over a 3D world.
///
/// Queries return every unit in a cell that overlaps the query shape —
/// a superset of the exact result. No final per-unit distance check is
/// performed; callers that need exact radii filter themselves.
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellCoord, CellMembers>,
    /// Which cell each inserted handle currently occupies.
    positions: FxHashMap<UnitHandle, CellCoord>,
}

impl SpatialGrid {
    /// Create a grid with the given cell edge length in world units.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        debug_assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            positions: FxHashMap::default(),
        }
    }

    /// Cell edge length in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Quantize a world position to its cell coordinate.
    #[must_use]
    pub fn coord_at(&self, position: Vec3) -> CellCoord {
        CellCoord {
            x: (position.x / self.cell_size).floor() as i32,
            z: (position.z / self.cell_size).floor() as i32,
        }
    }

    /// Insert a unit at a position. Re-inserting moves it.
    pub fn insert(&mut self, handle: UnitHandle, position: Vec3) {
        let coord = self.coord_at(position);
        if let Some(&previous) = self.positions.get(&handle) {
            if previous == coord {
                return;
            }
            self.remove_from_cell(handle, previous);
        }
        self.cells.entry(coord).or_default().push(handle);
        self.positions.insert(handle, coord);
    }

    /// Remove a unit from the grid. No-op if it was never inserted.
    pub fn remove(&mut self, handle: UnitHandle) {
        if let Some(coord) = self.positions.remove(&handle) {
            self.remove_from_cell(handle, coord);
        }
    }

    /// Move a unit to a new position.
    pub fn update(&mut self, handle: UnitHandle, position: Vec3) {
        self.insert(handle, position);
    }

    /// Number of tracked units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the grid tracks no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of live (occupied) cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Collect every unit in a cell overlapping the sphere.
    ///
    /// Superset semantics: no exact-distance rejection. De-duplicates by
    /// handle; appends to `out` without clearing it.
    pub fn query_sphere(&self, center: Vec3, radius: f32, out: &mut Vec<UnitHandle>) {
        self.query_box(Aabb::centered(center, Vec3::splat(radius)), out);
    }

    /// Collect every unit in a cell overlapping the box.
    ///
    /// Same superset semantics as [`SpatialGrid::query_sphere`].
    pub fn query_box(&self, bounds: Aabb, out: &mut Vec<UnitHandle>) {
        let min = self.coord_at(bounds.min);
        let max = self.coord_at(bounds.max);
        self.collect_range(min, max, out);
    }

    fn collect_range(&self, min: CellCoord, max: CellCoord, out: &mut Vec<UnitHandle>) {
        let mut seen: FxHashSet<UnitHandle> = out.iter().copied().collect();
        for x in min.x..=max.x {
            for z in min.z..=max.z {
                if let Some(members) = self.cells.get(&CellCoord { x, z }) {
                    for &handle in members {
                        if seen.insert(handle) {
                            out.push(handle);
                        }
                    }
                }
            }
        }
    }

    fn remove_from_cell(&mut self, handle: UnitHandle, coord: CellCoord) {
        if let Some(members) = self.cells.get_mut(&coord) {
            members.retain(|&mut m| m != handle);
            // Reclaim empty cells so long-lived worlds don't leak buckets.
            if members.is_empty() {
                self.cells.remove(&coord);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use flow_db::Generation;

    use super::*;

    fn handle(index: u32) -> UnitHandle {
        UnitHandle::new(index, Generation::new())
    }

    #[test]
    fn test_coord_quantization() {
        let grid = SpatialGrid::new(16.0);
        assert_eq!(
            grid.coord_at(Vec3::new(0.0, 5.0, 0.0)),
            CellCoord { x: 0, z: 0 }
        );
        assert_eq!(
            grid.coord_at(Vec3::new(15.9, 0.0, 16.0)),
            CellCoord { x: 0, z: 1 }
        );
        assert_eq!(
            grid.coord_at(Vec3::new(-0.1, 0.0, -16.1)),
            CellCoord { x: -1, z: -2 }
        );
    }

    #[test]
    fn test_insert_remove() {
        let mut grid = SpatialGrid::new(16.0);
        grid.insert(handle(1), Vec3::ZERO);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell_count(), 1);

        grid.remove(handle(1));
        assert!(grid.is_empty());
        // Empty cells are reclaimed, not left behind.
        assert_eq!(grid.cell_count(), 0);
    }

    #[test]
    fn test_update_moves_between_cells() {
        let mut grid = SpatialGrid::new(16.0);
        grid.insert(handle(1), Vec3::ZERO);
        grid.update(handle(1), Vec3::new(100.0, 0.0, 100.0));

        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell_count(), 1);

        let mut out = Vec::new();
        grid.query_sphere(Vec3::new(100.0, 0.0, 100.0), 1.0, &mut out);
        assert_eq!(out, vec![handle(1)]);
    }

    #[test]
    fn test_query_sphere_no_false_negatives() {
        let mut grid = SpatialGrid::new(10.0);
        // Units scattered inside the radius in several cells.
        let inside = [
            (1, Vec3::new(0.0, 0.0, 0.0)),
            (2, Vec3::new(25.0, 0.0, 0.0)),
            (3, Vec3::new(-18.0, 0.0, 12.0)),
            (4, Vec3::new(0.0, 0.0, -29.0)),
        ];
        for &(index, pos) in &inside {
            grid.insert(handle(index), pos);
        }
        // Far outside any overlapping cell.
        grid.insert(handle(9), Vec3::new(500.0, 0.0, 500.0));

        let mut out = Vec::new();
        grid.query_sphere(Vec3::ZERO, 30.0, &mut out);
        for &(index, _) in &inside {
            assert!(out.contains(&handle(index)), "missing unit {index}");
        }
        assert!(!out.contains(&handle(9)));
    }

    #[test]
    fn test_query_sphere_superset_allowed() {
        let mut grid = SpatialGrid::new(10.0);
        // In an overlapping cell but beyond the exact radius.
        grid.insert(handle(1), Vec3::new(9.5, 0.0, 9.5));

        let mut out = Vec::new();
        grid.query_sphere(Vec3::ZERO, 5.0, &mut out);
        // The corner unit may appear; it must not appear twice.
        let count = out.iter().filter(|&&h| h == handle(1)).count();
        assert!(count <= 1);
    }

    #[test]
    fn test_query_box() {
        let mut grid = SpatialGrid::new(4.0);
        grid.insert(handle(1), Vec3::new(2.0, 0.0, 2.0));
        grid.insert(handle(2), Vec3::new(50.0, 0.0, 50.0));

        let mut out = Vec::new();
        grid.query_box(
            Aabb::new(Vec3::new(-4.0, 0.0, -4.0), Vec3::new(4.0, 0.0, 4.0)),
            &mut out,
        );
        assert!(out.contains(&handle(1)));
        assert!(!out.contains(&handle(2)));
    }

    #[test]
    fn test_query_dedup_across_cells() {
        let mut grid = SpatialGrid::new(8.0);
        grid.insert(handle(1), Vec3::new(4.0, 0.0, 4.0));

        let mut out = Vec::new();
        grid.query_sphere(Vec3::new(4.0, 0.0, 4.0), 20.0, &mut out);
        assert_eq!(out, vec![handle(1)]);
    }
}
