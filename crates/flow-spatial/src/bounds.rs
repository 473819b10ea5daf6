//! Axis-aligned query volume.

use glam::Vec3;

/// An axis-aligned box used for box-shaped range queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from its corners.
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box centered on a point with the given half-extents.
    #[must_use]
    pub fn centered(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_corners() {
        let b = Aabb::centered(Vec3::new(10.0, 0.0, -10.0), Vec3::splat(5.0));
        assert_eq!(b.min, Vec3::new(5.0, -5.0, -15.0));
        assert_eq!(b.max, Vec3::new(15.0, 5.0, -5.0));
    }
}
