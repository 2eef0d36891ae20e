//! Grid and world coordinate types for terrain planning.

use serde::{Deserialize, Serialize};

/// Integer index of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    /// Cell column
    pub x: i32,
    /// Cell row
    pub y: i32,
}

impl GridIndex {
    /// Create a new grid index.
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset this index by a cell delta.
    #[inline]
    pub fn offset(&self, dx: i32, dy: i32) -> GridIndex {
        GridIndex::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance to another index (number of 8-connected steps).
    #[inline]
    pub fn chebyshev_distance(&self, other: &GridIndex) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// A 3D point in world coordinates (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint3 {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
    /// Height in meters
    pub z: f32,
}

impl WorldPoint3 {
    /// Origin point.
    pub const ZERO: WorldPoint3 = WorldPoint3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new point.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &WorldPoint3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &WorldPoint3) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Planar (xy) distance to another point.
    #[inline]
    pub fn planar_distance(&self, other: &WorldPoint3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Planar robot pose: position (x, y) in meters and heading in radians.
///
/// The heading is normalized to [-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// X position in meters
    pub x: f32,
    /// Y position in meters
    pub y: f32,
    /// Heading in radians, normalized to [-π, π]
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose with normalized heading.
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: super::angle::normalize_angle(theta),
        }
    }

    /// Translate the pose position, keeping the heading.
    #[inline]
    pub fn translated(&self, dx: f32, dy: f32) -> Pose2D {
        Pose2D {
            x: self.x + dx,
            y: self.y + dy,
            theta: self.theta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_index_offset() {
        let idx = GridIndex::new(3, -2);
        assert_eq!(idx.offset(-1, 4), GridIndex::new(2, 2));
    }

    #[test]
    fn test_chebyshev_distance() {
        let a = GridIndex::new(0, 0);
        let b = GridIndex::new(3, -5);
        assert_eq!(a.chebyshev_distance(&b), 5);
        assert_eq!(b.chebyshev_distance(&a), 5);
    }

    #[test]
    fn test_point_distance() {
        let a = WorldPoint3::new(0.0, 0.0, 0.0);
        let b = WorldPoint3::new(3.0, 4.0, 0.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(a.planar_distance(&b), 5.0);

        let c = WorldPoint3::new(0.0, 3.0, 4.0);
        assert_relative_eq!(a.distance(&c), 5.0);
        assert_relative_eq!(a.planar_distance(&c), 3.0);
    }

    #[test]
    fn test_pose_normalizes_heading() {
        let pose = Pose2D::new(1.0, 2.0, 3.0 * std::f32::consts::PI);
        assert_relative_eq!(pose.theta, std::f32::consts::PI, epsilon = 1e-5);
    }
}
