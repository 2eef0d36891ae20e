//! Foundation types: coordinates, poses, and angular arithmetic.

pub mod angle;
pub mod types;

pub use angle::{normalize_angle, AngleSegment, DiscreteTheta};
pub use types::{GridIndex, Pose2D, WorldPoint3};
