//! Angular arithmetic: normalization, discrete headings, angular segments.
//!
//! The planner discretizes robot headings into `num_angles` equally spaced
//! bins ([`DiscreteTheta`]) and stores per-patch heading constraints as
//! closed angular intervals ([`AngleSegment`]).

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// Normalize angle to [-π, π].
///
/// # Example
/// ```
/// use bhumi_nav::core::angle::normalize_angle;
/// use std::f32::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-6);
/// assert!((normalize_angle(-3.0 * PI) - (-PI)).abs() < 1e-6);
/// ```
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a < -PI {
        a += TAU;
    }
    a
}

/// Normalize angle to [0, 2π).
#[inline]
pub fn normalize_angle_positive(angle: f32) -> f32 {
    let a = angle % TAU;
    if a < 0.0 {
        a + TAU
    } else {
        a
    }
}

/// A heading quantized into one of `num_angles` equally spaced bins.
///
/// Arithmetic is modulo `num_angles`; the distance metric is the shortest
/// way around the circle. All values in one planning run share the same
/// `num_angles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscreteTheta {
    theta: i32,
    num_angles: i32,
}

impl DiscreteTheta {
    /// Create from a raw bin index (wrapped into range).
    #[inline]
    pub fn new(theta: i32, num_angles: u32) -> Self {
        let n = num_angles as i32;
        Self {
            theta: theta.rem_euclid(n),
            num_angles: n,
        }
    }

    /// Quantize a heading in radians to the nearest bin.
    #[inline]
    pub fn from_radian(theta: f32, num_angles: u32) -> Self {
        let n = num_angles as i32;
        let bin = (theta * n as f32 / TAU).round() as i32;
        Self {
            theta: bin.rem_euclid(n),
            num_angles: n,
        }
    }

    /// Bin index in `[0, num_angles)`.
    #[inline]
    pub fn index(&self) -> i32 {
        self.theta
    }

    /// Number of bins on the circle.
    #[inline]
    pub fn num_angles(&self) -> u32 {
        self.num_angles as u32
    }

    /// Bin center in radians, in `[0, 2π)`.
    #[inline]
    pub fn to_radian(&self) -> f32 {
        self.theta as f32 * TAU / self.num_angles as f32
    }

    /// Shortest distance to another heading, in bins.
    #[inline]
    pub fn shortest_dist(&self, other: &DiscreteTheta) -> i32 {
        debug_assert_eq!(self.num_angles, other.num_angles);
        let d = (self.theta - other.theta).rem_euclid(self.num_angles);
        d.min(self.num_angles - d)
    }

    /// Shortest distance to another heading, in radians.
    #[inline]
    pub fn shortest_dist_rad(&self, other: &DiscreteTheta) -> f32 {
        self.shortest_dist(other) as f32 * TAU / self.num_angles as f32
    }
}

impl std::ops::Add<i32> for DiscreteTheta {
    type Output = DiscreteTheta;

    #[inline]
    fn add(self, rhs: i32) -> DiscreteTheta {
        DiscreteTheta {
            theta: (self.theta + rhs).rem_euclid(self.num_angles),
            num_angles: self.num_angles,
        }
    }
}

impl std::fmt::Display for DiscreteTheta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.theta, self.num_angles)
    }
}

/// A closed angular interval on the unit circle.
///
/// Stored as a start angle and a non-negative width; a width of 2π covers
/// the full circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleSegment {
    /// Start of the interval in radians
    pub start: f32,
    /// Width of the interval in radians, in [0, 2π]
    pub width: f32,
}

impl AngleSegment {
    /// Create a segment from a start angle and width.
    #[inline]
    pub fn new(start: f32, width: f32) -> Self {
        Self {
            start: normalize_angle_positive(start),
            width: width.clamp(0.0, TAU),
        }
    }

    /// Segment covering the full circle.
    #[inline]
    pub fn full_circle() -> Self {
        Self {
            start: 0.0,
            width: TAU,
        }
    }

    /// Segment centered on `center` extending `half_width` to each side.
    #[inline]
    pub fn centered(center: f32, half_width: f32) -> Self {
        Self::new(center - half_width, 2.0 * half_width)
    }

    /// Whether the angle lies inside the interval (inclusive).
    #[inline]
    pub fn contains(&self, angle: f32) -> bool {
        if self.width >= TAU {
            return true;
        }
        let rel = normalize_angle_positive(angle - self.start);
        rel <= self.width + 1e-6
    }

    /// Center of the interval in radians.
    #[inline]
    pub fn midpoint(&self) -> f32 {
        normalize_angle(self.start + self.width / 2.0)
    }
}
