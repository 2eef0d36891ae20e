//! Configuration for the terrain planner.

use std::path::Path;

use serde::Deserialize;

use crate::error::{NavError, Result};

/// Slope penalty applied to edge costs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeMetric {
    /// No slope penalty, the primitive base cost is used as-is
    None,
    /// Scale the base cost by the average slope along the motion
    AvgSlope,
    /// Scale the base cost by the maximum slope along the motion
    MaxSlope,
    /// Recompute the cost with the 3D motion length (hypotenuse over Δz)
    TriangleSlope,
}

/// Terrain classification and footprint parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct TraversabilityConfig {
    /// Planning grid resolution in meters per cell
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: f32,

    /// Robot footprint length along the heading axis (meters)
    #[serde(default = "default_robot_size_x")]
    pub robot_size_x: f32,

    /// Robot footprint width across the heading axis (meters)
    #[serde(default = "default_robot_size_y")]
    pub robot_size_y: f32,

    /// Robot body height (meters); bounds the vertical window when matching
    /// patches between layers
    #[serde(default = "default_robot_height")]
    pub robot_height: f32,

    /// Maximum terrain incline the robot can stand on (radians)
    #[serde(default = "default_slope_limit")]
    pub slope_limit: f32,

    /// Maximum height difference between linked neighbor patches (meters)
    #[serde(default = "default_step_height")]
    pub step_height: f32,

    /// Maximum roll the robot tolerates (radians)
    #[serde(default = "default_max_roll")]
    pub max_roll: f32,

    /// Maximum pitch the robot tolerates (radians)
    #[serde(default = "default_max_pitch")]
    pub max_pitch: f32,

    /// Outer radius of the boundary ring used for proximity penalties (meters)
    #[serde(default = "default_cost_function_dist")]
    pub cost_function_dist: f32,

    /// Slope penalty variant
    #[serde(default = "default_slope_metric")]
    pub slope_metric: SlopeMetric,

    /// Scale factor for the Avg/Max slope penalties
    #[serde(default = "default_slope_metric_scale")]
    pub slope_metric_scale: f32,

    /// Reject motions whose heading violates per-patch allowed segments
    #[serde(default = "default_enable_incline_limit")]
    pub enable_incline_limit: bool,

    /// Evaluate motion primitives on worker threads during successor expansion
    #[serde(default = "default_parallel_enabled")]
    pub parallel_enabled: bool,
}

/// Vehicle speed limits used by the cost model and heuristic.
#[derive(Clone, Debug, Deserialize)]
pub struct MobilityConfig {
    /// Translation speed in m/s
    #[serde(default = "default_translation_speed")]
    pub translation_speed: f32,

    /// Rotation speed in rad/s
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f32,
}

/// Motion primitive discretization.
#[derive(Clone, Debug, Deserialize)]
pub struct PrimitiveConfig {
    /// Number of discrete heading bins
    #[serde(default = "default_num_angles")]
    pub num_angles: u32,
}

/// Weights for ranking exploration candidates.
#[derive(Clone, Debug, Deserialize)]
pub struct FrontierCostConfig {
    /// Weight of the normalized distance to the goal hint
    #[serde(default = "default_w_goal")]
    pub w_goal: f32,

    /// Weight of the explorable-area ratio around the candidate
    #[serde(default = "default_w_explore")]
    pub w_explore: f32,

    /// Weight of the normalized travel distance from the robot
    #[serde(default = "default_w_travel")]
    pub w_travel: f32,

    /// Search radius (meters) when relocating a candidate to a
    /// collision-free patch
    #[serde(default = "default_max_neighbor_distance")]
    pub max_neighbor_distance: f32,
}

/// Aggregate planner configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub traversability: TraversabilityConfig,
    #[serde(default)]
    pub mobility: MobilityConfig,
    #[serde(default)]
    pub primitives: PrimitiveConfig,
    #[serde(default)]
    pub frontier: FrontierCostConfig,
}

impl NavConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("failed to read config file: {}", e)))?;
        let config: NavConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.traversability.grid_resolution <= 0.0 {
            return Err(NavError::Config("grid_resolution must be positive".into()));
        }
        if self.mobility.translation_speed <= 0.0 || self.mobility.rotation_speed <= 0.0 {
            return Err(NavError::Config("mobility speeds must be positive".into()));
        }
        if self.primitives.num_angles == 0 {
            return Err(NavError::Config("num_angles must be at least 1".into()));
        }
        Ok(())
    }
}

// Default value functions

fn default_grid_resolution() -> f32 {
    0.1
}
fn default_robot_size_x() -> f32 {
    0.5
}
fn default_robot_size_y() -> f32 {
    0.35
}
fn default_robot_height() -> f32 {
    0.3
}
fn default_slope_limit() -> f32 {
    0.52
} // ~30 degrees
fn default_step_height() -> f32 {
    0.1
}
fn default_max_roll() -> f32 {
    0.35
}
fn default_max_pitch() -> f32 {
    0.52
}
fn default_cost_function_dist() -> f32 {
    0.4
}
fn default_slope_metric() -> SlopeMetric {
    SlopeMetric::None
}
fn default_slope_metric_scale() -> f32 {
    1.0
}
fn default_enable_incline_limit() -> bool {
    true
}
fn default_parallel_enabled() -> bool {
    true
}

fn default_translation_speed() -> f32 {
    0.5
}
fn default_rotation_speed() -> f32 {
    1.0
}

fn default_num_angles() -> u32 {
    16
}

fn default_w_goal() -> f32 {
    1.0
}
fn default_w_explore() -> f32 {
    1.0
}
fn default_w_travel() -> f32 {
    1.0
}
fn default_max_neighbor_distance() -> f32 {
    1.0
}

impl Default for TraversabilityConfig {
    fn default() -> Self {
        Self {
            grid_resolution: default_grid_resolution(),
            robot_size_x: default_robot_size_x(),
            robot_size_y: default_robot_size_y(),
            robot_height: default_robot_height(),
            slope_limit: default_slope_limit(),
            step_height: default_step_height(),
            max_roll: default_max_roll(),
            max_pitch: default_max_pitch(),
            cost_function_dist: default_cost_function_dist(),
            slope_metric: default_slope_metric(),
            slope_metric_scale: default_slope_metric_scale(),
            enable_incline_limit: default_enable_incline_limit(),
            parallel_enabled: default_parallel_enabled(),
        }
    }
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            translation_speed: default_translation_speed(),
            rotation_speed: default_rotation_speed(),
        }
    }
}

impl Default for PrimitiveConfig {
    fn default() -> Self {
        Self {
            num_angles: default_num_angles(),
        }
    }
}

impl Default for FrontierCostConfig {
    fn default() -> Self {
        Self {
            w_goal: default_w_goal(),
            w_explore: default_w_explore(),
            w_travel: default_w_travel(),
            max_neighbor_distance: default_max_neighbor_distance(),
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            traversability: TraversabilityConfig::default(),
            mobility: MobilityConfig::default(),
            primitives: PrimitiveConfig::default(),
            frontier: FrontierCostConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NavConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [traversability]
            grid_resolution = 0.05
            slope_metric = "triangle_slope"

            [mobility]
            translation_speed = 0.8
        "#;
        let config: NavConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.traversability.grid_resolution, 0.05);
        assert_eq!(
            config.traversability.slope_metric,
            SlopeMetric::TriangleSlope
        );
        assert_eq!(config.mobility.translation_speed, 0.8);
        // Untouched sections fall back to defaults
        assert_eq!(config.primitives.num_angles, 16);
    }

    #[test]
    fn test_validate_rejects_zero_resolution() {
        let mut config = NavConfig::default();
        config.traversability.grid_resolution = 0.0;
        assert!(config.validate().is_err());
    }
}
