//! Swept-footprint statistics over the obstacle layer.
//!
//! For the poses swept along a motion, counts obstacle and frontier
//! patches under the oriented robot rectangle (inner stats) and inside the
//! surrounding proximity ring (boundary stats).

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::TraversabilityConfig;
use crate::core::{GridIndex, Pose2D};
use crate::traversability::{Patch, PatchKind, TraversabilityGraph};

/// Counts and proximity of undesirable patches near a swept footprint.
#[derive(Debug, Clone)]
pub struct FootprintStats {
    pub num_obstacles: usize,
    pub num_frontiers: usize,
    /// Planar distance from the closest swept pose center to the nearest
    /// obstacle patch; infinite when `num_obstacles` is 0
    pub min_dist_to_obstacles: f32,
    /// Same for frontier patches
    pub min_dist_to_frontiers: f32,
}

impl FootprintStats {
    fn new() -> Self {
        Self {
            num_obstacles: 0,
            num_frontiers: 0,
            min_dist_to_obstacles: f32::INFINITY,
            min_dist_to_frontiers: f32::INFINITY,
        }
    }

    /// Whether any obstacle or frontier patch was hit.
    #[inline]
    pub fn any_violation(&self) -> bool {
        self.num_obstacles > 0 || self.num_frontiers > 0
    }
}

/// Statistics of one swept motion.
#[derive(Debug, Clone)]
pub struct PathStats {
    /// Patches under the robot rectangle itself
    pub robot: FootprintStats,
    /// Patches in the proximity ring around the rectangle
    pub boundary: FootprintStats,
}

/// Evaluates swept footprints against an obstacle-layer graph.
pub struct FootprintEvaluator<'a> {
    obstacle_graph: &'a TraversabilityGraph,
    config: &'a TraversabilityConfig,
}

impl<'a> FootprintEvaluator<'a> {
    pub fn new(obstacle_graph: &'a TraversabilityGraph, config: &'a TraversabilityConfig) -> Self {
        Self {
            obstacle_graph,
            config,
        }
    }

    /// Compute footprint statistics for poses swept along a motion.
    ///
    /// `patches` are the obstacle-layer patches under each pose, in the
    /// same order; they provide the height reference that selects which
    /// stacked surfaces can collide with the body. Patches classified
    /// Unknown or Unset never count.
    pub fn evaluate(&self, patches: &[Arc<Patch>], poses: &[Pose2D]) -> PathStats {
        debug_assert_eq!(patches.len(), poses.len());

        let mut robot = FootprintStats::new();
        let mut boundary = FootprintStats::new();
        let mut seen_robot: HashSet<usize> = HashSet::new();
        let mut seen_boundary: HashSet<usize> = HashSet::new();

        let half_x = self.config.robot_size_x / 2.0;
        let half_y = self.config.robot_size_y / 2.0;
        let ring = self.config.cost_function_dist;
        let resolution = self.config.grid_resolution;

        // Cell reach of the enlarged rectangle around any single pose; the
        // rectangle may be rotated, so cover its half diagonal
        let half_diag = (half_x * half_x + half_y * half_y).sqrt();
        let reach = (((half_diag + ring) / resolution).ceil() as i32) + 1;

        for (patch, pose) in patches.iter().zip(poses) {
            let (sin_t, cos_t) = pose.theta.sin_cos();
            let center = patch.index();

            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let cell = GridIndex::new(center.x + dx, center.y + dy);
                    for candidate in self.obstacle_graph.iter_cell(cell) {
                        if (candidate.height() - patch.height()).abs() > self.config.robot_height {
                            continue;
                        }
                        let kind = candidate.kind();
                        if kind != PatchKind::Obstacle && kind != PatchKind::Frontier {
                            continue;
                        }

                        let pos = self.obstacle_graph.position(&candidate);
                        let wx = pos.x - pose.x;
                        let wy = pos.y - pose.y;
                        // Cell center in the robot frame
                        let local_x = cos_t * wx + sin_t * wy;
                        let local_y = -sin_t * wx + cos_t * wy;

                        let inside_robot = local_x.abs() <= half_x && local_y.abs() <= half_y;
                        let inside_ring = !inside_robot
                            && local_x.abs() <= half_x + ring
                            && local_y.abs() <= half_y + ring;

                        let dist = (wx * wx + wy * wy).sqrt();
                        if inside_robot {
                            record(&mut robot, &mut seen_robot, &candidate, kind, dist);
                        } else if inside_ring {
                            record(&mut boundary, &mut seen_boundary, &candidate, kind, dist);
                        }
                    }
                }
            }
        }

        PathStats { robot, boundary }
    }
}

fn record(
    stats: &mut FootprintStats,
    seen: &mut HashSet<usize>,
    patch: &Arc<Patch>,
    kind: PatchKind,
    dist: f32,
) {
    let fresh = seen.insert(patch.id());
    match kind {
        PatchKind::Obstacle => {
            if fresh {
                stats.num_obstacles += 1;
            }
            stats.min_dist_to_obstacles = stats.min_dist_to_obstacles.min(dist);
        }
        PatchKind::Frontier => {
            if fresh {
                stats.num_frontiers += 1;
            }
            stats.min_dist_to_frontiers = stats.min_dist_to_frontiers.min(dist);
        }
        _ => {}
    }
}
