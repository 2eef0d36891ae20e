//! Frontier selection for autonomous exploration.
//!
//! Collects Frontier patches from the driveability layer, estimates an
//! outward-facing heading for each, relocates candidates to reachable
//! collision-free patches, and ranks them by a blended cost of goal
//! distance, explorable area, and travel distance.

use std::collections::HashSet;

use crate::config::{FrontierCostConfig, TraversabilityConfig};
use crate::core::{GridIndex, Pose2D, WorldPoint3};
use crate::error::Result;
use crate::search::dijkstra::DistanceField;
use crate::search::footprint::FootprintEvaluator;
use crate::traversability::{
    visit_breadth_first, PatchId, PatchKind, TraversabilityGraph, VisitControl,
};

/// BFS radius (in cells) of the explorable-area estimate.
const EXPLORE_RADIUS: usize = 3;

/// A ranked exploration target.
#[derive(Debug, Clone)]
pub struct FrontierCandidate {
    /// Driveability patch the robot should drive to
    pub patch: PatchId,
    /// World position of that patch
    pub position: WorldPoint3,
    /// Suggested approach heading in radians
    pub heading: f32,
    /// Blended cost; lower is better
    pub cost: f32,
    /// Fraction of the surrounding square reachable over links
    pub explorable_ratio: f32,
}

impl FrontierCandidate {
    /// Approach orientation as a unit quaternion (w, x, y, z) about the
    /// world z axis.
    pub fn orientation_quaternion(&self) -> [f32; 4] {
        let half = self.heading / 2.0;
        [half.cos(), 0.0, 0.0, half.sin()]
    }
}

/// Ranks frontier patches as exploration targets.
pub struct FrontierSelector<'a> {
    travel_graph: &'a TraversabilityGraph,
    obstacle_graph: &'a TraversabilityGraph,
    config: &'a TraversabilityConfig,
    cost_config: &'a FrontierCostConfig,
}

impl<'a> FrontierSelector<'a> {
    pub fn new(
        travel_graph: &'a TraversabilityGraph,
        obstacle_graph: &'a TraversabilityGraph,
        config: &'a TraversabilityConfig,
        cost_config: &'a FrontierCostConfig,
    ) -> Self {
        Self {
            travel_graph,
            obstacle_graph,
            config,
            cost_config,
        }
    }

    /// Compute ranked exploration candidates.
    ///
    /// `robot_pos` anchors the travel-distance term; `goal_hint` biases the
    /// ranking toward a region of interest. The graphs must already be
    /// expanded around the robot.
    pub fn select(
        &self,
        robot_pos: WorldPoint3,
        goal_hint: WorldPoint3,
    ) -> Result<Vec<FrontierCandidate>> {
        let robot_patch = match self.travel_graph.lookup(robot_pos) {
            Some(p) => p,
            None => {
                tracing::warn!(
                    "frontier selection: robot position ({:.2}, {:.2}) has no patch",
                    robot_pos.x,
                    robot_pos.y
                );
                return Ok(Vec::new());
            }
        };
        let travel_dist = DistanceField::compute(self.travel_graph, robot_patch.id());

        // Stage 1: all frontier patches
        let frontiers: Vec<PatchId> = (0..self.travel_graph.num_patches())
            .filter(|&id| self.travel_graph.patch(id).kind() == PatchKind::Frontier)
            .collect();
        if frontiers.is_empty() {
            return Ok(Vec::new());
        }

        // Stages 2-4: heading estimate, promotion, collision-free relocation
        let mut candidates: Vec<(PatchId, f32)> = Vec::new();
        for frontier in frontiers {
            let heading = self.outward_heading(frontier);
            let promoted = self.promote_to_traversable(frontier);
            if let Some(target) = self.relocate_collision_free(promoted, heading) {
                candidates.push((target, heading));
            }
        }

        // Stage 5: dedup by patch identity
        let mut seen: HashSet<PatchId> = HashSet::new();
        candidates.retain(|(patch, _)| seen.insert(*patch));

        // Stage 6: blended cost
        let mut scored: Vec<FrontierCandidate> = candidates
            .into_iter()
            .filter_map(|(patch_id, heading)| {
                let dist_start = travel_dist.distance(patch_id);
                if !travel_dist.is_reachable(patch_id) {
                    tracing::debug!("frontier candidate {} is unreachable, dropped", patch_id);
                    return None;
                }
                let patch = self.travel_graph.patch(patch_id);
                let position = self.travel_graph.position(&patch);
                Some(FrontierCandidate {
                    patch: patch_id,
                    position,
                    heading,
                    cost: dist_start, // placeholder until normalization below
                    explorable_ratio: self.explorable_ratio(patch_id),
                })
            })
            .collect();

        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let max_goal_dist = scored
            .iter()
            .map(|c| c.position.distance(&goal_hint))
            .fold(f32::EPSILON, f32::max);
        let max_travel = scored
            .iter()
            .map(|c| travel_dist.distance(c.patch))
            .fold(f32::EPSILON, f32::max);

        for candidate in &mut scored {
            let goal_term = candidate.position.distance(&goal_hint) / max_goal_dist;
            let travel_term = travel_dist.distance(candidate.patch) / max_travel;
            candidate.cost = self.cost_config.w_goal * goal_term
                + self.cost_config.w_explore * candidate.explorable_ratio
                + self.cost_config.w_travel * travel_term;
        }

        // Stage 7: ascending cost
        scored.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }

    /// Heading estimate for a frontier patch: `atan2(Σy, Σx)` of a Sobel
    /// pass over the 3x3 neighborhood, counting classified neighbors only,
    /// snapped into the patch's allowed segments when necessary.
    fn outward_heading(&self, frontier: PatchId) -> f32 {
        let patch = self.travel_graph.patch(frontier);
        let mut sum_x = 0.0f32;
        let mut sum_y = 0.0f32;
        for (dx, dy) in [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ] {
            let cell = patch.index().offset(dx, dy);
            let classified = self
                .travel_graph
                .closest_patch(cell, patch.height())
                .map_or(false, |n| {
                    !matches!(n.kind(), PatchKind::Unknown | PatchKind::Unset)
                });
            if classified {
                // Sobel weights: Gx = dx·(2 - |dy|), Gy = dy·(2 - |dx|)
                sum_x += (dx * (2 - dy.abs())) as f32;
                sum_y += (dy * (2 - dx.abs())) as f32;
            }
        }
        let heading = sum_y.atan2(sum_x);

        if patch.heading_allowed(heading) {
            return heading;
        }
        // Snap to the nearest legal orientation on this slope
        patch
            .expanded()
            .and_then(|d| d.allowed_headings.first())
            .map(|segment| segment.midpoint())
            .unwrap_or(heading)
    }

    /// Step a frontier to one of its Traversable neighbors, if any.
    fn promote_to_traversable(&self, frontier: PatchId) -> PatchId {
        let result = self
            .travel_graph
            .patch(frontier)
            .neighbors()
            .find(|&n| self.travel_graph.patch(n).kind() == PatchKind::Traversable)
            .unwrap_or(frontier);
        result
    }

    /// Find a nearby Traversable patch with a clear footprint, searching
    /// breadth-first within `max_neighbor_distance`.
    fn relocate_collision_free(&self, start: PatchId, heading: f32) -> Option<PatchId> {
        let max_depth =
            (self.cost_config.max_neighbor_distance / self.config.grid_resolution).ceil() as usize;
        let evaluator = FootprintEvaluator::new(self.obstacle_graph, self.config);

        let mut found = None;
        visit_breadth_first(self.travel_graph, start, |id, depth| {
            if depth > max_depth {
                return VisitControl {
                    abort: false,
                    visit_children: false,
                };
            }
            let patch = self.travel_graph.patch(id);
            if patch.kind() == PatchKind::Traversable
                && self.footprint_clear(&evaluator, &patch.index(), patch.height(), heading)
            {
                found = Some(id);
                return VisitControl {
                    abort: true,
                    visit_children: false,
                };
            }
            VisitControl {
                abort: false,
                visit_children: true,
            }
        });
        found
    }

    fn footprint_clear(
        &self,
        evaluator: &FootprintEvaluator,
        index: &GridIndex,
        height: f32,
        heading: f32,
    ) -> bool {
        let obstacle_patch = match self.obstacle_graph.closest_patch(*index, height) {
            Some(p) => p,
            None => return false,
        };
        let center = self.obstacle_graph.position(&obstacle_patch);
        let pose = Pose2D::new(center.x, center.y, heading);
        let stats = evaluator.evaluate(&[obstacle_patch], &[pose]);
        !stats.robot.any_violation()
    }

    /// Fraction of the (2R+1)² square around a patch reachable over links.
    fn explorable_ratio(&self, patch: PatchId) -> f32 {
        let side = 2 * EXPLORE_RADIUS + 1;
        let max_visitable = (side * side) as f32;
        let mut visited = 0usize;
        visit_breadth_first(self.travel_graph, patch, |_, depth| {
            visited += 1;
            VisitControl {
                abort: false,
                visit_children: depth < EXPLORE_RADIUS,
            }
        });
        (visited as f32 / max_visitable).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FrontierCostConfig, TraversabilityConfig};
    use crate::mls::MlsMap;
    use crate::traversability::LayerRole;
    use std::sync::Arc;

    /// World where only the left half is mapped; the right half is
    /// unobserved, so frontiers form along the vertical boundary.
    fn half_explored_world() -> (
        Arc<TraversabilityGraph>,
        Arc<TraversabilityGraph>,
        TraversabilityConfig,
    ) {
        let mut config = TraversabilityConfig::default();
        config.robot_size_x = 0.15;
        config.robot_size_y = 0.15;
        config.cost_function_dist = 0.1;

        let mut mls = MlsMap::new(20, 20, 0.1, 0.0, 0.0);
        mls.set_ground(0..10, 0..20, 0.0);
        let mls = Arc::new(mls);

        let travel = Arc::new(TraversabilityGraph::new(
            LayerRole::Driveability,
            mls.clone(),
            config.clone(),
        ));
        let obstacle = Arc::new(TraversabilityGraph::new(
            LayerRole::Obstacle,
            mls,
            config.clone(),
        ));
        let seed = WorldPoint3::new(0.45, 1.05, 0.0);
        travel.expand_all(&[seed]);
        obstacle.expand_all(&[seed]);
        (travel, obstacle, config)
    }

    #[test]
    fn test_candidates_found_at_boundary() {
        let (travel, obstacle, config) = half_explored_world();
        let cost_config = FrontierCostConfig::default();
        let selector = FrontierSelector::new(&travel, &obstacle, &config, &cost_config);

        let robot = WorldPoint3::new(0.45, 1.05, 0.0);
        let hint = WorldPoint3::new(1.5, 1.0, 0.0);
        let candidates = selector.select(robot, hint).unwrap();

        assert!(!candidates.is_empty());
        // Candidates are sorted by ascending cost
        for pair in candidates.windows(2) {
            assert!(pair[0].cost <= pair[1].cost);
        }
        // Every candidate sits on a traversable patch
        for c in &candidates {
            assert_eq!(travel.patch(c.patch).kind(), PatchKind::Traversable);
        }
    }

    #[test]
    fn test_outward_heading_follows_sobel_gradient() {
        let (travel, obstacle, config) = half_explored_world();
        let cost_config = FrontierCostConfig::default();
        let selector = FrontierSelector::new(&travel, &obstacle, &config, &cost_config);

        // Frontier in the last mapped column, mid-height: classified
        // neighbors only in and behind its own column, so Σx = -4, Σy = 0
        // and θ = atan2(0, -4) = π
        let frontier = travel
            .lookup(WorldPoint3::new(0.95, 1.05, 0.0))
            .expect("boundary patch");
        assert_eq!(frontier.kind(), PatchKind::Frontier);

        let heading = selector.outward_heading(frontier.id());
        assert!(
            (heading - std::f32::consts::PI).abs() < 1e-5,
            "heading = {:.4}",
            heading
        );
    }

    #[test]
    fn test_no_candidates_before_expansion() {
        let config = TraversabilityConfig::default();
        let mut mls = MlsMap::new(10, 10, 0.1, 0.0, 0.0);
        mls.set_ground(0..10, 0..10, 0.0);
        let mls = Arc::new(mls);
        let travel = Arc::new(TraversabilityGraph::new(
            LayerRole::Driveability,
            mls.clone(),
            config.clone(),
        ));
        let obstacle = Arc::new(TraversabilityGraph::new(
            LayerRole::Obstacle,
            mls,
            config.clone(),
        ));

        // Nothing expanded: no frontier patches exist yet
        let cost_config = FrontierCostConfig::default();
        let selector = FrontierSelector::new(&travel, &obstacle, &config, &cost_config);
        let robot = WorldPoint3::new(0.55, 0.55, 0.0);
        let candidates = selector.select(robot, robot).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_quaternion_encodes_yaw() {
        let candidate = FrontierCandidate {
            patch: 0,
            position: WorldPoint3::ZERO,
            heading: std::f32::consts::FRAC_PI_2,
            cost: 0.0,
            explorable_ratio: 0.0,
        };
        let [w, x, y, z] = candidate.orientation_quaternion();
        assert!((w - (std::f32::consts::FRAC_PI_4).cos()).abs() < 1e-6);
        assert_eq!(x, 0.0);
        assert_eq!(y, 0.0);
        assert!((z - (std::f32::consts::FRAC_PI_4).sin()).abs() < 1e-6);
    }

    #[test]
    fn test_explorable_ratio_bounded() {
        let (travel, obstacle, config) = half_explored_world();
        let cost_config = FrontierCostConfig::default();
        let selector = FrontierSelector::new(&travel, &obstacle, &config, &cost_config);

        let robot = WorldPoint3::new(0.45, 1.05, 0.0);
        let candidates = selector.select(robot, robot).unwrap();
        for c in &candidates {
            assert!(c.explorable_ratio > 0.0);
            assert!(c.explorable_ratio <= 1.0);
        }
    }
}
