//! Motion primitives and the start-heading indexed lookup table.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::MobilityConfig;
use crate::core::{DiscreteTheta, Pose2D};
use crate::error::{NavError, Result};

/// Integer scaling that converts motion durations (seconds) into the
/// integer costs used by the outer search. Shared by edge costs and the
/// heuristic so the two stay comparable.
pub const COST_SCALE_FACTOR: f32 = 1000.0;

/// Identifier of a motion within its table.
pub type MotionId = usize;

/// Maneuver class of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    Forward,
    Backward,
    PointTurn,
    Lateral,
}

/// A pose along a motion together with the grid cell it falls into.
///
/// Poses are relative to the center of the starting cell; cells are full
/// offsets from the starting cell.
#[derive(Debug, Clone)]
pub struct PoseWithCell {
    pub pose: Pose2D,
    pub cell: (i32, i32),
}

/// A pre-computed short maneuver.
///
/// `trav_steps` traces the motion across driveability cells, `obst_steps`
/// across obstacle-layer cells; `spline_samples` is a dense polyline used
/// only when assembling output trajectories. `id` and `base_cost` are
/// assigned when the motion is loaded into a [`MotionTable`].
#[derive(Debug, Clone)]
pub struct Motion {
    pub id: MotionId,
    /// Cell offset reached by the motion
    pub dx: i32,
    pub dy: i32,
    pub start_theta: DiscreteTheta,
    pub end_theta: DiscreteTheta,
    pub kind: MotionKind,
    /// Planar path length in meters
    pub translation_dist: f32,
    /// Total heading change in radians
    pub angular_dist: f32,
    /// Duration-based cost, scaled by [`COST_SCALE_FACTOR`]; always ≥ 1
    pub base_cost: i32,
    /// Penalty factor for unfavorable maneuver classes
    pub cost_multiplier: f32,
    pub trav_steps: Vec<PoseWithCell>,
    pub obst_steps: Vec<PoseWithCell>,
    pub spline_samples: Vec<Pose2D>,
}

impl Motion {
    /// Duration-based integer cost of a motion.
    ///
    /// Translation and rotation overlap, so the slower of the two bounds
    /// the duration. The result is scaled and never below 1.
    pub fn calculate_cost(
        translation_dist: f32,
        angular_dist: f32,
        translation_speed: f32,
        rotation_speed: f32,
        cost_multiplier: f32,
    ) -> i32 {
        let duration = (translation_dist / translation_speed).max(angular_dist / rotation_speed);
        let cost = (duration * cost_multiplier * COST_SCALE_FACTOR).ceil();
        (cost as i32).max(1)
    }
}

/// Lookup table of motion primitives, indexed by discrete start heading.
pub struct MotionTable {
    /// Buckets indexed by start-theta bin
    theta_to_motions: Vec<Vec<Motion>>,
    num_angles: u32,
    /// Flat motion list indexed by id, for `by_id`
    id_to_motion: Vec<Motion>,
}

impl MotionTable {
    /// Build the table from a primitive list.
    ///
    /// Assigns sequential ids, precomputes base costs from the mobility
    /// limits, and rejects malformed primitives: empty traces, traces that
    /// do not start at (0,0) or end at (Δi, Δj), non-contiguous cell
    /// sequences, and duplicate (Δi, Δj, Δθ) entries within one
    /// start-heading bucket.
    pub fn new(
        motions: Vec<Motion>,
        num_angles: u32,
        mobility: &MobilityConfig,
    ) -> Result<Self> {
        let mut theta_to_motions: Vec<Vec<Motion>> = vec![Vec::new(); num_angles as usize];
        let mut id_to_motion = Vec::with_capacity(motions.len());
        let mut seen: HashSet<(i32, i32, i32, i32)> = HashSet::new();

        for (id, mut motion) in motions.into_iter().enumerate() {
            validate_geometry(&motion)?;

            let delta_theta = motion.end_theta.index() - motion.start_theta.index();
            if !seen.insert((motion.start_theta.index(), motion.dx, motion.dy, delta_theta)) {
                return Err(NavError::InvalidPrimitive(format!(
                    "duplicate primitive (Δ=({}, {}), Δθ={}) for start theta {}",
                    motion.dx, motion.dy, delta_theta, motion.start_theta
                )));
            }

            motion.id = id;
            motion.base_cost = Motion::calculate_cost(
                motion.translation_dist,
                motion.angular_dist,
                mobility.translation_speed,
                mobility.rotation_speed,
                motion.cost_multiplier,
            );

            let bucket = motion.start_theta.index() as usize;
            if bucket >= theta_to_motions.len() {
                return Err(NavError::InvalidPrimitive(format!(
                    "start theta {} outside [0, {})",
                    motion.start_theta, num_angles
                )));
            }
            theta_to_motions[bucket].push(motion.clone());
            id_to_motion.push(motion);
        }

        Ok(Self {
            theta_to_motions,
            num_angles,
            id_to_motion,
        })
    }

    /// Number of discrete heading bins.
    #[inline]
    pub fn num_angles(&self) -> u32 {
        self.num_angles
    }

    /// Total number of primitives.
    #[inline]
    pub fn len(&self) -> usize {
        self.id_to_motion.len()
    }

    /// Whether the table holds no primitives.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id_to_motion.is_empty()
    }

    /// Primitives applicable from the given start heading.
    pub fn for_start_theta(&self, theta: DiscreteTheta) -> &[Motion] {
        &self.theta_to_motions[theta.index() as usize]
    }

    /// Primitive by id.
    pub fn by_id(&self, id: MotionId) -> &Motion {
        &self.id_to_motion[id]
    }
}

/// Check the cell-trace invariants of a primitive.
fn validate_geometry(motion: &Motion) -> std::result::Result<(), NavError> {
    let trace = &motion.trav_steps;
    let (Some(first), Some(last)) = (trace.first(), trace.last()) else {
        return Err(NavError::InvalidPrimitive(
            "primitive has no intermediate steps".into(),
        ));
    };
    if first.cell != (0, 0) {
        return Err(NavError::InvalidPrimitive(format!(
            "first intermediate cell is {:?}, expected (0, 0)",
            first.cell
        )));
    }
    if last.cell != (motion.dx, motion.dy) {
        return Err(NavError::InvalidPrimitive(format!(
            "last intermediate cell is {:?}, expected ({}, {})",
            last.cell, motion.dx, motion.dy
        )));
    }
    for pair in trace.windows(2) {
        let (ax, ay) = pair[0].cell;
        let (bx, by) = pair[1].cell;
        if (ax - bx).abs() > 1 || (ay - by).abs() > 1 {
            return Err(NavError::InvalidPrimitive(format!(
                "cells {:?} and {:?} are not 8-connected",
                pair[0].cell, pair[1].cell
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_motion(start_bin: i32, dx: i32, dy: i32) -> Motion {
        let start_theta = DiscreteTheta::new(start_bin, 16);
        let heading = start_theta.to_radian();
        let cells: Vec<(i32, i32)> = if (dx, dy) == (0, 0) {
            vec![(0, 0)]
        } else {
            vec![(0, 0), (dx, dy)]
        };
        let steps: Vec<PoseWithCell> = cells
            .iter()
            .map(|&(cx, cy)| PoseWithCell {
                pose: Pose2D::new(cx as f32 * 0.1, cy as f32 * 0.1, heading),
                cell: (cx, cy),
            })
            .collect();
        Motion {
            id: 0,
            dx,
            dy,
            start_theta,
            end_theta: start_theta,
            kind: MotionKind::Forward,
            translation_dist: 0.1 * ((dx * dx + dy * dy) as f32).sqrt(),
            angular_dist: 0.0,
            base_cost: 0,
            cost_multiplier: 1.0,
            trav_steps: steps.clone(),
            obst_steps: steps,
            spline_samples: Vec::new(),
        }
    }

    #[test]
    fn test_calculate_cost_floor_is_one() {
        assert_eq!(Motion::calculate_cost(0.0, 0.0, 0.5, 1.0, 1.0), 1);
    }

    #[test]
    fn test_calculate_cost_takes_slower_axis() {
        // 1m at 0.5 m/s = 2s; 0.5 rad at 1 rad/s = 0.5s
        let cost = Motion::calculate_cost(1.0, 0.5, 0.5, 1.0, 1.0);
        assert_eq!(cost, 2000);

        // Rotation dominates
        let cost = Motion::calculate_cost(0.1, 3.0, 0.5, 1.0, 1.0);
        assert_eq!(cost, 3000);
    }

    #[test]
    fn test_table_indexes_by_start_theta() {
        let motions = vec![
            straight_motion(0, 1, 0),
            straight_motion(0, -1, 0),
            straight_motion(4, 0, 1),
        ];
        let table = MotionTable::new(motions, 16, &MobilityConfig::default()).unwrap();

        assert_eq!(table.for_start_theta(DiscreteTheta::new(0, 16)).len(), 2);
        assert_eq!(table.for_start_theta(DiscreteTheta::new(4, 16)).len(), 1);
        assert!(table.for_start_theta(DiscreteTheta::new(1, 16)).is_empty());

        // Ids are sequential and resolvable
        for id in 0..table.len() {
            assert_eq!(table.by_id(id).id, id);
        }
        // Base costs were computed
        assert!(table.by_id(0).base_cost >= 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let motions = vec![straight_motion(0, 1, 0), straight_motion(0, 1, 0)];
        let result = MotionTable::new(motions, 16, &MobilityConfig::default());
        assert!(matches!(result, Err(NavError::InvalidPrimitive(_))));
    }

    #[test]
    fn test_bad_final_cell_rejected() {
        let mut motion = straight_motion(0, 1, 0);
        motion.dx = 2; // final trace cell no longer matches
        let result = MotionTable::new(vec![motion], 16, &MobilityConfig::default());
        assert!(matches!(result, Err(NavError::InvalidPrimitive(_))));
    }

    #[test]
    fn test_gap_in_trace_rejected() {
        let mut motion = straight_motion(0, 2, 0);
        // (0,0) -> (2,0) skips a cell
        motion.trav_steps = vec![
            PoseWithCell {
                pose: Pose2D::new(0.0, 0.0, 0.0),
                cell: (0, 0),
            },
            PoseWithCell {
                pose: Pose2D::new(0.2, 0.0, 0.0),
                cell: (2, 0),
            },
        ];
        let result = MotionTable::new(vec![motion], 16, &MobilityConfig::default());
        assert!(matches!(result, Err(NavError::InvalidPrimitive(_))));
    }

    #[test]
    fn test_point_turn_single_cell_is_legal() {
        let mut motion = straight_motion(0, 0, 0);
        motion.kind = MotionKind::PointTurn;
        motion.end_theta = DiscreteTheta::new(1, 16);
        motion.angular_dist = motion.end_theta.shortest_dist_rad(&motion.start_theta);
        let table = MotionTable::new(vec![motion], 16, &MobilityConfig::default()).unwrap();
        assert_eq!(table.len(), 1);
    }
}
