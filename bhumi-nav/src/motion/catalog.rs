//! Analytic motion primitive set.
//!
//! Straight moves along the 8 compass directions, point turns, and lateral
//! steps. A spline-based front-end can supply richer primitives; this set
//! is enough for skid-steer vehicles and for exercising the planner.

use crate::core::{DiscreteTheta, Pose2D};

use super::primitives::{Motion, MotionKind, PoseWithCell};

/// Cell offsets of the 8 compass directions, by multiples of 45°.
const COMPASS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Build the analytic primitive set for a heading discretization.
///
/// Per start heading: point turns to the two adjacent bins. Per start
/// heading aligned with a compass direction: forward moves of one and two
/// cells, a backward move, and lateral steps to both sides.
pub fn straight_line_catalog(num_angles: u32, grid_resolution: f32) -> Vec<Motion> {
    let mut motions = Vec::new();

    for bin in 0..num_angles as i32 {
        let start_theta = DiscreteTheta::new(bin, num_angles);

        for delta in [-1i32, 1] {
            motions.push(point_turn(start_theta, delta));
        }

        // Straight moves only where the heading lines up with a compass cell
        // direction
        if (bin * 8) % num_angles as i32 != 0 {
            continue;
        }
        let dir = ((bin * 8) / num_angles as i32).rem_euclid(8) as usize;

        for cells in [1, 2] {
            motions.push(straight(
                start_theta,
                COMPASS[dir],
                cells,
                MotionKind::Forward,
                grid_resolution,
            ));
        }
        motions.push(straight(
            start_theta,
            COMPASS[(dir + 4) % 8],
            1,
            MotionKind::Backward,
            grid_resolution,
        ));
        for side in [2usize, 6] {
            motions.push(straight(
                start_theta,
                COMPASS[(dir + side) % 8],
                1,
                MotionKind::Lateral,
                grid_resolution,
            ));
        }
    }

    motions
}

fn point_turn(start_theta: DiscreteTheta, delta: i32) -> Motion {
    let end_theta = start_theta + delta;
    let steps = vec![
        PoseWithCell {
            pose: Pose2D::new(0.0, 0.0, start_theta.to_radian()),
            cell: (0, 0),
        },
        PoseWithCell {
            pose: Pose2D::new(0.0, 0.0, end_theta.to_radian()),
            cell: (0, 0),
        },
    ];
    Motion {
        id: 0,
        dx: 0,
        dy: 0,
        start_theta,
        end_theta,
        kind: MotionKind::PointTurn,
        translation_dist: 0.0,
        angular_dist: start_theta.shortest_dist_rad(&end_theta),
        base_cost: 0,
        cost_multiplier: 1.0,
        trav_steps: steps.clone(),
        obst_steps: steps,
        spline_samples: vec![Pose2D::new(0.0, 0.0, end_theta.to_radian())],
    }
}

fn straight(
    start_theta: DiscreteTheta,
    offset: (i32, i32),
    cells: i32,
    kind: MotionKind,
    grid_resolution: f32,
) -> Motion {
    let heading = start_theta.to_radian();
    let (ox, oy) = offset;
    let (dx, dy) = (ox * cells, oy * cells);

    let sample = |t: f32| -> PoseWithCell {
        let x = t * dx as f32 * grid_resolution;
        let y = t * dy as f32 * grid_resolution;
        PoseWithCell {
            pose: Pose2D::new(x, y, heading),
            cell: (
                (t * dx as f32).round() as i32,
                (t * dy as f32).round() as i32,
            ),
        }
    };

    // Two samples per cell keep consecutive cells 8-connected
    let n = 2 * cells;
    let steps: Vec<PoseWithCell> = (0..=n).map(|i| sample(i as f32 / n as f32)).collect();

    let dense = 5 * cells;
    let spline_samples: Vec<Pose2D> = (0..=dense)
        .map(|i| sample(i as f32 / dense as f32).pose)
        .collect();

    let cell_len = ((ox * ox + oy * oy) as f32).sqrt() * grid_resolution;
    let cost_multiplier = match kind {
        MotionKind::Forward => 1.0,
        MotionKind::Backward => 2.0,
        MotionKind::Lateral => 2.5,
        MotionKind::PointTurn => 1.0,
    };

    Motion {
        id: 0,
        dx,
        dy,
        start_theta,
        end_theta: start_theta,
        kind,
        translation_dist: cell_len * cells as f32,
        angular_dist: 0.0,
        base_cost: 0,
        cost_multiplier,
        trav_steps: steps.clone(),
        obst_steps: steps,
        spline_samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MobilityConfig;
    use crate::motion::MotionTable;

    #[test]
    fn test_catalog_loads_into_table() {
        let motions = straight_line_catalog(16, 0.1);
        let table = MotionTable::new(motions, 16, &MobilityConfig::default()).unwrap();
        assert!(!table.is_empty());

        // Every bin has at least the two point turns
        for bin in 0..16 {
            let bucket = table.for_start_theta(DiscreteTheta::new(bin, 16));
            assert!(bucket.len() >= 2, "bin {} has {} motions", bin, bucket.len());
        }

        // Compass-aligned bins also carry straight moves
        let bucket = table.for_start_theta(DiscreteTheta::new(0, 16));
        assert!(bucket.iter().any(|m| m.kind == MotionKind::Forward));
        assert!(bucket.iter().any(|m| m.kind == MotionKind::Backward));
        assert!(bucket.iter().any(|m| m.kind == MotionKind::Lateral));
    }

    #[test]
    fn test_forward_motion_geometry() {
        let motions = straight_line_catalog(16, 0.1);
        let fwd = motions
            .iter()
            .find(|m| {
                m.kind == MotionKind::Forward && m.start_theta.index() == 0 && m.dx == 2
            })
            .unwrap();

        assert_eq!(fwd.dy, 0);
        assert_eq!(fwd.trav_steps.first().unwrap().cell, (0, 0));
        assert_eq!(fwd.trav_steps.last().unwrap().cell, (2, 0));
        assert!((fwd.translation_dist - 0.2).abs() < 1e-6);
        assert_eq!(fwd.angular_dist, 0.0);
    }

    #[test]
    fn test_diagonal_forward_length() {
        let motions = straight_line_catalog(16, 0.1);
        let diag = motions
            .iter()
            .find(|m| {
                m.kind == MotionKind::Forward && m.start_theta.index() == 2 && m.dx == 1 && m.dy == 1
            })
            .unwrap();
        assert!((diag.translation_dist - 0.1 * std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_point_turn_stays_in_cell() {
        let motions = straight_line_catalog(16, 0.1);
        let turn = motions.iter().find(|m| m.kind == MotionKind::PointTurn).unwrap();
        assert_eq!((turn.dx, turn.dy), (0, 0));
        assert!(turn.trav_steps.iter().all(|s| s.cell == (0, 0)));
        assert!(turn.angular_dist > 0.0);
    }
}
