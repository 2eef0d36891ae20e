//! The search environment: discrete states, successors, costs, heuristic.
//!
//! Presents the terrain as integer state ids to a heuristic graph search.
//! A state is a (driveability patch, discrete heading) pair. Successor
//! enumeration applies pre-computed motion primitives, tracing each one
//! across the driveability layer for reachability and across the obstacle
//! layer for body collisions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{MobilityConfig, SlopeMetric, TraversabilityConfig};
use crate::core::{DiscreteTheta, GridIndex, Pose2D, WorldPoint3};
use crate::error::{NavError, Result};
use crate::mls::MlsMap;
use crate::motion::{Motion, MotionId, MotionKind, MotionTable, COST_SCALE_FACTOR};
use crate::search::dijkstra::DistanceField;
use crate::search::footprint::FootprintEvaluator;
use crate::search::state::{StateId, StateTable};
use crate::traversability::{LayerRole, Patch, PatchId, PatchKind, TraversabilityGraph};

/// One expanded search edge.
#[derive(Debug, Clone, Copy)]
pub struct Successor {
    pub state: StateId,
    pub cost: i32,
    pub motion: MotionId,
}

/// A drivable piece of an output trajectory.
#[derive(Debug, Clone)]
pub struct TrajectorySegment {
    /// Polyline in world coordinates, z from the terrain
    pub points: Vec<WorldPoint3>,
    /// Signed drive speed in m/s; negative for backward motions
    pub speed: f32,
    pub kind: MotionKind,
}

/// Result of an escape search from inside an obstacle.
#[derive(Debug, Clone)]
pub struct EscapeTrajectory {
    pub segment: TrajectorySegment,
    /// Pose to re-plan from once the escape is driven
    pub new_start: WorldPoint3,
    pub new_start_theta: f32,
}

struct Anchor {
    state: StateId,
    patch: PatchId,
    theta: DiscreteTheta,
}

struct Heuristic {
    to_goal: DistanceField,
    from_start: DistanceField,
    goal_theta: DiscreteTheta,
    start_theta: DiscreteTheta,
}

/// Planner environment over a Multi-Level-Surface map.
pub struct SearchEnvironment {
    config: TraversabilityConfig,
    mobility: MobilityConfig,
    mls: Arc<MlsMap>,
    travel_graph: Arc<TraversabilityGraph>,
    obstacle_graph: Arc<TraversabilityGraph>,
    motions: Arc<MotionTable>,
    states: StateTable,
    start: Option<Anchor>,
    goal: Option<Anchor>,
    /// Read-only after `set_goal` completes
    heuristic: Option<Heuristic>,
}

impl SearchEnvironment {
    /// Create an environment over a map with the given primitive table.
    pub fn new(
        mls: Arc<MlsMap>,
        config: TraversabilityConfig,
        mobility: MobilityConfig,
        motions: Arc<MotionTable>,
    ) -> Self {
        let travel_graph = Arc::new(TraversabilityGraph::new(
            LayerRole::Driveability,
            mls.clone(),
            config.clone(),
        ));
        let obstacle_graph = Arc::new(TraversabilityGraph::new(
            LayerRole::Obstacle,
            mls.clone(),
            config.clone(),
        ));
        Self {
            config,
            mobility,
            mls,
            travel_graph,
            obstacle_graph,
            motions,
            states: StateTable::new(),
            start: None,
            goal: None,
            heuristic: None,
        }
    }

    /// Driveability-layer graph.
    pub fn travel_graph(&self) -> &Arc<TraversabilityGraph> {
        &self.travel_graph
    }

    /// Obstacle-layer graph.
    pub fn obstacle_graph(&self) -> &Arc<TraversabilityGraph> {
        &self.obstacle_graph
    }

    /// Motion primitive table.
    pub fn motions(&self) -> &Arc<MotionTable> {
        &self.motions
    }

    /// Number of states created so far.
    pub fn num_states(&self) -> usize {
        self.states.num_states()
    }

    /// Reset all planning state. The graphs and state table start over;
    /// the map and primitives are kept.
    pub fn clear(&mut self) {
        self.travel_graph.clear();
        self.obstacle_graph.clear();
        self.states.clear();
        self.start = None;
        self.goal = None;
        self.heuristic = None;
    }

    /// Pre-expand both layers from seed positions.
    pub fn expand_map(&self, positions: &[WorldPoint3]) {
        self.travel_graph.expand_all(positions);
        self.obstacle_graph.expand_all(positions);
    }

    /// Create the start state.
    ///
    /// Fails if the pose is outside the map (`MapOutOfBounds`), no
    /// traversable patch exists there (`StateCreationFailed`), the slope
    /// disallows the heading (`OrientationNotAllowed`), or the robot
    /// footprint overlaps obstacles or frontiers (`ObstacleCheckFailed`).
    pub fn set_start(&mut self, pos: WorldPoint3, theta: f32) -> Result<StateId> {
        let anchor = self.create_anchor("start", pos, theta, true)?;
        tracing::info!(
            "start state {} at ({:.2}, {:.2}, {:.2})",
            anchor.state,
            pos.x,
            pos.y,
            pos.z
        );
        let id = anchor.state;
        self.start = Some(anchor);
        self.goal = None;
        self.heuristic = None;
        Ok(id)
    }

    /// Create the goal state and precompute the heuristic distance fields.
    ///
    /// The start must be set first. Fails like [`set_start`](Self::set_start).
    pub fn set_goal(&mut self, pos: WorldPoint3, theta: f32) -> Result<StateId> {
        let start = self
            .start
            .as_ref()
            .ok_or_else(|| NavError::StateCreationFailed("start must be set before goal".into()))?;
        let start_patch = start.patch;
        let start_theta = start.theta;

        let anchor = self.create_anchor("goal", pos, theta, false)?;
        tracing::info!(
            "goal state {} at ({:.2}, {:.2}, {:.2})",
            anchor.state,
            pos.x,
            pos.y,
            pos.z
        );

        let heuristic = Heuristic {
            to_goal: DistanceField::compute(&self.travel_graph, anchor.patch),
            from_start: DistanceField::compute(&self.travel_graph, start_patch),
            goal_theta: anchor.theta,
            start_theta,
        };
        let id = anchor.state;
        self.goal = Some(anchor);
        self.heuristic = Some(heuristic);
        Ok(id)
    }

    /// Shared start/goal creation: patch generation, expansion, orientation
    /// and footprint checks, state allocation.
    fn create_anchor(
        &self,
        name: &str,
        pos: WorldPoint3,
        theta: f32,
        expand_layers: bool,
    ) -> Result<Anchor> {
        if self.mls.to_grid(pos.x, pos.y).is_none() {
            return Err(NavError::MapOutOfBounds { x: pos.x, y: pos.y });
        }

        let theta_disc = DiscreteTheta::from_radian(theta, self.motions.num_angles());

        let patch = self.travel_graph.generate_start_patch(pos).ok_or_else(|| {
            NavError::StateCreationFailed(format!("no surface patch at {} pose", name))
        })?;
        if !self.travel_graph.expand(&patch) {
            return Err(NavError::StateCreationFailed(format!(
                "{} pose is not traversable ({:?})",
                name,
                patch.kind()
            )));
        }

        let obstacle_patch = self
            .obstacle_graph
            .generate_start_patch(pos)
            .ok_or_else(|| {
                NavError::ObstacleCheckFailed(format!("no obstacle-layer patch at {} pose", name))
            })?;

        if expand_layers {
            self.travel_graph.expand_from(&patch);
            self.obstacle_graph.expand_from(&obstacle_patch);
        }

        // The heading check needs the discretized angle so that external
        // and internal checks agree on the same pose
        if self.config.enable_incline_limit && !patch.heading_allowed(theta_disc.to_radian()) {
            return Err(NavError::OrientationNotAllowed(format!(
                "{} heading {:.2} rad exceeds roll/pitch limits",
                name,
                theta_disc.to_radian()
            )));
        }

        self.obstacle_graph.expand(&obstacle_patch);
        let center = self.obstacle_graph.position(&obstacle_patch);
        let check_pose = Pose2D::new(center.x, center.y, theta_disc.to_radian());
        let evaluator = FootprintEvaluator::new(&self.obstacle_graph, &self.config);
        let stats = evaluator.evaluate(&[obstacle_patch], &[check_pose]);
        if stats.robot.any_violation() {
            return Err(NavError::ObstacleCheckFailed(format!(
                "{} footprint hits {} obstacle and {} frontier patches",
                name, stats.robot.num_obstacles, stats.robot.num_frontiers
            )));
        }

        let node = self.states.find_or_create_xyz(&patch, patch.height());
        let state = self.states.find_or_create_state(node, theta_disc);
        Ok(Anchor {
            state,
            patch: patch.id(),
            theta: theta_disc,
        })
    }

    /// World position of a state (cell center, patch height).
    pub fn state_position(&self, state: StateId) -> WorldPoint3 {
        let (node, _) = self.states.state(state);
        let (x, y) = self.mls.from_grid(node.index);
        WorldPoint3::new(x, y, node.height)
    }

    /// Discrete heading of a state.
    pub fn state_theta(&self, state: StateId) -> DiscreteTheta {
        self.states.state(state).1
    }

    /// Expand all feasible motions from a state.
    ///
    /// Infeasible primitives are skipped silently; an inconsistency between
    /// a primitive's declared offset and its walked trace is fatal.
    pub fn get_successors(&self, state: StateId) -> Result<Vec<Successor>> {
        let (node, theta) = self.states.state(state);
        let patch = self.travel_graph.patch(node.patch);

        if !self.travel_graph.expand(&patch) {
            tracing::debug!("state {} sits on undriveable terrain, no successors", state);
            return Ok(Vec::new());
        }

        let source_pos = self.travel_graph.position(&patch);
        let source_obstacle = match self
            .obstacle_graph
            .closest_patch(patch.index(), patch.height())
        {
            Some(p) => p,
            None => {
                tracing::warn!("no obstacle-layer patch under state {}", state);
                return Ok(Vec::new());
            }
        };

        let motions = self.motions.for_start_theta(theta);
        let successors = Mutex::new(Vec::new());
        let failure: Mutex<Option<NavError>> = Mutex::new(None);

        let eval = |motion: &Motion| {
            match self.evaluate_motion(motion, &patch, &source_obstacle, source_pos) {
                Ok(Some(successor)) => successors.lock().push(successor),
                Ok(None) => {}
                Err(e) => *failure.lock() = Some(e),
            }
        };

        if self.config.parallel_enabled && motions.len() > 1 {
            let workers = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .min(motions.len());
            let chunk_size = motions.len().div_ceil(workers);
            let eval = &eval;
            std::thread::scope(|scope| {
                for chunk in motions.chunks(chunk_size) {
                    scope.spawn(move || chunk.iter().for_each(eval));
                }
            });
        } else {
            motions.iter().for_each(eval);
        }

        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        Ok(successors.into_inner())
    }

    /// Check one primitive from a source state; `None` means infeasible.
    fn evaluate_motion(
        &self,
        motion: &Motion,
        source: &Arc<Patch>,
        source_obstacle: &Arc<Patch>,
        source_pos: WorldPoint3,
    ) -> Result<Option<Successor>> {
        // Trace the motion across the driveability layer
        let goal_patch = match self.walk_layer(&self.travel_graph, source, &motion.trav_steps) {
            Some(p) => p,
            None => return Ok(None),
        };

        let expected = source.index().offset(motion.dx, motion.dy);
        if goal_patch.index() != expected {
            return Err(NavError::InternalInvariant(format!(
                "motion {} ends at {:?}, walked trace ends at {:?}",
                motion.id,
                expected,
                goal_patch.index()
            )));
        }

        // Re-trace across the obstacle layer, collecting swept poses
        let mut obstacle_path: Vec<Arc<Patch>> = Vec::with_capacity(motion.obst_steps.len());
        let mut swept_poses: Vec<Pose2D> = Vec::with_capacity(motion.obst_steps.len());
        let mut current = source_obstacle.clone();
        let mut current_idx = source_obstacle.index();
        for step in &motion.obst_steps {
            let next_idx = source_obstacle.index().offset(step.cell.0, step.cell.1);
            current = match self.step_layer(&self.obstacle_graph, &current, current_idx, next_idx) {
                Some(p) => p,
                None => return Ok(None),
            };
            if self.config.enable_incline_limit && !current.heading_allowed(step.pose.theta) {
                return Ok(None);
            }
            obstacle_path.push(current.clone());
            swept_poses.push(step.pose.translated(source_pos.x, source_pos.y));
            current_idx = next_idx;
        }

        let evaluator = FootprintEvaluator::new(&self.obstacle_graph, &self.config);
        let stats = evaluator.evaluate(&obstacle_path, &swept_poses);
        if stats.robot.any_violation() {
            return Ok(None);
        }

        // Allocate the successor state
        let node = self
            .states
            .find_or_create_xyz(&goal_patch, goal_patch.height());
        let state = self.states.find_or_create_state(node, motion.end_theta);

        // Slope-dependent edge cost
        let mut cost = match self.config.slope_metric {
            SlopeMetric::None => motion.base_cost as f32,
            SlopeMetric::AvgSlope => {
                let avg = obstacle_path.iter().map(|p| p.slope()).sum::<f32>()
                    / obstacle_path.len().max(1) as f32;
                motion.base_cost as f32 * (1.0 + avg * self.config.slope_metric_scale)
            }
            SlopeMetric::MaxSlope => {
                let max = obstacle_path.iter().map(|p| p.slope()).fold(0.0, f32::max);
                motion.base_cost as f32 * (1.0 + max * self.config.slope_metric_scale)
            }
            SlopeMetric::TriangleSlope => {
                // Extrapolate the motion length into the third dimension
                let dz = (source_pos.z - goal_patch.height()).abs();
                let len3d = (motion.translation_dist * motion.translation_dist + dz * dz).sqrt();
                Motion::calculate_cost(
                    len3d,
                    motion.angular_dist,
                    self.mobility.translation_speed,
                    self.mobility.rotation_speed,
                    motion.cost_multiplier,
                ) as f32
            }
        };

        // Proximity penalties from the boundary ring
        let outer = self.config.cost_function_dist;
        if stats.boundary.num_obstacles > 0 {
            let min_dist = stats.boundary.min_dist_to_obstacles.min(outer);
            cost += cost * (outer - min_dist) / outer;
        }
        if stats.boundary.num_frontiers > 0 {
            let min_dist = stats.boundary.min_dist_to_frontiers.min(outer);
            cost += cost * (outer - min_dist) / outer;
        }

        let cost = (cost.min(i32::MAX as f32) as i32).max(motion.base_cost);
        debug_assert!(motion.base_cost > 0);

        Ok(Some(Successor {
            state,
            cost,
            motion: motion.id,
        }))
    }

    /// Walk a primitive's cell trace over a layer following neighbor links.
    fn walk_layer(
        &self,
        graph: &TraversabilityGraph,
        source: &Arc<Patch>,
        steps: &[crate::motion::PoseWithCell],
    ) -> Option<Arc<Patch>> {
        let mut current = source.clone();
        let mut current_idx = source.index();
        for step in steps {
            let next_idx = source.index().offset(step.cell.0, step.cell.1);
            current = self.step_layer(graph, &current, current_idx, next_idx)?;
            current_idx = next_idx;
        }
        Some(current)
    }

    /// One step along neighbor links; expands the target patch on demand
    /// and requires it to be Traversable.
    fn step_layer(
        &self,
        graph: &TraversabilityGraph,
        from: &Arc<Patch>,
        from_idx: GridIndex,
        to_idx: GridIndex,
    ) -> Option<Arc<Patch>> {
        if to_idx == from_idx {
            return Some(from.clone());
        }
        let target_id = from.neighbor_toward(to_idx)?;
        let target = graph.patch(target_id);
        if !graph.expand(&target) {
            return None;
        }
        debug_assert_eq!(target.kind(), PatchKind::Traversable);
        Some(target)
    }

    /// Admissible estimate of the remaining time to the goal, scaled by
    /// [`COST_SCALE_FACTOR`].
    pub fn get_goal_heuristic(&self, state: StateId) -> Result<i32> {
        let heuristic = self
            .heuristic
            .as_ref()
            .ok_or_else(|| NavError::InternalInvariant("heuristic queried before set_goal".into()))?;
        let (node, theta) = self.states.state(state);

        let time_translation =
            heuristic.to_goal.distance(node.patch) / self.mobility.translation_speed;
        let time_rotation =
            theta.shortest_dist_rad(&heuristic.goal_theta) / self.mobility.rotation_speed;
        Ok(scale_time(time_translation.max(time_rotation)))
    }

    /// Admissible estimate of the time from the start to this state.
    pub fn get_start_heuristic(&self, state: StateId) -> Result<i32> {
        let heuristic = self
            .heuristic
            .as_ref()
            .ok_or_else(|| NavError::InternalInvariant("heuristic queried before set_goal".into()))?;
        let (node, theta) = self.states.state(state);

        let time_translation =
            heuristic.from_start.distance(node.patch) / self.mobility.translation_speed;
        let time_rotation =
            theta.shortest_dist_rad(&heuristic.start_theta) / self.mobility.rotation_speed;
        Ok(scale_time(time_translation.max(time_rotation)))
    }

    /// The cheapest motion connecting two adjacent states.
    pub fn get_motion(&self, from: StateId, to: StateId) -> Result<MotionId> {
        let successors = self.get_successors(from)?;
        successors
            .iter()
            .filter(|s| s.state == to)
            .min_by_key(|s| s.cost)
            .map(|s| s.motion)
            .ok_or_else(|| {
                NavError::InternalInvariant(format!("no motion connects state {} to {}", from, to))
            })
    }

    /// Motions along a state-id path.
    pub fn get_motions(&self, path: &[StateId]) -> Result<Vec<MotionId>> {
        path.windows(2)
            .map(|pair| self.get_motion(pair[0], pair[1]))
            .collect()
    }

    /// Assemble the drivable trajectory for a state-id path.
    ///
    /// Each edge contributes one segment built from the motion's dense
    /// spline samples, with heights taken from the patches crossed.
    pub fn trajectory(&self, path: &[StateId]) -> Result<Vec<TrajectorySegment>> {
        let mut segments = Vec::new();
        if path.len() < 2 {
            return Ok(segments);
        }

        let resolution = self.mls.resolution();
        for pair in path.windows(2) {
            let motion_id = self.get_motion(pair[0], pair[1])?;
            let motion = self.motions.by_id(motion_id);
            let start = self.state_position(pair[0]);
            let (start_node, _) = self.states.state(pair[0]);
            let mut current = self.travel_graph.patch(start_node.patch);
            let mut current_idx = current.index();

            let mut points: Vec<WorldPoint3> = Vec::with_capacity(motion.spline_samples.len());
            for sample in &motion.spline_samples {
                let cell = start_node.index.offset(
                    (sample.x / resolution).round() as i32,
                    (sample.y / resolution).round() as i32,
                );
                if cell != current_idx {
                    let next = current.neighbor_toward(cell).ok_or_else(|| {
                        NavError::InternalInvariant(
                            "trajectory is not continuous on the driveability grid".into(),
                        )
                    })?;
                    current = self.travel_graph.patch(next);
                    current_idx = cell;
                }
                let point =
                    WorldPoint3::new(start.x + sample.x, start.y + sample.y, current.height());
                if points.last().map_or(true, |last| {
                    last.distance_squared(&point) > 1e-10
                }) {
                    points.push(point);
                }
            }

            let speed = match motion.kind {
                MotionKind::Backward => -self.mobility.translation_speed,
                _ => self.mobility.translation_speed,
            };
            segments.push(TrajectorySegment {
                points,
                speed,
                kind: motion.kind,
            });
        }
        Ok(segments)
    }

    /// Find the primitive that best drives the robot out of an obstacle.
    ///
    /// Considers every primitive for the start heading, walking obstacle
    /// links without traversability checks. The end pose must be violation
    /// free; among those, the motion sweeping the fewest obstacle and
    /// frontier patches wins. `NoEscape` if no primitive qualifies.
    pub fn find_escape_trajectory(&self, pos: WorldPoint3, theta: f32) -> Result<EscapeTrajectory> {
        let start_patch = self.travel_graph.generate_start_patch(pos).ok_or_else(|| {
            NavError::StateCreationFailed("no surface patch at escape start".into())
        })?;
        if !start_patch.is_expanded() {
            return Err(NavError::StateCreationFailed(
                "cannot search for an escape before the map is expanded".into(),
            ));
        }

        let theta_disc = DiscreteTheta::from_radian(theta, self.motions.num_angles());
        let start_obstacle = self
            .obstacle_graph
            .closest_patch(start_patch.index(), start_patch.height())
            .ok_or_else(|| {
                NavError::StateCreationFailed("no obstacle-layer patch at escape start".into())
            })?;
        let start_pos = self.obstacle_graph.position(&start_obstacle);
        let evaluator = FootprintEvaluator::new(&self.obstacle_graph, &self.config);

        let mut best: Option<(usize, EscapeTrajectory)> = None;

        'motions: for motion in self.motions.for_start_theta(theta_disc) {
            let mut path: Vec<Arc<Patch>> = Vec::with_capacity(motion.obst_steps.len());
            let mut poses: Vec<Pose2D> = Vec::with_capacity(motion.obst_steps.len());
            let mut current = start_obstacle.clone();
            let mut current_idx = start_obstacle.index();

            for step in &motion.obst_steps {
                let next_idx = start_obstacle.index().offset(step.cell.0, step.cell.1);
                if next_idx != current_idx {
                    // Links only; the whole point is to drive across
                    // non-traversable terrain
                    match current.neighbor_toward(next_idx) {
                        Some(id) => current = self.obstacle_graph.patch(id),
                        None => continue 'motions,
                    }
                    current_idx = next_idx;
                }
                path.push(current.clone());
                poses.push(step.pose.translated(start_pos.x, start_pos.y));
            }

            let end_patch = match path.last() {
                Some(p) => p.clone(),
                None => continue,
            };
            let end_world = self.obstacle_graph.position(&end_patch);
            let end_pose = Pose2D::new(end_world.x, end_world.y, motion.end_theta.to_radian());
            let end_stats = evaluator.evaluate(&[end_patch.clone()], &[end_pose]);
            if end_stats.robot.any_violation() {
                continue;
            }

            let sweep_stats = evaluator.evaluate(&path, &poses);
            let violations =
                sweep_stats.robot.num_obstacles + sweep_stats.robot.num_frontiers;

            if best.as_ref().map_or(true, |(count, _)| violations < *count) {
                let points: Vec<WorldPoint3> = path
                    .iter()
                    .zip(&poses)
                    .map(|(patch, pose)| WorldPoint3::new(pose.x, pose.y, patch.height()))
                    .collect();
                let speed = match motion.kind {
                    MotionKind::Backward => -self.mobility.translation_speed,
                    _ => self.mobility.translation_speed,
                };
                best = Some((
                    violations,
                    EscapeTrajectory {
                        segment: TrajectorySegment {
                            points,
                            speed,
                            kind: motion.kind,
                        },
                        new_start: end_world,
                        new_start_theta: motion.end_theta.to_radian(),
                    },
                ));
            }
        }

        match best {
            Some((violations, escape)) => {
                tracing::info!(
                    "escape trajectory sweeps {} blocked patches",
                    violations
                );
                Ok(escape)
            }
            None => Err(NavError::NoEscape),
        }
    }
}

/// Convert a duration in seconds to the integer heuristic scale.
#[inline]
fn scale_time(seconds: f32) -> i32 {
    (seconds * COST_SCALE_FACTOR).floor().min(i32::MAX as f32) as i32
}
