//! Test utilities: fixture MLS maps, planner setup, and a minimal
//! best-first search driver exercising the environment callbacks.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use bhumi_nav::config::{MobilityConfig, TraversabilityConfig};
use bhumi_nav::mls::MlsMap;
use bhumi_nav::motion::{straight_line_catalog, MotionTable};
use bhumi_nav::search::{SearchEnvironment, StateId};
use bhumi_nav::GridIndex;

/// Flat world of `cells` x `cells` at 0.1 m resolution with the origin
/// shifted so the region of interest has a mapped margin around it.
pub fn flat_world(cells: usize, margin_m: f32) -> MlsMap {
    let mut mls = MlsMap::new(cells, cells, 0.1, -margin_m, -margin_m);
    mls.set_ground(0..cells as i32, 0..cells as i32, 0.0);
    mls
}

/// World with a height step: `z = 0` left of `step_col`, `step_z` from
/// that column on.
pub fn step_world(cells: usize, margin_m: f32, step_col: i32, step_z: f32) -> MlsMap {
    let mut mls = MlsMap::new(cells, cells, 0.1, -margin_m, -margin_m);
    for y in 0..cells as i32 {
        for x in 0..cells as i32 {
            let z = if x >= step_col { step_z } else { 0.0 };
            mls.add_surface(GridIndex::new(x, y), z);
        }
    }
    mls
}

/// Ramp rising along +x with the given incline (radians).
pub fn ramp_world(cells: usize, margin_m: f32, incline: f32) -> MlsMap {
    let mut mls = MlsMap::new(cells, cells, 0.1, -margin_m, -margin_m);
    let gradient = incline.tan();
    for y in 0..cells as i32 {
        for x in 0..cells as i32 {
            let world_x = (x as f32 + 0.5) * 0.1 - margin_m;
            mls.add_surface(GridIndex::new(x, y), world_x * gradient);
        }
    }
    mls
}

/// Ramp height at a world x coordinate, for placing poses on the surface.
pub fn ramp_height(incline: f32, world_x: f32) -> f32 {
    world_x * incline.tan()
}

/// Small-footprint test configuration.
pub fn small_robot_config() -> TraversabilityConfig {
    TraversabilityConfig {
        robot_size_x: 0.12,
        robot_size_y: 0.12,
        cost_function_dist: 0.15,
        ..Default::default()
    }
}

/// Environment over a map with the analytic primitive catalog.
pub fn environment(mls: MlsMap, config: TraversabilityConfig) -> SearchEnvironment {
    let mobility = MobilityConfig::default();
    let table = MotionTable::new(straight_line_catalog(16, 0.1), 16, &mobility)
        .expect("catalog must load");
    SearchEnvironment::new(Arc::new(mls), config, mobility, Arc::new(table))
}

struct OpenNode {
    state: StateId,
    f_score: i64,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.f_score == other.f_score
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower f_score = higher priority)
        other.f_score.cmp(&self.f_score)
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Plain A* over the environment callbacks.
///
/// Stands in for the external search driver; returns the state-id path
/// from start to goal, or `None` when the search space is exhausted.
pub fn plan(env: &SearchEnvironment, start: StateId, goal: StateId) -> Option<Vec<StateId>> {
    let mut open = BinaryHeap::new();
    let mut g_score: HashMap<StateId, i64> = HashMap::new();
    let mut came_from: HashMap<StateId, StateId> = HashMap::new();
    let mut closed: HashSet<StateId> = HashSet::new();

    g_score.insert(start, 0);
    open.push(OpenNode {
        state: start,
        f_score: env.get_goal_heuristic(start).unwrap() as i64,
    });

    let mut iterations = 0usize;
    while let Some(OpenNode { state, .. }) = open.pop() {
        iterations += 1;
        assert!(iterations < 200_000, "search exploded");
        if !closed.insert(state) {
            continue;
        }

        if state == goal {
            let mut path = vec![goal];
            let mut current = goal;
            while let Some(&prev) = came_from.get(&current) {
                path.push(prev);
                current = prev;
            }
            path.reverse();
            return Some(path);
        }

        let current_g = g_score[&state];
        for successor in env.get_successors(state).unwrap() {
            if closed.contains(&successor.state) {
                continue;
            }
            let tentative = current_g + successor.cost as i64;
            if tentative < *g_score.get(&successor.state).unwrap_or(&i64::MAX) {
                g_score.insert(successor.state, tentative);
                came_from.insert(successor.state, state);
                let h = env.get_goal_heuristic(successor.state).unwrap() as i64;
                open.push(OpenNode {
                    state: successor.state,
                    f_score: tentative + h,
                });
            }
        }
    }

    None
}
