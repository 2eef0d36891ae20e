//! Plan a trajectory across a synthetic terrain with a ramp and a wall.
//!
//! Run with: `cargo run --example plan_terrain`

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use bhumi_nav::config::{MobilityConfig, TraversabilityConfig};
use bhumi_nav::core::WorldPoint3;
use bhumi_nav::mls::MlsMap;
use bhumi_nav::motion::{straight_line_catalog, MotionTable};
use bhumi_nav::search::{SearchEnvironment, StateId};
use bhumi_nav::GridIndex;

/// Terrain: flat ground rising into a gentle ramp, with an undriveable
/// slab in the middle of the direct route.
fn build_terrain() -> MlsMap {
    let mut mls = MlsMap::new(50, 50, 0.1, -1.0, -1.0);
    for y in 0..50 {
        for x in 0..50 {
            let world_x = (x as f32 + 0.5) * 0.1 - 1.0;
            let ramp = (world_x - 1.0).max(0.0) * 0.15;
            let z = if (18..20).contains(&x) && (8..22).contains(&y) {
                ramp + 0.08 // slab
            } else {
                ramp
            };
            mls.add_surface(GridIndex::new(x, y), z);
        }
    }
    mls
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
        other.f_score.cmp(&self.f_score)
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Minimal A* over the environment callbacks, standing in for the outer
/// search driver.
fn plan(env: &SearchEnvironment, start: StateId, goal: StateId) -> Option<Vec<StateId>> {
    let mut open = BinaryHeap::new();
    let mut g_score: HashMap<StateId, i64> = HashMap::new();
    let mut came_from: HashMap<StateId, StateId> = HashMap::new();

    g_score.insert(start, 0);
    open.push(OpenNode {
        state: start,
        f_score: env.get_goal_heuristic(start).ok()? as i64,
    });

    while let Some(OpenNode { state, .. }) = open.pop() {
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
        for successor in env.get_successors(state).ok()? {
            let tentative = current_g + successor.cost as i64;
            if tentative < *g_score.get(&successor.state).unwrap_or(&i64::MAX) {
                g_score.insert(successor.state, tentative);
                came_from.insert(successor.state, state);
                let h = env.get_goal_heuristic(successor.state).ok()? as i64;
                open.push(OpenNode {
                    state: successor.state,
                    f_score: tentative + h,
                });
            }
        }
    }
    None
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let config = TraversabilityConfig {
        robot_size_x: 0.2,
        robot_size_y: 0.15,
        cost_function_dist: 0.2,
        slope_limit: 0.3,
        ..Default::default()
    };
    let mobility = MobilityConfig::default();
    let table = MotionTable::new(straight_line_catalog(16, 0.1), 16, &mobility)
        .expect("primitive catalog");

    let mut env = SearchEnvironment::new(
        Arc::new(build_terrain()),
        config,
        mobility,
        Arc::new(table),
    );

    let start = env
        .set_start(WorldPoint3::new(0.05, 0.55, 0.0), 0.0)
        .expect("start pose");
    let goal = env
        .set_goal(WorldPoint3::new(1.85, 0.55, 0.1275), 0.0)
        .expect("goal pose");

    println!(
        "planning from state {} to state {} ({} primitives loaded)",
        start,
        goal,
        env.motions().len()
    );

    match plan(&env, start, goal) {
        Some(path) => {
            println!("path found with {} states:", path.len());
            for &state in &path {
                let pos = env.state_position(state);
                println!(
                    "  state {:4}  ({:+.2}, {:+.2}, {:+.2})  θ = {}",
                    state,
                    pos.x,
                    pos.y,
                    pos.z,
                    env.state_theta(state)
                );
            }

            let segments = env.trajectory(&path).expect("trajectory");
            let length: f32 = segments
                .iter()
                .map(|s| {
                    s.points
                        .windows(2)
                        .map(|w| w[0].distance(&w[1]))
                        .sum::<f32>()
                })
                .sum();
            println!(
                "trajectory: {} segments, {:.2} m total",
                segments.len(),
                length
            );
        }
        None => println!("no path found"),
    }
}
