//! BhumiNav - Terrain trajectory planning for wheeled ground robots
//!
//! Plans kinematically feasible driving trajectories across uneven 3D
//! terrain supplied as a Multi-Level-Surface (MLS) height map. The crate
//! implements the *search environment* side of a heuristic graph search:
//! the discrete (x, y, z-patch, θ) state space, motion-primitive successor
//! generation, an admissible Dijkstra-backed heuristic, and frontier
//! selection for autonomous exploration. The outer A*/ARA*-style search
//! driver, primitive synthesis, and map ingestion live outside this crate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  exploration/                       │  ← Frontier ranking
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    search/                          │  ← Environment, states,
//! │      (environment, state, footprint, dijkstra)      │    costs, heuristic
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌──────────────────────────┬──────────────────────────┐
//! │        motion/           │     traversability/      │  ← Primitives; patch
//! │  (primitives, catalog)   │   (patch, graph, bfs)    │    graphs over the MLS
//! └──────────────────────────┴──────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                 core/  +  mls                       │  ← Foundation types,
//! │        (types, angle)     (height map)              │    input map
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use bhumi_nav::config::{MobilityConfig, TraversabilityConfig};
//! use bhumi_nav::core::WorldPoint3;
//! use bhumi_nav::mls::MlsMap;
//! use bhumi_nav::motion::{straight_line_catalog, MotionTable};
//! use bhumi_nav::search::SearchEnvironment;
//!
//! // A flat 3x3 m map at 0.1 m resolution
//! let mut mls = MlsMap::new(30, 30, 0.1, -1.0, -1.0);
//! mls.set_ground(0..30, 0..30, 0.0);
//!
//! let config = TraversabilityConfig {
//!     robot_size_x: 0.2,
//!     robot_size_y: 0.15,
//!     ..Default::default()
//! };
//! let mobility = MobilityConfig::default();
//! let motions = MotionTable::new(straight_line_catalog(16, 0.1), 16, &mobility).unwrap();
//!
//! let mut env = SearchEnvironment::new(Arc::new(mls), config, mobility, Arc::new(motions));
//! env.set_start(WorldPoint3::new(0.05, 0.05, 0.0), 0.0).unwrap();
//! env.set_goal(WorldPoint3::new(0.75, 0.75, 0.0), 0.0).unwrap();
//!
//! // The outer search expands states through the environment callbacks
//! let successors = env.get_successors(0).unwrap();
//! assert!(!successors.is_empty());
//! ```
//!
//! # Two traversability layers
//!
//! Successor generation consults two independent graphs over the same
//! grid: the *driveability* layer models where the wheel contact point can
//! rest and drives reachability, while the *obstacle* layer models the
//! robot body swept through space and drives collision checks along the
//! intermediate poses of each motion.

pub mod config;
pub mod core;
pub mod error;
pub mod exploration;
pub mod mls;
pub mod motion;
pub mod search;
pub mod traversability;

// Convenience re-exports (flat namespace for common use)

pub use config::{
    FrontierCostConfig, MobilityConfig, NavConfig, PrimitiveConfig, SlopeMetric,
    TraversabilityConfig,
};
pub use core::{AngleSegment, DiscreteTheta, GridIndex, Pose2D, WorldPoint3};
pub use error::{NavError, Result};
pub use exploration::{FrontierCandidate, FrontierSelector};
pub use mls::{MlsMap, SurfacePatch};
pub use motion::{straight_line_catalog, Motion, MotionId, MotionKind, MotionTable};
pub use search::{
    EscapeTrajectory, SearchEnvironment, StateId, Successor, TrajectorySegment,
};
pub use traversability::{LayerRole, Patch, PatchId, PatchKind, TraversabilityGraph};
