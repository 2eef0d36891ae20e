//! The planner search space: environment, state table, footprint checks,
//! and the Dijkstra heuristic pre-pass.

pub mod dijkstra;
pub mod environment;
pub mod footprint;
pub mod state;

pub use dijkstra::{DistanceField, UNREACHABLE};
pub use environment::{EscapeTrajectory, SearchEnvironment, Successor, TrajectorySegment};
pub use footprint::{FootprintEvaluator, FootprintStats, PathStats};
pub use state::{StateId, StateTable, XyzNode, XyzNodeId};
