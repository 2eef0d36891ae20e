//! Traversability graphs: terrain patches, lazy expansion, neighbor links.
//!
//! Two graphs over the same grid back the planner: the driveability layer
//! (where the wheel contact point can rest) and the obstacle layer (the
//! robot body swept through space).

pub mod bfs;
pub mod graph;
pub mod patch;

pub use bfs::{visit_breadth_first, VisitControl};
pub use graph::{LayerRole, TraversabilityGraph};
pub use patch::{ExpandedData, Patch, PatchId, PatchKind};
