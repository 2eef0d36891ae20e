//! Motion primitives: value types, the lookup table, and an analytic
//! primitive catalog.

pub mod catalog;
pub mod primitives;

pub use catalog::straight_line_catalog;
pub use primitives::{
    Motion, MotionId, MotionKind, MotionTable, PoseWithCell, COST_SCALE_FACTOR,
};
