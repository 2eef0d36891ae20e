//! Autonomous exploration: frontier candidate selection.

pub mod frontier;

pub use frontier::{FrontierCandidate, FrontierSelector};
