//! Error types for the terrain planner.

use thiserror::Error;

/// Planner error type.
///
/// `InternalInvariant` indicates corrupted successor bookkeeping and aborts
/// the planning run; every other variant is recoverable by the caller.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("pose ({x:.3}, {y:.3}) is outside the map")]
    MapOutOfBounds { x: f32, y: f32 },

    #[error("state creation failed: {0}")]
    StateCreationFailed(String),

    #[error("orientation not allowed due to slope: {0}")]
    OrientationNotAllowed(String),

    #[error("footprint check failed: {0}")]
    ObstacleCheckFailed(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("no escape trajectory leaves the obstacle")]
    NoEscape,

    #[error("invalid motion primitive: {0}")]
    InvalidPrimitive(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
