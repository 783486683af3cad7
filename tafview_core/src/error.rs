//! Error types for the replay engine.

use thiserror::Error;

/// Errors surfaced by the replay engine.
///
/// Loader failures (malformed files, failed reprojection) never reach this
/// type; the engine performs no I/O.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    /// Data bounds with an empty or inverted range on either axis
    #[error("Invalid data bounds: x=[{min_x}, {max_x}] y=[{min_y}, {max_y}]")]
    InvalidBounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    /// Playback speed that is zero, negative, or not finite
    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f64),

    /// Frame identifier that does not parse as an integer
    #[error("Invalid frame id: {0:?}")]
    InvalidFrameId(String),

    /// Operation that needs playback to be idle
    #[error("Playback is active")]
    PlaybackActive,

    /// Scenario without any agent record
    #[error("Scenario contains no agents")]
    EmptyScenario,
}

impl ReplayError {
    /// Creates an invalid-bounds error from the offending extent.
    pub fn bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::InvalidBounds {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReplayError>;
