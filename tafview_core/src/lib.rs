//! tafview Core - Traffic Scenario Replay Engine
//!
//! Replays recorded agent poses as an animated 2D canvas:
//! 1. **Geometry**: oriented boxes built and rotated in data space
//! 2. **Projection**: data-bounds fit transform composed with interactive zoom/pan
//! 3. **Rendering**: boxes, heading arrows, labels and map polylines, with a
//!    redraw cache for view changes
//! 4. **Frames**: flat records grouped by numeric frame id
//! 5. **Playback**: pausable, seekable, speed-scaled loop over the frames
//!
//! # Usage
//!
//! ```ignore
//! use tafview_core::{FrameIndex, Player, PlaybackConfig, RecordingCanvas, ViewConfig, Viewer};
//! use tafview_env::TokioContext;
//!
//! let mut viewer = Viewer::new(RecordingCanvas::new(800.0, 600.0), ViewConfig::default());
//! viewer.set_data_bounds(0.0, 0.0, 120.0, 80.0)?;
//! viewer.resize_to_aspect();
//!
//! let player = Player::new(TokioContext::shared(), viewer, PlaybackConfig::default());
//! player.load(FrameIndex::build(records), None)?;
//! player.run().await;
//! ```

pub mod canvas;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod playback;
pub mod projection;
pub mod render;
pub mod viewer;

// Re-export key types for convenience
pub use canvas::{Canvas, DrawCommand, RecordingCanvas, TextAlign};
pub use error::{ReplayError, Result};
pub use frames::{filter_case, parse_frame_id, AgentPose, Category, Frame, FrameIndex};
pub use playback::{PlaybackConfig, PlaybackState, PlaybackStatus, Player, RunOutcome};
pub use projection::{DataBounds, Extent, Projection, ViewConfig, ViewTransform};
pub use render::{Polyline, RenderCache, Renderer};
pub use viewer::{DisplayOptions, Viewer};
