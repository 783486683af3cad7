//! tafview command-line player.
//!
//! Loads an agent CSV (and optionally a GeoJSON road map), builds the frame
//! index and data bounds, then replays the scenario either headless or in a
//! terminal UI.
//!
//! ```text
//!   CSV ──► loader::load_agents ──┐
//!                                 ├──► FrameIndex + DataBounds ──► Player
//!   GeoJSON ──► loader::load_map ─┘                                 │
//!                                              ┌────────────────────┴──────┐
//!                                              ▼                           ▼
//!                                  headless::run_headless        tui::TerminalApp
//! ```

pub mod config;
pub mod headless;
pub mod loader;
pub mod tui;

pub use config::ColumnMap;
pub use headless::{run_headless, HeadlessSummary};
pub use loader::{load_agents, load_map, scenario_bounds, GeoPoint};
pub use tui::TerminalApp;
