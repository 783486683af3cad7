//! CSV column mapping.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Names of the CSV columns holding each agent field.
///
/// Any field missing from a JSON mapping file keeps its default name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub x: String,
    pub y: String,
    pub width: String,
    pub length: String,
    pub heading: String,
    pub frame_id: String,
    pub timestamp: String,
    pub category: String,
    pub track_id: String,
    /// Optional in the data; rows without it belong to no case.
    pub case_id: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            x: "lon".to_string(),
            y: "lat".to_string(),
            width: "width".to_string(),
            length: "length".to_string(),
            heading: "psi_rad".to_string(),
            frame_id: "frame_id".to_string(),
            timestamp: "timestamp_ms".to_string(),
            category: "agent_type".to_string(),
            track_id: "track_id".to_string(),
            case_id: "case_id".to_string(),
        }
    }
}

impl ColumnMap {
    /// Reads a mapping from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading column map {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing column map {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
