//! Agent records and the frame index.
//!
//! Loaders hand over flat [`AgentPose`] records; [`FrameIndex::build`] groups
//! them into frames ordered by numeric frame id.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ReplayError, Result};

// =============================================================================
// CATEGORY
// =============================================================================

/// Agent classification.
///
/// Labels must match a class name exactly ("Car", not "car"); anything else
/// parses to [`Category::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Car,
    Pedestrian,
    Bicycle,
    Truck,
    Unclassified,
    Unknown,
}

impl Category {
    /// Parses a category label. Surrounding whitespace is ignored.
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "Car" => Category::Car,
            "Pedestrian" => Category::Pedestrian,
            "Bicycle" => Category::Bicycle,
            "Truck" => Category::Truck,
            "Unclassified" => Category::Unclassified,
            _ => Category::Unknown,
        }
    }

    /// Returns the canonical label.
    pub fn name(&self) -> &'static str {
        match self {
            Category::Car => "Car",
            Category::Pedestrian => "Pedestrian",
            Category::Bicycle => "Bicycle",
            Category::Truck => "Truck",
            Category::Unclassified => "Unclassified",
            Category::Unknown => "Unknown",
        }
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Category::parse(label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// AGENT POSE
// =============================================================================

/// One agent observed at one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPose {
    /// Frame this pose belongs to
    pub frame_id: i64,

    /// Track identifier, stable across frames
    pub track_id: String,

    /// Center position in data space
    pub position: Point2<f64>,

    /// `(length, width)` in data units
    pub dimensions: Vector2<f64>,

    /// Heading in radians, counter-clockwise from +x
    pub heading: f64,

    /// Agent class
    pub category: Category,

    /// Recording timestamp (milliseconds)
    pub timestamp_ms: i64,

    /// Scenario case the record belongs to; `None` means every case
    pub case_id: Option<i64>,
}

impl AgentPose {
    /// Creates a 1x1 unclassified pose at `(x, y)` with heading 0 and timestamp 0.
    pub fn new(frame_id: i64, track_id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            frame_id,
            track_id: track_id.into(),
            position: Point2::new(x, y),
            dimensions: Vector2::new(1.0, 1.0),
            heading: 0.0,
            category: Category::Unclassified,
            timestamp_ms: 0,
            case_id: None,
        }
    }

    pub fn with_dimensions(mut self, length: f64, width: f64) -> Self {
        self.dimensions = Vector2::new(length, width);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_case(mut self, case_id: Option<i64>) -> Self {
        self.case_id = case_id;
        self
    }
}

/// Parses a frame identifier as an integer.
///
/// Loaders must go through this so ids compare numerically ("2" < "10").
/// Integral floats such as `"12.0"` are accepted.
pub fn parse_frame_id(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(id);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => Ok(v as i64),
        _ => Err(ReplayError::InvalidFrameId(raw.to_string())),
    }
}

/// Keeps the records that belong to `case_id` (or to every case).
pub fn filter_case(records: Vec<AgentPose>, case_id: i64) -> Vec<AgentPose> {
    records
        .into_iter()
        .filter(|r| r.case_id.map_or(true, |c| c == case_id))
        .collect()
}

// =============================================================================
// FRAMES
// =============================================================================

/// All agent poses sharing one frame id.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: i64,
    pub agents: Vec<AgentPose>,
}

impl Frame {
    /// Timestamp of the frame, taken from its first agent.
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.agents.first().map(|a| a.timestamp_ms)
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Frames keyed by id, with the ascending id sequence playback walks.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    frames: BTreeMap<i64, Frame>,
    order: Vec<i64>,
}

impl FrameIndex {
    /// Groups flat records by frame id.
    pub fn build(records: impl IntoIterator<Item = AgentPose>) -> Self {
        let mut frames: BTreeMap<i64, Frame> = BTreeMap::new();
        for record in records {
            frames
                .entry(record.frame_id)
                .or_insert_with(|| Frame {
                    id: record.frame_id,
                    agents: Vec::new(),
                })
                .agents
                .push(record);
        }
        Self::from_map(frames)
    }

    /// Builds an index from explicit frames. Empty frames are kept.
    pub fn from_frames(frames: impl IntoIterator<Item = (i64, Vec<AgentPose>)>) -> Self {
        let mut map = BTreeMap::new();
        for (id, agents) in frames {
            debug_assert!(agents.iter().all(|a| a.frame_id == id));
            map.insert(id, Frame { id, agents });
        }
        Self::from_map(map)
    }

    fn from_map(frames: BTreeMap<i64, Frame>) -> Self {
        let order = frames.keys().copied().collect();
        Self { frames, order }
    }

    /// Frame ids in ascending numeric order.
    pub fn ids(&self) -> &[i64] {
        &self.order
    }

    /// Number of distinct frames.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Frame at a position of the ascending sequence.
    pub fn frame_at(&self, index: usize) -> Option<&Frame> {
        self.order.get(index).and_then(|id| self.frames.get(id))
    }

    /// Timestamp of the frame at `index`; `None` if out of range or empty.
    pub fn timestamp_at(&self, index: usize) -> Option<i64> {
        self.frame_at(index).and_then(Frame::timestamp_ms)
    }

    /// Total number of poses.
    pub fn agent_count(&self) -> usize {
        self.frames.values().map(|f| f.agents.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_ids_sort_numerically() {
        let records: Vec<AgentPose> = ["10", "2", "1"]
            .iter()
            .map(|raw| AgentPose::new(parse_frame_id(raw).unwrap(), "a", 0.0, 0.0))
            .collect();

        let index = FrameIndex::build(records);
        assert_eq!(index.ids(), &[1, 2, 10]);
    }

    #[test]
    fn test_build_groups_by_frame() {
        let records = vec![
            AgentPose::new(3, "a", 0.0, 0.0).with_timestamp(300),
            AgentPose::new(1, "a", 1.0, 0.0).with_timestamp(100),
            AgentPose::new(3, "b", 2.0, 0.0).with_timestamp(300),
        ];

        let index = FrameIndex::build(records);
        assert_eq!(index.len(), 2);
        assert_eq!(index.agent_count(), 3);
        assert_eq!(index.frame_at(1).map(|f| f.agents.len()), Some(2));
        assert_eq!(index.frame_at(0).map(|f| f.id), Some(1));
        assert_eq!(index.timestamp_at(1), Some(300));
        assert_eq!(index.timestamp_at(2), None);
    }

    #[test]
    fn test_from_frames_keeps_empty_frames() {
        let index = FrameIndex::from_frames([
            (2, vec![]),
            (1, vec![AgentPose::new(1, "a", 0.0, 0.0).with_timestamp(5)]),
        ]);

        assert_eq!(index.ids(), &[1, 2]);
        assert!(index.frame_at(1).is_some_and(Frame::is_empty));
        assert_eq!(index.timestamp_at(1), None);
    }

    #[test]
    fn test_parse_frame_id() {
        assert_eq!(parse_frame_id(" 42 "), Ok(42));
        assert_eq!(parse_frame_id("-3"), Ok(-3));
        assert_eq!(parse_frame_id("12.0"), Ok(12));
        assert_eq!(
            parse_frame_id("12.5"),
            Err(ReplayError::InvalidFrameId("12.5".into()))
        );
        assert!(parse_frame_id("abc").is_err());

        // Out of range values would saturate and merge frames
        assert!(parse_frame_id("1e30").is_err());
        assert!(parse_frame_id("-1e30").is_err());
        assert!(parse_frame_id("inf").is_err());
        assert!(parse_frame_id("NaN").is_err());
    }

    #[test]
    fn test_filter_case() {
        let records = vec![
            AgentPose::new(1, "a", 0.0, 0.0).with_case(Some(0)),
            AgentPose::new(1, "b", 0.0, 0.0).with_case(Some(1)),
            AgentPose::new(1, "c", 0.0, 0.0).with_case(None),
        ];

        let kept: Vec<String> = filter_case(records, 1)
            .into_iter()
            .map(|r| r.track_id)
            .collect();
        assert_eq!(kept, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("Car"), Category::Car);
        assert_eq!(Category::parse(" Pedestrian "), Category::Pedestrian);
        assert_eq!(Category::parse("Unclassified"), Category::Unclassified);
        assert_eq!(Category::parse("hovercraft"), Category::Unknown);
        assert_eq!(Category::from("Truck").to_string(), "Truck");

        // Table keys are matched exactly
        assert_eq!(Category::parse("car"), Category::Unknown);
        assert_eq!(Category::parse("PEDESTRIAN"), Category::Unknown);
    }
}
