//! Scenario loading: agent CSV, GeoJSON map, web-mercator reprojection.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{Point2, Vector2};
use serde_json::Value;
use tafview_core::{filter_case, parse_frame_id, AgentPose, Category, DataBounds, Extent, Polyline};
use tracing::{debug, info};

use crate::config::ColumnMap;

/// WGS84 semi-major axis used by EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

// =============================================================================
// REPROJECTION
// =============================================================================

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// EPSG:4326 to EPSG:3857 (spherical mercator, meters).
    pub fn to_mercator(self) -> Point2<f64> {
        let x = EARTH_RADIUS_M * self.lon.to_radians();
        let y = EARTH_RADIUS_M
            * (std::f64::consts::FRAC_PI_4 + self.lat.to_radians() / 2.0)
                .tan()
                .ln();
        Point2::new(x, y)
    }
}

/// Parses `"lat,lon"`.
impl FromStr for GeoPoint {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected \"lat,lon\", got {s:?}"))?;
        let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
        let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(format!("coordinate out of range: {lat},{lon}"));
        }
        Ok(Self { lat, lon })
    }
}

// =============================================================================
// AGENT CSV
// =============================================================================

/// Column positions resolved against a CSV header row.
struct Columns {
    x: usize,
    y: usize,
    width: usize,
    length: usize,
    heading: usize,
    frame_id: usize,
    timestamp: usize,
    category: usize,
    track_id: usize,
    case_id: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, map: &ColumnMap) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| find(name).ok_or_else(|| anyhow!("missing column {name:?}"));
        Ok(Self {
            x: require(&map.x)?,
            y: require(&map.y)?,
            width: require(&map.width)?,
            length: require(&map.length)?,
            heading: require(&map.heading)?,
            frame_id: require(&map.frame_id)?,
            timestamp: require(&map.timestamp)?,
            category: require(&map.category)?,
            track_id: require(&map.track_id)?,
            case_id: find(&map.case_id),
        })
    }
}

fn field<'r>(record: &'r csv::StringRecord, index: usize, name: &str) -> Result<&'r str> {
    record
        .get(index)
        .ok_or_else(|| anyhow!("row is missing field {name:?}"))
}

fn number(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64> {
    let raw = field(record, index, name)?;
    raw.parse::<f64>()
        .with_context(|| format!("field {name:?} is not a number: {raw:?}"))
}

fn parse_row(record: &csv::StringRecord, cols: &Columns, origin: Option<Vector2<f64>>) -> Result<AgentPose> {
    let frame_id = parse_frame_id(field(record, cols.frame_id, "frame_id")?)?;
    let track_id = field(record, cols.track_id, "track_id")?;
    let mut x = number(record, cols.x, "x")?;
    let mut y = number(record, cols.y, "y")?;
    if let Some(offset) = origin {
        x += offset.x;
        y += offset.y;
    }

    let case_id = match cols.case_id.and_then(|i| record.get(i)) {
        Some(raw) if !raw.is_empty() => Some(parse_frame_id(raw).context("bad case id")?),
        _ => None,
    };

    Ok(AgentPose::new(frame_id, track_id, x, y)
        .with_dimensions(
            number(record, cols.length, "length")?,
            number(record, cols.width, "width")?,
        )
        .with_heading(number(record, cols.heading, "heading")?)
        .with_category(Category::parse(field(record, cols.category, "category")?))
        .with_timestamp(number(record, cols.timestamp, "timestamp")?.round() as i64)
        .with_case(case_id))
}

/// Reads agent rows from CSV text.
///
/// With an `origin`, positions are local offsets in meters and get shifted
/// onto the origin's mercator coordinates.
pub fn read_agents<R: Read>(reader: R, columns: &ColumnMap, origin: Option<GeoPoint>) -> Result<Vec<AgentPose>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let cols = Columns::resolve(csv.headers()?, columns)?;
    let offset = origin.map(|o| o.to_mercator().coords);

    let mut records = Vec::new();
    for (row, result) in csv.records().enumerate() {
        let record = result.with_context(|| format!("reading row {}", row + 1))?;
        let pose = parse_row(&record, &cols, offset).with_context(|| format!("row {}", row + 1))?;
        records.push(pose);
    }
    debug!(rows = records.len(), "agent csv parsed");
    Ok(records)
}

/// Loads the agent CSV at `path`, keeping only `case_id` when given.
pub fn load_agents(
    path: impl AsRef<Path>,
    columns: &ColumnMap,
    origin: Option<GeoPoint>,
    case_id: Option<i64>,
) -> Result<Vec<AgentPose>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let records = read_agents(file, columns, origin).with_context(|| format!("loading {}", path.display()))?;
    let total = records.len();
    let records = match case_id {
        Some(case) => filter_case(records, case),
        None => records,
    };
    info!(path = %path.display(), rows = total, kept = records.len(), "agents loaded");
    Ok(records)
}

// =============================================================================
// GEOJSON MAP
// =============================================================================

fn position(value: &Value) -> Result<Point2<f64>> {
    let coords = value.as_array().ok_or_else(|| anyhow!("position is not an array"))?;
    match coords.as_slice() {
        [lon, lat, ..] => {
            let lon = lon.as_f64().ok_or_else(|| anyhow!("longitude is not a number"))?;
            let lat = lat.as_f64().ok_or_else(|| anyhow!("latitude is not a number"))?;
            Ok(GeoPoint::new(lat, lon).to_mercator())
        }
        _ => bail!("position needs two coordinates"),
    }
}

fn line(value: &Value) -> Result<Polyline> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("line coordinates are not an array"))?
        .iter()
        .map(position)
        .collect()
}

/// Extracts LineString and MultiLineString geometries, reprojected to
/// mercator meters. Other geometry types are ignored.
pub fn read_map<R: Read>(reader: R) -> Result<Vec<Polyline>> {
    let doc: Value = serde_json::from_reader(reader).context("parsing geojson")?;
    let geometries: Vec<&Value> = match doc.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => doc
            .get("features")
            .and_then(Value::as_array)
            .map(|features| features.iter().filter_map(|f| f.get("geometry")).collect())
            .unwrap_or_default(),
        Some("Feature") => doc.get("geometry").into_iter().collect(),
        _ => vec![&doc],
    };

    let mut polylines = Vec::new();
    for geometry in geometries {
        let coords = geometry.get("coordinates");
        match (geometry.get("type").and_then(Value::as_str), coords) {
            (Some("LineString"), Some(c)) => polylines.push(line(c)?),
            (Some("MultiLineString"), Some(c)) => {
                let parts = c.as_array().ok_or_else(|| anyhow!("MultiLineString is not an array"))?;
                for part in parts {
                    polylines.push(line(part)?);
                }
            }
            _ => {}
        }
    }
    Ok(polylines)
}

pub fn load_map(path: impl AsRef<Path>) -> Result<Vec<Polyline>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let map = read_map(file).with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), polylines = map.len(), "map loaded");
    Ok(map)
}

// =============================================================================
// BOUNDS
// =============================================================================

/// Data bounds covering every agent position and map vertex, padded by
/// `margin` (a fraction of each axis range).
///
/// A zero-width axis is widened by one unit so a lone point still projects.
pub fn scenario_bounds(agents: &[AgentPose], map: Option<&[Polyline]>, margin: f64) -> Result<DataBounds> {
    let agent_extent = Extent::from_points(agents.iter().map(|a| &a.position));
    let map_extent = map.and_then(|lines| Extent::from_points(lines.iter().flatten()));

    let extent = match (agent_extent, map_extent) {
        (Some(a), Some(m)) => a.union(&m),
        (Some(e), None) | (None, Some(e)) => e,
        (None, None) => bail!("scenario has no positions"),
    };

    let mut extent = extent.padded(margin);
    for axis in 0..2 {
        if extent.max[axis] <= extent.min[axis] {
            extent.min[axis] -= 0.5;
            extent.max[axis] += 0.5;
        }
    }
    Ok(extent.to_bounds()?)
}
