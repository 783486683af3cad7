//! Renderer: oriented boxes, heading arrows, labels and map polylines.
//!
//! Every primitive goes through [`Projection::project`]; boxes are built and
//! rotated in data space first, so the projection's Y flip keeps headings
//! visually counter-clockwise.
//!
//! The renderer remembers what it drew last ([`RenderCache`]) so a view change
//! can repaint the same content. A repaint is always a full redraw, never a
//! patch of the previous image.

use nalgebra::{Point2, Vector2};

use crate::canvas::{Canvas, TextAlign};
use crate::frames::{AgentPose, Category};
use crate::geometry::{front_midpoint, oriented_box, rotate};
use crate::projection::Projection;

/// A map contour in data space.
pub type Polyline = Vec<Point2<f64>>;

/// Color for categories without an entry in the table.
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Alpha suffix appended to a `#RRGGBB` color for fills and map lines.
pub const FILL_ALPHA: &str = "66";

const BOX_LINE_WIDTH: f64 = 2.0;
const MAP_LINE_WIDTH: f64 = 1.0;
const ARROW_HEAD_PX: f64 = 8.0;
const ARROW_HEAD_ANGLE: f64 = std::f64::consts::PI / 6.0;
const LABEL_FONT: &str = "normal small-caps 10px mono";
const LABEL_OFFSET_PX: f64 = -12.0;
const FRAME_LABEL_FONT: &str = "bold small-caps 12px mono";
const FRAME_LABEL_MARGIN: f64 = 12.0;

/// Stroke color for an agent category.
pub fn category_color(category: Category) -> &'static str {
    match category {
        Category::Car => "#4FC3F7",
        Category::Pedestrian => "#BA68C8",
        Category::Unclassified => "#FF9800",
        _ => DEFAULT_COLOR,
    }
}

/// `color` with the fill alpha appended.
pub fn with_alpha(color: &str) -> String {
    format!("{color}{FILL_ALPHA}")
}

/// Arguments of the last draw calls.
#[derive(Debug, Clone, Default)]
pub struct RenderCache {
    /// Agents of the last drawn frame
    pub frame: Option<Vec<AgentPose>>,

    /// Last drawn map
    pub map: Option<Vec<Polyline>>,

    pub show_orientation: bool,
    pub show_labels: bool,
}

/// Draws frames and maps, caching the arguments for redraws.
#[derive(Debug, Default)]
pub struct Renderer {
    cache: RenderCache,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Forgets the cached frame and map.
    pub fn reset(&mut self) {
        self.cache.frame = None;
        self.cache.map = None;
    }

    /// Clears the canvas and draws one frame.
    pub fn draw_frame<C: Canvas + ?Sized>(
        &mut self,
        canvas: &mut C,
        projection: &Projection,
        agents: &[AgentPose],
        show_orientation: bool,
        show_labels: bool,
    ) {
        self.cache.frame = Some(agents.to_vec());
        self.cache.show_orientation = show_orientation;
        self.cache.show_labels = show_labels;
        paint_frame(canvas, projection, agents, show_orientation, show_labels);
    }

    /// Strokes the map polylines on top of the current image.
    pub fn draw_map<C: Canvas + ?Sized>(
        &mut self,
        canvas: &mut C,
        projection: &Projection,
        polylines: &[Polyline],
    ) {
        self.cache.map = Some(polylines.to_vec());
        paint_map(canvas, projection, polylines);
    }

    /// Wipes the canvas; the cache is kept.
    pub fn clear<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        canvas.clear();
    }

    /// Updates the cached toggles without drawing.
    pub fn set_toggles(&mut self, show_orientation: bool, show_labels: bool) {
        self.cache.show_orientation = show_orientation;
        self.cache.show_labels = show_labels;
    }

    /// Repaints the cached frame and map under the current projection.
    pub fn redraw<C: Canvas + ?Sized>(&self, canvas: &mut C, projection: &Projection) {
        match &self.cache.frame {
            Some(agents) => paint_frame(
                canvas,
                projection,
                agents,
                self.cache.show_orientation,
                self.cache.show_labels,
            ),
            None => canvas.clear(),
        }
        if let Some(map) = &self.cache.map {
            paint_map(canvas, projection, map);
        }
    }
}

fn paint_frame<C: Canvas + ?Sized>(
    canvas: &mut C,
    projection: &Projection,
    agents: &[AgentPose],
    show_orientation: bool,
    show_labels: bool,
) {
    canvas.clear();

    let Some(first) = agents.first() else {
        return;
    };

    for agent in agents {
        let color = category_color(agent.category);
        let corners = oriented_box(agent.position, agent.dimensions, agent.heading);
        paint_box(canvas, projection, &corners, color);

        if show_orientation {
            let base = projection.project(agent.position);
            let tip = projection.project(front_midpoint(&corners));
            paint_arrow(canvas, base, tip, color);
        }
        if show_labels {
            paint_label(canvas, projection, agent, color);
        }
    }

    paint_frame_label(canvas, first.frame_id);
}

fn paint_box<C: Canvas + ?Sized>(
    canvas: &mut C,
    projection: &Projection,
    corners: &[Point2<f64>; 4],
    color: &str,
) {
    let screen = (*corners).map(|c| projection.project(c));

    canvas.set_fill_style(&with_alpha(color));
    canvas.set_stroke_style(color);
    canvas.set_line_width(BOX_LINE_WIDTH);

    canvas.begin_path();
    canvas.move_to(screen[0]);
    for p in &screen[1..] {
        canvas.line_to(*p);
    }
    canvas.line_to(screen[0]);
    canvas.close_path();
    canvas.stroke();
    canvas.fill();
}

fn paint_arrow<C: Canvas + ?Sized>(canvas: &mut C, base: Point2<f64>, tip: Point2<f64>, color: &str) {
    let shaft = tip - base;
    let length = shaft.norm();

    canvas.set_stroke_style(color);
    canvas.set_line_width(BOX_LINE_WIDTH);
    canvas.begin_path();
    canvas.move_to(base);
    canvas.line_to(tip);
    canvas.stroke();

    if length <= f64::EPSILON {
        return;
    }

    let head = ARROW_HEAD_PX.min(length / 2.0);
    let back = tip - shaft / length * head;
    for angle in [ARROW_HEAD_ANGLE, -ARROW_HEAD_ANGLE] {
        canvas.begin_path();
        canvas.move_to(tip);
        canvas.line_to(rotate(back, angle, tip));
        canvas.stroke();
    }
}

fn paint_label<C: Canvas + ?Sized>(
    canvas: &mut C,
    projection: &Projection,
    agent: &AgentPose,
    color: &str,
) {
    let at = projection.project(agent.position) + Vector2::new(LABEL_OFFSET_PX, LABEL_OFFSET_PX);
    canvas.set_fill_style(color);
    canvas.set_font(LABEL_FONT);
    canvas.set_text_align(TextAlign::Left);
    canvas.fill_text(&agent.track_id, at);
}

fn paint_frame_label<C: Canvas + ?Sized>(canvas: &mut C, frame_id: i64) {
    let text = format!("t={frame_id}");
    canvas.set_font(FRAME_LABEL_FONT);
    let width = canvas.measure_text(&text);
    canvas.set_fill_style(DEFAULT_COLOR);
    canvas.set_text_align(TextAlign::Right);
    let at = Point2::new(width + FRAME_LABEL_MARGIN, canvas.height() - FRAME_LABEL_MARGIN);
    canvas.fill_text(&text, at);
}

fn paint_map<C: Canvas + ?Sized>(canvas: &mut C, projection: &Projection, polylines: &[Polyline]) {
    let color = with_alpha(DEFAULT_COLOR);
    canvas.set_stroke_style(&color);
    canvas.set_line_width(MAP_LINE_WIDTH);

    for line in polylines.iter().filter(|l| l.len() >= 2) {
        canvas.begin_path();
        canvas.move_to(projection.project(line[0]));
        for p in &line[1..] {
            canvas.line_to(projection.project(*p));
        }
        canvas.stroke();
    }
}
