//! Viewer: one canvas with its projection and renderer.
//!
//! The viewer is the only owner of the view transform, the render cache and
//! the canvas pixels. Pan and zoom go through it so every accepted view change
//! is followed by a full clear-and-redraw from the cache.

use nalgebra::{Point2, Vector2};
use tracing::debug;

use crate::canvas::Canvas;
use crate::error::Result;
use crate::frames::AgentPose;
use crate::projection::{DataBounds, Projection, ViewConfig};
use crate::render::{Polyline, Renderer};

/// Per-agent overlays drawn on top of the boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayOptions {
    pub show_orientation: bool,
    pub show_labels: bool,
}

/// Canvas + projection + renderer.
pub struct Viewer<C: Canvas> {
    canvas: C,
    projection: Projection,
    renderer: Renderer,
    options: DisplayOptions,
}

impl<C: Canvas> Viewer<C> {
    pub fn new(canvas: C, config: ViewConfig) -> Self {
        let projection = Projection::new(canvas.width(), canvas.height(), config);
        Self {
            canvas,
            projection,
            renderer: Renderer::new(),
            options: DisplayOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DisplayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn options(&self) -> DisplayOptions {
        self.options
    }

    /// Replaces the fit transform.
    pub fn set_data_bounds(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<()> {
        self.sync_canvas_size();
        self.projection.set_data_bounds(min_x, min_y, max_x, max_y)
    }

    pub fn set_bounds(&mut self, bounds: DataBounds) {
        self.sync_canvas_size();
        self.projection.set_bounds(bounds);
    }

    /// Resizes the canvas width to the data aspect ratio (height is kept).
    pub fn resize_to_aspect(&mut self) -> f64 {
        self.sync_canvas_size();
        let width = self.projection.resize_to_aspect();
        self.canvas.set_width(width);
        width
    }

    fn sync_canvas_size(&mut self) {
        self.projection
            .set_canvas_size(self.canvas.width(), self.canvas.height());
    }

    /// Zooms by a wheel delta; rejected steps leave the image untouched.
    pub fn adjust_zoom(&mut self, wheel_delta: f64) -> bool {
        if !self.projection.adjust_zoom(wheel_delta) {
            return false;
        }
        debug!(zoom = self.projection.view().zoom, "zoom changed");
        self.canvas.clear();
        self.redraw();
        true
    }

    /// Pans by a screen-space delta.
    pub fn adjust_offset(&mut self, delta: Vector2<f64>) -> bool {
        if !self.projection.adjust_offset(delta) {
            return false;
        }
        debug!(offset = ?self.projection.view().offset, "offset changed");
        self.canvas.clear();
        self.redraw();
        true
    }

    pub fn set_show_orientation(&mut self, show: bool) {
        self.options.show_orientation = show;
        self.apply_options();
    }

    pub fn set_show_labels(&mut self, show: bool) {
        self.options.show_labels = show;
        self.apply_options();
    }

    fn apply_options(&mut self) {
        self.renderer
            .set_toggles(self.options.show_orientation, self.options.show_labels);
        self.redraw();
    }

    /// Draws a frame with the current display options.
    pub fn render_frame(&mut self, agents: &[AgentPose]) {
        let DisplayOptions {
            show_orientation,
            show_labels,
        } = self.options;
        self.draw_frame(agents, show_orientation, show_labels);
    }

    pub fn draw_frame(&mut self, agents: &[AgentPose], show_orientation: bool, show_labels: bool) {
        self.renderer.draw_frame(
            &mut self.canvas,
            &self.projection,
            agents,
            show_orientation,
            show_labels,
        );
    }

    pub fn draw_map(&mut self, polylines: &[Polyline]) {
        self.renderer
            .draw_map(&mut self.canvas, &self.projection, polylines);
    }

    pub fn clear(&mut self) {
        self.renderer.clear(&mut self.canvas);
    }

    /// Repaints the cached frame and map.
    pub fn redraw(&mut self) {
        self.renderer.redraw(&mut self.canvas, &self.projection);
    }

    /// Forgets cached content and view changes (scenario reload).
    pub fn reset(&mut self) {
        self.renderer.reset();
        self.projection.reset_view();
        self.canvas.clear();
    }

    pub fn project(&self, p: Point2<f64>) -> Point2<f64> {
        self.projection.project(p)
    }
}
