//! Projection pipeline: data space to canvas pixels.
//!
//! Two transforms are composed on every call to [`Projection::project`]:
//!
//! ```text
//!  data (x, y) ──fit──► canvas px (Y down) ──view──► screen px
//!
//!  fit:  [min_x, max_x] → [0, width]
//!        [min_y, max_y] → [height, 0]
//!  view: c + zoom * (p + offset − c)      c = canvas center
//! ```
//!
//! Nothing is cached in a graphics context; zoom and offset are plain numbers
//! and the full mapping is recomputed per point.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReplayError, Result};

/// Smallest reachable zoom level.
pub const ZOOM_MIN: f64 = 0.1;

/// Largest reachable zoom level.
pub const ZOOM_MAX: f64 = 3.0;

/// Zoom change per unit of wheel delta. Negative so scrolling up zooms in.
pub const SCROLL_FACTOR: f64 = -0.001;

/// Limits and sensitivity of the interactive view transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub zoom_min: f64,
    pub zoom_max: f64,
    pub scroll_factor: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_min: ZOOM_MIN,
            zoom_max: ZOOM_MAX,
            scroll_factor: SCROLL_FACTOR,
        }
    }
}

// =============================================================================
// BOUNDS
// =============================================================================

/// Unvalidated min/max extent of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Extent {
    /// Extent of `points`, or `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2<f64>>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Extent { min: *p, max: *p },
                Some(e) => Extent {
                    min: Point2::new(e.min.x.min(p.x), e.min.y.min(p.y)),
                    max: Point2::new(e.max.x.max(p.x), e.max.y.max(p.y)),
                },
            })
        })
    }

    /// Smallest extent covering both.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grows each side by `margin` times the range of its axis.
    pub fn padded(&self, margin: f64) -> Extent {
        let pad = (self.max - self.min) * margin;
        Extent {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Validates the extent as data bounds.
    pub fn to_bounds(&self) -> Result<DataBounds> {
        DataBounds::new(self.min.x, self.min.y, self.max.x, self.max.y)
    }
}

/// Data-space rectangle mapped onto the canvas. Both ranges are non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataBounds {
    min: Point2<f64>,
    max: Point2<f64>,
}

impl DataBounds {
    /// Fails with `InvalidBounds` unless `min_x < max_x` and `min_y < max_y`.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x >= max_x || min_y >= max_y {
            return Err(ReplayError::bounds(min_x, min_y, max_x, max_y));
        }
        Ok(Self {
            min: Point2::new(min_x, min_y),
            max: Point2::new(max_x, max_y),
        })
    }

    pub fn min(&self) -> Point2<f64> {
        self.min
    }

    pub fn max(&self) -> Point2<f64> {
        self.max
    }

    /// `(max - min)` per axis; both components are positive.
    pub fn range(&self) -> Vector2<f64> {
        self.max - self.min
    }

    /// Width over height of the data extent.
    pub fn aspect_ratio(&self) -> f64 {
        let r = self.range();
        r.x / r.y
    }
}

// =============================================================================
// VIEW TRANSFORM
// =============================================================================

/// Interactive zoom and pan on top of the fit transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Magnification about the canvas center
    pub zoom: f64,

    /// Pan in unzoomed canvas pixels
    pub offset: Vector2<f64>,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: Vector2::zeros(),
        }
    }
}

// =============================================================================
// PROJECTION
// =============================================================================

/// Fit transform plus view transform for one canvas.
#[derive(Debug, Clone)]
pub struct Projection {
    bounds: DataBounds,
    width: f64,
    height: f64,
    view: ViewTransform,
    config: ViewConfig,
}

impl Projection {
    /// Creates a projection for a `width` x `height` canvas.
    ///
    /// Until [`set_data_bounds`](Self::set_data_bounds) is called, data space
    /// equals canvas space (with Y flipped).
    pub fn new(width: f64, height: f64, config: ViewConfig) -> Self {
        let bounds = DataBounds::new(0.0, 0.0, width.max(1.0), height.max(1.0))
            .unwrap_or(DataBounds {
                min: Point2::origin(),
                max: Point2::new(1.0, 1.0),
            });
        Self {
            bounds,
            width,
            height,
            view: ViewTransform::default(),
            config,
        }
    }

    /// Replaces the fit transform.
    pub fn set_data_bounds(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<()> {
        self.bounds = DataBounds::new(min_x, min_y, max_x, max_y)?;
        debug!(bounds = ?self.bounds, "data bounds set");
        Ok(())
    }

    /// Replaces the fit transform with already validated bounds.
    pub fn set_bounds(&mut self, bounds: DataBounds) {
        self.bounds = bounds;
    }

    pub fn bounds(&self) -> DataBounds {
        self.bounds
    }

    /// Keeps the projection in sync with the canvas pixel size.
    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn canvas_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    /// Sets the canvas width so its aspect ratio matches the data bounds,
    /// holding the height. Returns the new width.
    pub fn resize_to_aspect(&mut self) -> f64 {
        self.width = self.height * self.bounds.aspect_ratio();
        debug!(width = self.width, height = self.height, "canvas resized to data aspect");
        self.width
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Applies a wheel delta as a multiplicative zoom step.
    ///
    /// Returns `false` (and leaves the zoom untouched) when the step would
    /// leave `[zoom_min, zoom_max]`.
    pub fn adjust_zoom(&mut self, wheel_delta: f64) -> bool {
        let factor = 1.0 + wheel_delta * self.config.scroll_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let zoom = self.view.zoom * factor;
        if zoom < self.config.zoom_min || zoom > self.config.zoom_max {
            debug!(zoom, "zoom step rejected");
            return false;
        }
        self.view.zoom = zoom;
        true
    }

    /// Pans by a screen-space delta; the stored offset grows by `delta / zoom`
    /// so the scene tracks the pointer at any magnification.
    pub fn adjust_offset(&mut self, delta: Vector2<f64>) -> bool {
        if !delta.x.is_finite() || !delta.y.is_finite() {
            return false;
        }
        self.view.offset += delta / self.view.zoom;
        true
    }

    /// Back to zoom 1 and no pan.
    pub fn reset_view(&mut self) {
        self.view = ViewTransform::default();
    }

    /// Fit transform only.
    pub fn fit(&self, p: Point2<f64>) -> Point2<f64> {
        let rel = (p - self.bounds.min).component_div(&self.bounds.range());
        Point2::new(rel.x * self.width, (1.0 - rel.y) * self.height)
    }

    /// Canvas center in pixels.
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Maps a data-space point to a screen pixel.
    pub fn project(&self, p: Point2<f64>) -> Point2<f64> {
        let c = self.center();
        c + (self.fit(p) + self.view.offset - c) * self.view.zoom
    }
}
