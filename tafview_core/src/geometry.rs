//! Geometry kernel: rotation, box corners, centroids.
//!
//! Everything here is pure. Boxes are modelled in data space with their
//! length along +x at heading 0, so a heading rotates the box counter-clockwise
//! about its own centroid.

use nalgebra::{Point2, Rotation2, Vector2};

/// Index of the back-left corner returned by [`corners_of`].
pub const BACK_LEFT: usize = 0;
/// Index of the front-left corner returned by [`corners_of`].
pub const FRONT_LEFT: usize = 1;
/// Index of the front-right corner returned by [`corners_of`].
pub const FRONT_RIGHT: usize = 2;
/// Index of the back-right corner returned by [`corners_of`].
pub const BACK_RIGHT: usize = 3;

/// Returns the corners of an axis-aligned rectangle.
///
/// # Arguments
/// * `center` - Rectangle center
/// * `dims` - `(length, width)`; length runs along the x axis
///
/// Winding is always back-left, front-left, front-right, back-right.
pub fn corners_of(center: Point2<f64>, dims: Vector2<f64>) -> [Point2<f64>; 4] {
    let half_l = dims.x / 2.0;
    let half_w = dims.y / 2.0;

    let mut corners = [center; 4];
    corners[BACK_LEFT] = Point2::new(center.x - half_l, center.y + half_w);
    corners[FRONT_LEFT] = Point2::new(center.x + half_l, center.y + half_w);
    corners[FRONT_RIGHT] = Point2::new(center.x + half_l, center.y - half_w);
    corners[BACK_RIGHT] = Point2::new(center.x - half_l, center.y - half_w);
    corners
}

/// Rotates `point` counter-clockwise by `angle` radians about `pivot`.
pub fn rotate(point: Point2<f64>, angle: f64, pivot: Point2<f64>) -> Point2<f64> {
    pivot + Rotation2::new(angle) * (point - pivot)
}

/// Arithmetic mean of `points`. An empty slice yields the origin.
pub fn centroid(points: &[Point2<f64>]) -> Point2<f64> {
    if points.is_empty() {
        return Point2::origin();
    }
    let sum = points
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / points.len() as f64)
}

/// Corners of a rectangle rotated about its centroid by `heading`.
pub fn oriented_box(center: Point2<f64>, dims: Vector2<f64>, heading: f64) -> [Point2<f64>; 4] {
    let corners = corners_of(center, dims);
    let pivot = centroid(&corners);
    corners.map(|c| rotate(c, heading, pivot))
}

/// Midpoint of the two front corners of a box produced by [`corners_of`] or
/// [`oriented_box`].
pub fn front_midpoint(corners: &[Point2<f64>; 4]) -> Point2<f64> {
    nalgebra::center(&corners[FRONT_LEFT], &corners[FRONT_RIGHT])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_corners_winding() {
        let c = corners_of(Point2::new(10.0, 20.0), Vector2::new(4.0, 2.0));

        assert_eq!(c[BACK_LEFT], Point2::new(8.0, 21.0));
        assert_eq!(c[FRONT_LEFT], Point2::new(12.0, 21.0));
        assert_eq!(c[FRONT_RIGHT], Point2::new(12.0, 19.0));
        assert_eq!(c[BACK_RIGHT], Point2::new(8.0, 19.0));
    }

    #[test]
    fn test_centroid_of_box_is_center() {
        let center = Point2::new(-3.5, 7.25);
        let c = corners_of(center, Vector2::new(4.5, 1.8));
        let m = centroid(&c);

        assert_relative_eq!(m.x, center.x, epsilon = 1e-12);
        assert_relative_eq!(m.y, center.y, epsilon = 1e-12);
        assert_eq!(centroid(&[]), Point2::origin());
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let p = rotate(Point2::new(2.0, 1.0), FRAC_PI_2, Point2::new(1.0, 1.0));

        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_oriented_box_front_follows_heading() {
        let center = Point2::new(0.0, 0.0);
        let dims = Vector2::new(4.0, 2.0);

        // Heading 0 faces +x
        let tip = front_midpoint(&oriented_box(center, dims, 0.0));
        assert_relative_eq!(tip.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(tip.y, 0.0, epsilon = 1e-12);

        // Heading pi/2 faces +y
        let tip = front_midpoint(&oriented_box(center, dims, FRAC_PI_2));
        assert_relative_eq!(tip.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(tip.y, 2.0, epsilon = 1e-12);

        // Heading pi faces -x
        let tip = front_midpoint(&oriented_box(center, dims, PI));
        assert_relative_eq!(tip.x, -2.0, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_rotate_zero_is_identity(
            px in -1e4f64..1e4, py in -1e4f64..1e4,
            cx in -1e4f64..1e4, cy in -1e4f64..1e4,
        ) {
            let p = Point2::new(px, py);
            let r = rotate(p, 0.0, Point2::new(cx, cy));
            prop_assert!((r - p).norm() < 1e-9);
        }

        #[test]
        fn prop_rotate_round_trip(
            px in -1e4f64..1e4, py in -1e4f64..1e4,
            cx in -1e4f64..1e4, cy in -1e4f64..1e4,
            theta in -10.0f64..10.0,
        ) {
            let p = Point2::new(px, py);
            let pivot = Point2::new(cx, cy);
            let back = rotate(rotate(p, theta, pivot), -theta, pivot);
            prop_assert!((back - p).norm() < 1e-6);
        }

        #[test]
        fn prop_rotation_preserves_distance_to_pivot(
            px in -1e3f64..1e3, py in -1e3f64..1e3,
            theta in -10.0f64..10.0,
        ) {
            let p = Point2::new(px, py);
            let pivot = Point2::new(1.0, -2.0);
            let r = rotate(p, theta, pivot);
            prop_assert!(((r - pivot).norm() - (p - pivot).norm()).abs() < 1e-6);
        }
    }
}
