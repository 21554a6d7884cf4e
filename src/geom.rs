//! Shared geometry utilities.
//!
//! Points and vectors are `kurbo::Point` / `kurbo::Vec2`; this module only
//! adds the few constructions the fitters and the optimizer share.

use std::f64::consts::{PI, TAU};

use kurbo::{Point, Vec2};

/// Below this, lengths and determinants are treated as zero.
pub const EPSILON: f64 = 1e-12;

/// Perpendicular distance from `p` to the infinite line through `a` and `b`.
///
/// Falls back to the point distance when `a` and `b` coincide.
pub fn distance_to_line(p: Point, a: Point, b: Point) -> f64 {
    let chord = b - a;
    let len = chord.hypot();
    if len < EPSILON {
        return p.distance(a);
    }
    chord.cross(p - a).abs() / len
}

/// Signed height of `s` above the chord `a → b`.
///
/// Positive when `s` lies on the positive-cross side of the chord. For a
/// zero-length chord this is the plain distance from `a`.
pub fn signed_sagitta(a: Point, s: Point, b: Point) -> f64 {
    let chord = b - a;
    let len = chord.hypot();
    if len < EPSILON {
        return s.distance(a);
    }
    chord.cross(s - a) / len
}

/// Circle through three points, as `(center, radius)`.
///
/// Returns `None` when the points are collinear or coincident.
pub fn circle_through(a: Point, b: Point, c: Point) -> Option<(Point, f64)> {
    // Work relative to `a` to keep the determinant well conditioned.
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * ab.cross(ac);
    if d.abs() < EPSILON {
        return None;
    }
    let ab2 = ab.hypot2();
    let ac2 = ac.hypot2();
    let ux = (ac.y * ab2 - ab.y * ac2) / d;
    let uy = (ab.x * ac2 - ac.x * ab2) / d;
    let offset = Vec2::new(ux, uy);
    let radius = offset.hypot();
    if !radius.is_finite() {
        return None;
    }
    Some((a + offset, radius))
}

/// Angle of `p` around `center`, in `(-π, π]`.
pub fn angle_of(p: Point, center: Point) -> f64 {
    (p - center).atan2()
}

/// Wrap an angle difference into `(-π, π]`.
pub fn wrap_angle(mut angle: f64) -> f64 {
    while angle <= -PI {
        angle += TAU;
    }
    while angle > PI {
        angle -= TAU;
    }
    angle
}

/// Unit vector along `v`, or `None` for a zero vector.
pub fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.hypot();
    (len > EPSILON).then(|| v / len)
}

/// True when every coordinate is finite.
pub fn is_finite_point(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_through_right_angle() {
        let (c, r) = circle_through(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 0.0),
        )
        .expect("three non-collinear points");
        assert!((c - Point::new(1.0, 0.0)).hypot() < 1e-12);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_points_have_no_circle() {
        let a = Point::new(0.0, 0.0);
        assert!(circle_through(a, Point::new(1.0, 1.0), Point::new(3.0, 3.0)).is_none());
        assert!(circle_through(a, a, Point::new(3.0, 3.0)).is_none());
    }

    #[test]
    fn sagitta_sign_follows_cross_product() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(4.0, 0.0);
        assert!((signed_sagitta(a, Point::new(2.0, 1.0), b) - 1.0).abs() < 1e-12);
        assert!((signed_sagitta(a, Point::new(2.0, -1.5), b) + 1.5).abs() < 1e-12);
        assert!((distance_to_line(Point::new(2.0, -1.5), a, b) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-12);
        assert!((wrap_angle(-1.5 * PI) - 0.5 * PI).abs() < 1e-12);
    }
}
