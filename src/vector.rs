//! Output model: typed line/arc segments grouped into paths.
//!
//! Coordinates are pixel centers in image space (y down). An arc's
//! `clockwise` flag is the on-screen direction of travel from `start` to
//! `end`, which is also the direction of increasing `atan2` angle.

use std::f64::consts::{PI, TAU};

use kurbo::{Arc, BezPath, Point, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::VectorizeError;

/// A straight segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
    /// Unit vector from `start` to `end` (`(1, 0)` for a zero-length line).
    pub direction: Vec2,
    /// Source pixels this segment was fitted to.
    pub points: Vec<Point>,
}

impl LineSegment {
    pub fn new(start: Point, end: Point, points: Vec<Point>) -> Self {
        let direction = crate::geom::unit(end - start).unwrap_or(Vec2::new(1.0, 0.0));
        Self {
            start,
            end,
            direction,
            points,
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// A circular arc, or a full circle when `start == end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcSegment {
    pub start: Point,
    pub end: Point,
    pub center: Point,
    pub radius: f64,
    /// Angle of `start` around `center`, radians.
    pub start_angle: f64,
    /// Angle of `end` around `center`, radians.
    pub end_angle: f64,
    pub clockwise: bool,
    /// Source pixels this segment was fitted to.
    pub points: Vec<Point>,
}

impl ArcSegment {
    pub fn is_full_circle(&self) -> bool {
        self.start == self.end
    }

    /// Angle swept travelling from `start` to `end` in the arc's
    /// direction, in `[0, 2π]`.
    pub fn span(&self) -> f64 {
        if self.is_full_circle() {
            return TAU;
        }
        let delta = self.end_angle - self.start_angle;
        if self.clockwise {
            delta.rem_euclid(TAU)
        } else {
            (-delta).rem_euclid(TAU)
        }
    }

    /// SVG large-arc flag.
    pub fn large_arc(&self) -> bool {
        self.span() > PI
    }

    /// Signed sweep in kurbo's convention (positive = increasing angle).
    pub fn signed_sweep(&self) -> f64 {
        if self.clockwise {
            self.span()
        } else {
            -self.span()
        }
    }

    /// Point on the arc at parameter `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point {
        let angle = self.start_angle + self.signed_sweep() * t;
        self.center + Vec2::from_angle(angle) * self.radius
    }
}

/// One output primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    Line(LineSegment),
    Arc(ArcSegment),
}

impl Segment {
    pub fn start(&self) -> Point {
        match self {
            Segment::Line(line) => line.start,
            Segment::Arc(arc) => arc.start,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            Segment::Line(line) => line.end,
            Segment::Arc(arc) => arc.end,
        }
    }

    /// Source pixels the segment was fitted to.
    pub fn points(&self) -> &[Point] {
        match self {
            Segment::Line(line) => &line.points,
            Segment::Arc(arc) => &arc.points,
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self, Segment::Line(_))
    }

    /// Append the segment to `path`, whose current point must be `start`.
    /// Arcs are approximated by cubics.
    pub fn append_to(&self, path: &mut BezPath) {
        match self {
            Segment::Line(line) => path.line_to(line.end),
            Segment::Arc(arc) => {
                let kurbo_arc = Arc {
                    center: arc.center,
                    radii: Vec2::new(arc.radius, arc.radius),
                    start_angle: arc.start_angle,
                    sweep_angle: arc.signed_sweep(),
                    x_rotation: 0.0,
                };
                path.extend(kurbo_arc.append_iter(0.1));
            }
        }
    }

    /// Distance from `p` to the segment's supporting line or circle.
    pub fn residual(&self, p: Point) -> f64 {
        match self {
            Segment::Line(line) => crate::geom::distance_to_line(p, line.start, line.end),
            Segment::Arc(arc) => (p.distance(arc.center) - arc.radius).abs(),
        }
    }

    fn all_finite(&self) -> bool {
        use crate::geom::is_finite_point;
        match self {
            Segment::Line(line) => is_finite_point(line.start) && is_finite_point(line.end),
            Segment::Arc(arc) => {
                is_finite_point(arc.start)
                    && is_finite_point(arc.end)
                    && is_finite_point(arc.center)
                    && arc.radius.is_finite()
                    && arc.start_angle.is_finite()
                    && arc.end_angle.is_finite()
            }
        }
    }
}

/// The vectorized form of one traced edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// The traced pixel chain.
    pub points: Vec<Point>,
    /// True when the last segment ends where the first begins.
    pub closed: bool,
    pub segments: Vec<Segment>,
}

impl Path {
    /// True when every output coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.segments.iter().all(Segment::all_finite)
    }

    /// Convert to a kurbo path.
    pub fn to_bezpath(&self) -> BezPath {
        let mut path = BezPath::new();
        let Some(first) = self.segments.first() else {
            return path;
        };
        path.move_to(first.start());
        for segment in &self.segments {
            segment.append_to(&mut path);
        }
        if self.closed {
            path.close_path();
        }
        path
    }
}

/// Vectorization result for a whole skeleton image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorImage {
    pub width: usize,
    pub height: usize,
    pub paths: Vec<Path>,
}

impl VectorImage {
    pub fn segment_count(&self) -> usize {
        self.paths.iter().map(|p| p.segments.len()).sum()
    }

    pub fn line_count(&self) -> usize {
        self.segments().filter(|s| s.is_line()).count()
    }

    pub fn arc_count(&self) -> usize {
        self.segments().filter(|s| !s.is_line()).count()
    }

    /// Every segment of every path, in path order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.paths.iter().flat_map(|p| p.segments.iter())
    }

    pub fn to_bezpaths(&self) -> Vec<BezPath> {
        self.paths.iter().map(Path::to_bezpath).collect()
    }

    pub fn to_json(&self) -> Result<String, VectorizeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, VectorizeError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use kurbo::Shape;

    use super::*;

    fn quarter(clockwise: bool) -> ArcSegment {
        // Center (10, 10), radius 5; start on +x, end on +y (below, y down).
        let (start, end, start_angle, end_angle) = if clockwise {
            (Point::new(15.0, 10.0), Point::new(10.0, 15.0), 0.0, FRAC_PI_2)
        } else {
            (Point::new(10.0, 15.0), Point::new(15.0, 10.0), FRAC_PI_2, 0.0)
        };
        ArcSegment {
            start,
            end,
            center: Point::new(10.0, 10.0),
            radius: 5.0,
            start_angle,
            end_angle,
            clockwise,
            points: Vec::new(),
        }
    }

    #[test]
    fn arc_span_follows_direction() {
        let cw = quarter(true);
        assert!((cw.span() - FRAC_PI_2).abs() < 1e-12);
        assert!(!cw.large_arc());
        assert!(cw.point_at(0.5).distance(Point::new(10.0 + 5.0 * 0.5f64.sqrt(), 10.0 + 5.0 * 0.5f64.sqrt())) < 1e-9);

        let ccw = quarter(false);
        assert!((ccw.span() - FRAC_PI_2).abs() < 1e-12);

        // Same endpoints, opposite direction: the long way round.
        let long_way = ArcSegment {
            clockwise: false,
            ..quarter(true)
        };
        assert!((long_way.span() - 1.5 * PI).abs() < 1e-12);
        assert!(long_way.large_arc());
    }

    #[test]
    fn full_circle_spans_a_turn() {
        let p = Point::new(15.0, 10.0);
        let circle = ArcSegment {
            start: p,
            end: p,
            end_angle: 0.0,
            ..quarter(true)
        };
        assert!(circle.is_full_circle());
        assert_eq!(circle.span(), TAU);
        assert!(circle.large_arc());
    }

    #[test]
    fn bezpath_matches_arc_geometry() {
        let path = Path {
            points: Vec::new(),
            closed: false,
            segments: vec![
                Segment::Line(LineSegment::new(Point::new(5.0, 10.0), Point::new(15.0, 10.0), Vec::new())),
                Segment::Arc(quarter(true)),
            ],
        };
        let bez = path.to_bezpath();
        let bbox = bez.bounding_box();
        assert!((bbox.x0 - 5.0).abs() < 1e-6);
        assert!((bbox.x1 - 15.0).abs() < 1e-6);
        assert!((bbox.y1 - 15.0).abs() < 1e-6);
        assert!(bbox.y0 >= 10.0 - 1e-6);
    }

    #[test]
    fn counts_and_json() {
        let image = VectorImage {
            width: 20,
            height: 20,
            paths: vec![Path {
                points: vec![Point::new(5.0, 10.0), Point::new(15.0, 10.0)],
                closed: false,
                segments: vec![
                    Segment::Line(LineSegment::new(Point::new(5.0, 10.0), Point::new(15.0, 10.0), Vec::new())),
                    Segment::Arc(quarter(true)),
                ],
            }],
        };
        assert_eq!(image.segment_count(), 2);
        assert_eq!(image.line_count(), 1);
        assert_eq!(image.arc_count(), 1);

        let json = image.to_json().expect("serialize");
        assert!(json.contains(r#""type": "line""#));
        assert!(json.contains(r#""type": "arc""#));
        let back = VectorImage::from_json(&json).expect("parse");
        assert_eq!(back.segment_count(), 2);
        match &back.paths[0].segments[1] {
            Segment::Arc(arc) => {
                assert!(arc.clockwise);
                assert!((arc.end_angle - FRAC_PI_2).abs() < 1e-12);
            }
            other => panic!("expected an arc, got {other:?}"),
        }
    }

    #[test]
    fn zero_length_line_has_a_direction() {
        let p = Point::new(3.0, 3.0);
        let line = LineSegment::new(p, p, vec![p]);
        assert_eq!(line.direction, Vec2::new(1.0, 0.0));
        assert_eq!(line.length(), 0.0);
    }
}
