//! Greedy classification of a traced pixel chain into lines and arcs.
//!
//! A line fit and a circle fit grow side by side from the current start
//! pixel. Growth continues while either is valid; when both fail, the
//! candidate that reached furthest is emitted and growth restarts from its
//! last pixel, so consecutive candidates share an endpoint. Closed loops
//! first try a single whole-loop circle, the common case for holes and
//! bolt circles.

use std::f64::consts::TAU;

use kurbo::{Point, Vec2};

use super::fit::{angular_sweep, CircleAccumulator, CircleFit, FitStats, LineAccumulator, LineFit};
use crate::config::VectorizeConfig;

/// Shape of a candidate segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Line(LineFit),
    /// An arc; `sweep` is the signed turn from first to last pixel.
    Arc { fit: CircleFit, sweep: f64 },
    /// A whole closed loop fitted by one circle.
    Circle { fit: CircleFit, sweep: f64 },
}

/// A classified run of pixels `points[first..=last]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub primitive: Primitive,
    pub first: usize,
    pub last: usize,
    pub stats: FitStats,
}

impl Candidate {
    pub fn is_line(&self) -> bool {
        matches!(self.primitive, Primitive::Line(_))
    }
}

/// True when a chain should be treated as a closed loop: it returns to
/// its start pixel, or it is long enough and its ends nearly meet.
pub fn is_closed_loop(points: &[Point], config: &VectorizeConfig) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let gap = points[0].distance(points[n - 1]);
    gap == 0.0 || (n >= config.min_loop_points && gap <= config.closed_loop_gap)
}

/// Split a pixel chain into consecutive line/arc candidates.
///
/// Candidates cover the chain from the first to the last pixel and share
/// endpoints (`next.first == prev.last`).
pub fn segment_polyline(points: &[Point], config: &VectorizeConfig) -> Vec<Candidate> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }

    if n >= config.min_loop_points && points[0].distance(points[n - 1]) <= config.closed_loop_gap {
        if let Some(circle) = whole_loop_circle(points, config) {
            return vec![circle];
        }
    }

    let mut candidates = Vec::new();
    let mut start = 0;
    while start < n - 1 {
        let candidate = grow(points, start, config);
        start = candidate.last;
        candidates.push(candidate);
    }
    candidates
}

fn whole_loop_circle(points: &[Point], config: &VectorizeConfig) -> Option<Candidate> {
    let mut acc = CircleAccumulator::new();
    for &p in points {
        acc.push(p);
    }
    let fit = acc.solve()?;
    let stats = FitStats::measure(points, |p| fit.residual(p));
    if !config.accepts(stats.median, stats.p90) {
        return None;
    }
    Some(Candidate {
        primitive: Primitive::Circle {
            fit,
            sweep: angular_sweep(points, fit.center),
        },
        first: 0,
        last: points.len() - 1,
        stats,
    })
}

/// Grow line and arc candidates from `start` and return the better one.
fn grow(points: &[Point], start: usize, config: &VectorizeConfig) -> Candidate {
    let mut lines = LineAccumulator::new();
    let mut circles = CircleAccumulator::new();
    lines.push(points[start]);
    circles.push(points[start]);

    let mut best_line: Option<Candidate> = None;
    let mut best_arc: Option<Candidate> = None;

    for i in start + 1..points.len() {
        lines.push(points[i]);
        circles.push(points[i]);
        let span = &points[start..=i];

        let line = lines.solve().and_then(|fit| {
            let stats = FitStats::measure(span, |p| fit.residual(p));
            config.accepts(stats.median, stats.p90).then_some(Candidate {
                primitive: Primitive::Line(fit),
                first: start,
                last: i,
                stats,
            })
        });

        let arc = circles
            .solve()
            .filter(|fit| fit.radius <= config.max_radius)
            .and_then(|fit| {
                let sweep = angular_sweep(span, fit.center);
                if sweep.abs() >= TAU - config.sweep_margin {
                    return None;
                }
                let stats = FitStats::measure(span, |p| fit.residual(p));
                config.accepts(stats.median, stats.p90).then_some(Candidate {
                    primitive: Primitive::Arc { fit, sweep },
                    first: start,
                    last: i,
                    stats,
                })
            });

        if line.is_none() && arc.is_none() {
            break;
        }
        best_line = line.or(best_line);
        best_arc = arc.or(best_arc);
    }

    match (best_line, best_arc) {
        (Some(line), Some(arc)) => {
            let arc_wins = arc.last > line.last
                || (arc.last == line.last && arc.stats.rms < config.arc_preference * line.stats.rms);
            if arc_wins {
                arc
            } else {
                line
            }
        }
        (Some(line), None) => line,
        (None, Some(arc)) => arc,
        (None, None) => two_point_line(points, start),
    }
}

/// Fallback when nothing fits even two pixels (they coincide).
fn two_point_line(points: &[Point], start: usize) -> Candidate {
    let (a, b) = (points[start], points[start + 1]);
    let direction = crate::geom::unit(b - a).unwrap_or(Vec2::new(1.0, 0.0));
    Candidate {
        primitive: Primitive::Line(LineFit {
            centroid: a.midpoint(b),
            direction,
        }),
        first: start,
        last: start + 1,
        stats: FitStats::default(),
    }
}
