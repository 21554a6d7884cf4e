//! Joint refinement of an edge's segments by finite-difference gradient
//! descent.
//!
//! An edge is held as shared breakpoint nodes plus one off-chord control
//! point per segment (its "sagitta point"). Start, sagitta point and end
//! define a three-point circle, or a line when they are collinear, so
//! moving a breakpoint reshapes both segments that meet there and
//! neighboring segments stay connected by construction.
//!
//! After each descent, segments whose worst pixel still fits badly are
//! split at that pixel and the descent runs again, up to a fixed number of
//! rounds. A closed loop stores its start/end breakpoint once; both
//! adjoining segments pull on that slot and its gradient is halved, which
//! averages their pulls.

use kurbo::{Point, Vec2};
use tracing::{debug, trace};

use super::fit::angular_sweep;
use super::segment::{is_closed_loop, Candidate, Primitive};
use crate::config::VectorizeConfig;
use crate::geom::{angle_of, circle_through, distance_to_line, is_finite_point, signed_sagitta, EPSILON};
use crate::vector::{ArcSegment, LineSegment, Segment};

/// A shared breakpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptNode {
    pub pos: Point,
    /// Fixed nodes are never moved by the descent.
    pub fixed: bool,
}

/// One segment of the working set.
#[derive(Debug, Clone, PartialEq)]
pub struct OptSegment {
    /// Index of the start node.
    pub start: usize,
    /// Index of the end node (equal to `start` for a full circle).
    pub end: usize,
    pub sagitta: Point,
    pub source: Vec<Point>,
    /// A full circle: center is the midpoint of node and sagitta point.
    pub full: bool,
}

/// Which ends of an edge must stay where they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgePins {
    pub start: bool,
    pub end: bool,
}

/// Result of optimizing one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeOutcome {
    pub segments: Vec<Segment>,
    /// Split rounds that actually split something.
    pub rounds: usize,
    /// Total number of splits performed.
    pub splits: usize,
    /// The descent hit a non-finite coordinate and the last finite state
    /// was kept instead.
    pub aborted: bool,
}

/// Geometry implied by a (start, sagitta, end) triple.
#[derive(Debug, Clone, Copy)]
enum Shape {
    Circle { center: Point, radius: f64 },
    Line { a: Point, b: Point },
}

impl Shape {
    fn new(a: Point, s: Point, b: Point, full: bool, max_radius: f64) -> Self {
        if full {
            return Shape::Circle {
                center: a.midpoint(s),
                radius: a.distance(s) / 2.0,
            };
        }
        match circle_through(a, s, b) {
            Some((center, radius)) if radius <= max_radius => Shape::Circle { center, radius },
            _ => Shape::Line { a, b },
        }
    }

    fn residual(&self, p: Point) -> f64 {
        match *self {
            Shape::Circle { center, radius } => (p.distance(center) - radius).abs(),
            Shape::Line { a, b } => distance_to_line(p, a, b),
        }
    }
}

/// The descent diverged to a non-finite coordinate.
#[derive(Debug, Clone, Copy)]
struct Unstable;

struct Problem<'a> {
    nodes: Vec<OptNode>,
    segments: Vec<OptSegment>,
    closed: bool,
    config: &'a VectorizeConfig,
}

/// Refine the segmenter's `candidates` for the pixel chain `points` and
/// convert the result into typed segments.
///
/// Never fails: if the descent becomes numerically unstable the last
/// finite state is converted and `aborted` is set.
pub fn optimize_edge(
    points: &[Point],
    candidates: &[Candidate],
    pins: EdgePins,
    config: &VectorizeConfig,
) -> OptimizeOutcome {
    if points.len() < 2 || candidates.is_empty() {
        return OptimizeOutcome {
            segments: Vec::new(),
            rounds: 0,
            splits: 0,
            aborted: false,
        };
    }

    let mut problem = Problem::build(points, candidates, pins, config);
    let mut rounds = 0;
    let mut splits = 0;
    let mut aborted = problem.descend().is_err();

    while !aborted && rounds < config.max_outer_rounds {
        let split = problem.split();
        if split == 0 {
            break;
        }
        rounds += 1;
        splits += split;
        trace!(round = rounds, split, segments = problem.segments.len(), "split round");
        aborted = problem.descend().is_err();
    }

    if aborted {
        debug!(
            points = points.len(),
            segments = problem.segments.len(),
            "non-finite coordinates, keeping last stable state"
        );
    }

    OptimizeOutcome {
        segments: problem.to_segments(),
        rounds,
        splits,
        aborted,
    }
}

impl<'a> Problem<'a> {
    fn build(
        points: &[Point],
        candidates: &[Candidate],
        pins: EdgePins,
        config: &'a VectorizeConfig,
    ) -> Self {
        let n = points.len();
        let closed = is_closed_loop(points, config);

        if let [Candidate {
            primitive: Primitive::Circle { fit, .. },
            ..
        }] = candidates
        {
            let a = points[0];
            return Self {
                nodes: vec![OptNode {
                    pos: a,
                    fixed: pins.start || pins.end,
                }],
                segments: vec![OptSegment {
                    start: 0,
                    end: 0,
                    sagitta: fit.center + (fit.center - a),
                    source: points.to_vec(),
                    full: true,
                }],
                closed: true,
                config,
            };
        }

        if closed && candidates.len() == 1 {
            return Self::split_loop(points, pins, config);
        }

        let mut nodes = vec![OptNode {
            pos: if closed {
                points[0].midpoint(points[n - 1])
            } else {
                points[candidates[0].first]
            },
            fixed: pins.start || (closed && pins.end),
        }];
        let mut segments: Vec<OptSegment> = Vec::with_capacity(candidates.len());
        let last = candidates.len() - 1;

        for (j, candidate) in candidates.iter().enumerate() {
            let start = segments.last().map_or(0, |s| s.end);
            let end = if closed && j == last {
                0
            } else {
                nodes.push(OptNode {
                    pos: points[candidate.last],
                    fixed: j == last && pins.end,
                });
                nodes.len() - 1
            };
            let source = points[candidate.first..=candidate.last].to_vec();
            let sagitta = match candidate.primitive {
                Primitive::Line(_) => points[candidate.first].midpoint(points[candidate.last]),
                Primitive::Arc { fit, .. } | Primitive::Circle { fit, .. } => {
                    fit.project(source[source.len() / 2])
                }
            };
            segments.push(OptSegment {
                start,
                end,
                sagitta,
                source,
                full: false,
            });
        }

        Self {
            nodes,
            segments,
            closed,
            config,
        }
    }

    /// A closed loop segmented as one open piece: give it a second
    /// breakpoint at the pixel farthest from the start.
    fn split_loop(points: &[Point], pins: EdgePins, config: &'a VectorizeConfig) -> Self {
        let n = points.len();
        let origin = points[0];
        let far = (1..n - 1)
            .max_by(|&i, &j| {
                origin
                    .distance(points[i])
                    .total_cmp(&origin.distance(points[j]))
                    .then(j.cmp(&i))
            })
            .unwrap_or(n / 2);

        let left = points[..=far].to_vec();
        let right = points[far..].to_vec();
        Self {
            nodes: vec![
                OptNode {
                    pos: points[0].midpoint(points[n - 1]),
                    fixed: pins.start || pins.end,
                },
                OptNode {
                    pos: points[far],
                    fixed: false,
                },
            ],
            segments: vec![
                OptSegment {
                    start: 0,
                    end: 1,
                    sagitta: middle(&left),
                    source: left,
                    full: false,
                },
                OptSegment {
                    start: 1,
                    end: 0,
                    sagitta: middle(&right),
                    source: right,
                    full: false,
                },
            ],
            closed: true,
            config,
        }
    }

    fn shape(&self, seg: &OptSegment) -> Shape {
        Shape::new(
            self.nodes[seg.start].pos,
            seg.sagitta,
            self.nodes[seg.end].pos,
            seg.full,
            self.config.max_radius,
        )
    }

    /// Fidelity plus axis-alignment cost of one segment.
    fn cost(&self, a: Point, s: Point, b: Point, seg: &OptSegment) -> f64 {
        let config = self.config;
        let shape = Shape::new(a, s, b, seg.full, config.max_radius);
        let fidelity: f64 = seg.source.iter().map(|&p| shape.residual(p).powi(2)).sum();
        let mut cost = config.fidelity_weight * fidelity;

        if !seg.full && signed_sagitta(a, s, b).abs() < config.alignment_sagitta {
            let d = b - a;
            let len2 = d.hypot2();
            if len2 > EPSILON {
                cost += config.alignment_weight * (d.x * d.y / len2).powi(2);
            }
        }
        cost
    }

    /// Gradient descent until convergence or the iteration limit.
    fn descend(&mut self) -> Result<usize, Unstable> {
        let config = self.config;
        let h = config.gradient_step;
        let shared_slot = self.closed && !(self.segments.len() == 1 && self.segments[0].full);

        for iteration in 0..config.max_inner_iterations {
            let mut node_grad = vec![Vec2::ZERO; self.nodes.len()];
            let mut sagitta_grad = vec![Vec2::ZERO; self.segments.len()];

            for (k, seg) in self.segments.iter().enumerate() {
                let a = self.nodes[seg.start].pos;
                let b = self.nodes[seg.end].pos;
                let s = seg.sagitta;
                if seg.start == seg.end {
                    node_grad[seg.start] += central_difference(h, |d| self.cost(a + d, s, b + d, seg));
                } else {
                    node_grad[seg.start] += central_difference(h, |d| self.cost(a + d, s, b, seg));
                    node_grad[seg.end] += central_difference(h, |d| self.cost(a, s, b + d, seg));
                }
                sagitta_grad[k] = central_difference(h, |d| self.cost(a, s + d, b, seg));
            }
            if shared_slot {
                node_grad[0] = node_grad[0] * 0.5;
            }

            let snapshot = (self.nodes.clone(), self.sagittas());
            let mut max_step: f64 = 0.0;
            for (node, grad) in self.nodes.iter_mut().zip(&node_grad) {
                if node.fixed {
                    continue;
                }
                let step = clamp(*grad, config.gradient_clamp) * config.learning_rate;
                node.pos -= step;
                max_step = max_step.max(step.x.abs()).max(step.y.abs());
            }
            for (seg, grad) in self.segments.iter_mut().zip(&sagitta_grad) {
                let step = clamp(*grad, config.gradient_clamp) * config.learning_rate;
                seg.sagitta -= step;
                max_step = max_step.max(step.x.abs()).max(step.y.abs());
            }

            if !self.is_finite() || !max_step.is_finite() {
                let (nodes, sagittas) = snapshot;
                self.nodes = nodes;
                for (seg, s) in self.segments.iter_mut().zip(sagittas) {
                    seg.sagitta = s;
                }
                return Err(Unstable);
            }
            if max_step < config.convergence_tolerance {
                return Ok(iteration + 1);
            }
        }
        Ok(config.max_inner_iterations)
    }

    fn sagittas(&self) -> Vec<Point> {
        self.segments.iter().map(|s| s.sagitta).collect()
    }

    fn is_finite(&self) -> bool {
        self.nodes.iter().all(|n| is_finite_point(n.pos))
            && self.segments.iter().all(|s| is_finite_point(s.sagitta))
    }

    /// Split every badly fitting segment at its worst pixel. A full circle
    /// splits into two open segments through its single breakpoint.
    /// Returns the number of splits.
    fn split(&mut self) -> usize {
        let mut out = Vec::with_capacity(self.segments.len());
        let mut count = 0;

        for seg in std::mem::take(&mut self.segments) {
            match self.split_index(&seg) {
                Some(k) => {
                    self.nodes.push(OptNode {
                        pos: seg.source[k],
                        fixed: false,
                    });
                    let mid = self.nodes.len() - 1;
                    let left = seg.source[..=k].to_vec();
                    let right = seg.source[k..].to_vec();
                    out.push(OptSegment {
                        start: seg.start,
                        end: mid,
                        sagitta: middle(&left),
                        source: left,
                        full: false,
                    });
                    out.push(OptSegment {
                        start: mid,
                        end: seg.end,
                        sagitta: middle(&right),
                        source: right,
                        full: false,
                    });
                    count += 1;
                }
                None => out.push(seg),
            }
        }
        self.segments = out;
        count
    }

    /// Where to split `seg`, if anywhere.
    ///
    /// The worst pixel is used when each half keeps at least three pixels.
    /// A worst pixel at or next to a breakpoint means the breakpoint itself
    /// fits badly; the segment is then split at its worst pixel among
    /// those leaving more than `min_split_points` on both sides, so no
    /// sliver is cut off.
    fn split_index(&self, seg: &OptSegment) -> Option<usize> {
        let config = self.config;
        let len = seg.source.len();
        if len <= config.min_split_points {
            return None;
        }
        let shape = self.shape(seg);
        let worst_in = |range: std::ops::Range<usize>| {
            range
                .map(|i| (i, shape.residual(seg.source[i])))
                .fold(None, |best: Option<(usize, f64)>, (i, r)| match best {
                    Some((_, br)) if br >= r => best,
                    _ => Some((i, r)),
                })
        };

        let (k, error) = worst_in(0..len)?;
        if error <= config.split_error {
            return None;
        }
        if (2..len.saturating_sub(2)).contains(&k) {
            return Some(k);
        }
        let m = config.min_split_points.max(2);
        match worst_in(m..len.saturating_sub(m)) {
            Some((k, error)) if error > config.split_error => Some(k),
            _ => None,
        }
    }

    fn to_segments(&self) -> Vec<Segment> {
        self.segments.iter().map(|seg| self.convert(seg)).collect()
    }

    /// Classify a refined segment as a line or an arc.
    fn convert(&self, seg: &OptSegment) -> Segment {
        let config = self.config;
        let a = self.nodes[seg.start].pos;
        let b = self.nodes[seg.end].pos;
        let s = seg.sagitta;

        if seg.full {
            let center = a.midpoint(s);
            let radius = a.distance(s) / 2.0;
            let angle = angle_of(a, center);
            return Segment::Arc(ArcSegment {
                start: a,
                end: a,
                center,
                radius,
                start_angle: angle,
                end_angle: angle,
                clockwise: angular_sweep(&seg.source, center) > 0.0,
                points: seg.source.clone(),
            });
        }

        let chord = a.distance(b);
        let height = signed_sagitta(a, s, b);
        let line = || Segment::Line(LineSegment::new(a, b, seg.source.clone()));
        if chord < EPSILON
            || height.abs() < config.line_sagitta
            || height.abs() / chord < config.line_curvature
        {
            return line();
        }
        match circle_through(a, s, b) {
            Some((center, radius)) if radius <= config.max_radius => Segment::Arc(ArcSegment {
                start: a,
                end: b,
                center,
                radius,
                start_angle: angle_of(a, center),
                end_angle: angle_of(b, center),
                clockwise: height < 0.0,
                points: seg.source.clone(),
            }),
            _ => line(),
        }
    }
}

/// Central-difference gradient of `f` at a zero offset.
fn central_difference(h: f64, f: impl Fn(Vec2) -> f64) -> Vec2 {
    let dx = Vec2::new(h, 0.0);
    let dy = Vec2::new(0.0, h);
    Vec2::new(
        (f(dx) - f(-dx)) / (2.0 * h),
        (f(dy) - f(-dy)) / (2.0 * h),
    )
}

fn clamp(v: Vec2, limit: f64) -> Vec2 {
    Vec2::new(v.x.clamp(-limit, limit), v.y.clamp(-limit, limit))
}

/// Starting sagitta point for a run of pixels: its middle pixel, or the
/// chord midpoint when there is no interior pixel.
fn middle(points: &[Point]) -> Point {
    if points.len() >= 3 {
        points[points.len() / 2]
    } else {
        points[0].midpoint(points[points.len() - 1])
    }
}
