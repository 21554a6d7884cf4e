//! Incremental least-squares line and circle fits.
//!
//! Both accumulators keep running power sums, so growing a candidate by
//! one pixel is O(1); only the residual statistics need a pass over the
//! points. Sums are taken relative to the first pushed point, which keeps
//! the third-order circle moments well conditioned far from the origin.
//!
//! Fit quality is judged with robust residual statistics (median and
//! 90th percentile) rather than rms, so a few stray pixels at a junction
//! do not disqualify an otherwise good fit.

use kurbo::{Point, Vec2};

use crate::geom::{angle_of, wrap_angle, EPSILON};

/// A fitted infinite line: centroid plus unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub centroid: Point,
    pub direction: Vec2,
}

impl LineFit {
    /// Perpendicular distance from `p` to the line.
    pub fn residual(&self, p: Point) -> f64 {
        self.direction.cross(p - self.centroid).abs()
    }
}

/// A fitted circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleFit {
    pub center: Point,
    pub radius: f64,
}

impl CircleFit {
    /// Radial distance from `p` to the circle.
    pub fn residual(&self, p: Point) -> f64 {
        (p.distance(self.center) - self.radius).abs()
    }

    /// Closest point on the circle to `p`.
    pub fn project(&self, p: Point) -> Point {
        let offset = p - self.center;
        let len = offset.hypot();
        if len < EPSILON {
            return self.center + Vec2::new(self.radius, 0.0);
        }
        self.center + offset * (self.radius / len)
    }
}

/// Running sums for a least-squares line fit.
#[derive(Debug, Clone, Default)]
pub struct LineAccumulator {
    origin: Option<Point>,
    n: usize,
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, p: Point) {
        let origin = *self.origin.get_or_insert(p);
        let (x, y) = (p.x - origin.x, p.y - origin.y);
        self.n += 1;
        self.sx += x;
        self.sy += y;
        self.sxx += x * x;
        self.syy += y * y;
        self.sxy += x * y;
    }

    /// Centroid and principal direction of the points so far.
    ///
    /// `None` with fewer than two points or when they all coincide.
    pub fn solve(&self) -> Option<LineFit> {
        let origin = self.origin?;
        if self.n < 2 {
            return None;
        }
        let n = self.n as f64;
        let (mx, my) = (self.sx / n, self.sy / n);
        let cxx = self.sxx / n - mx * mx;
        let cyy = self.syy / n - my * my;
        let cxy = self.sxy / n - mx * my;

        let trace = cxx + cyy;
        if trace < EPSILON {
            return None;
        }
        let det = cxx * cyy - cxy * cxy;
        let disc = (trace * trace / 4.0 - det).max(0.0).sqrt();
        let major = trace / 2.0 + disc;

        let axis = if cxy.abs() > EPSILON {
            Vec2::new(major - cyy, cxy)
        } else if cxx >= cyy {
            Vec2::new(1.0, 0.0)
        } else {
            Vec2::new(0.0, 1.0)
        };
        Some(LineFit {
            centroid: origin + Vec2::new(mx, my),
            direction: axis.normalize(),
        })
    }
}

/// Running sums for an algebraic (Kåsa) circle fit.
#[derive(Debug, Clone, Default)]
pub struct CircleAccumulator {
    origin: Option<Point>,
    n: usize,
    su: f64,
    sv: f64,
    suu: f64,
    svv: f64,
    suv: f64,
    suuu: f64,
    svvv: f64,
    suvv: f64,
    svuu: f64,
}

impl CircleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, p: Point) {
        let origin = *self.origin.get_or_insert(p);
        let (u, v) = (p.x - origin.x, p.y - origin.y);
        self.n += 1;
        self.su += u;
        self.sv += v;
        self.suu += u * u;
        self.svv += v * v;
        self.suv += u * v;
        self.suuu += u * u * u;
        self.svvv += v * v * v;
        self.suvv += u * v * v;
        self.svuu += v * u * u;
    }

    /// Least-squares circle through the points so far.
    ///
    /// `None` with fewer than three points, or when the points are
    /// (numerically) collinear.
    pub fn solve(&self) -> Option<CircleFit> {
        let origin = self.origin?;
        if self.n < 3 {
            return None;
        }
        let n = self.n as f64;
        let (mx, my) = (self.su / n, self.sv / n);

        // Centered second and third moments.
        let cuu = self.suu - self.su * mx;
        let cvv = self.svv - self.sv * my;
        let cuv = self.suv - self.su * my;
        let cuuu = self.suuu - 3.0 * mx * self.suu + 2.0 * n * mx * mx * mx;
        let cvvv = self.svvv - 3.0 * my * self.svv + 2.0 * n * my * my * my;
        let cuvv = self.suvv - 2.0 * my * self.suv - mx * self.svv + 2.0 * n * mx * my * my;
        let cvuu = self.svuu - 2.0 * mx * self.suv - my * self.suu + 2.0 * n * my * mx * mx;

        let det = cuu * cvv - cuv * cuv;
        let scale = (cuu + cvv).powi(2).max(1.0);
        if det <= 1e-9 * scale {
            return None;
        }

        let b1 = (cuuu + cuvv) / 2.0;
        let b2 = (cvvv + cvuu) / 2.0;
        let uc = (b1 * cvv - b2 * cuv) / det;
        let vc = (cuu * b2 - cuv * b1) / det;

        let r2 = uc * uc + vc * vc + (cuu + cvv) / n;
        if r2 <= 0.0 || !r2.is_finite() {
            return None;
        }
        Some(CircleFit {
            center: origin + Vec2::new(mx + uc, my + vc),
            radius: r2.sqrt(),
        })
    }
}

/// Robust residual statistics of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitStats {
    pub rms: f64,
    pub median: f64,
    pub p90: f64,
    pub max: f64,
}

impl FitStats {
    pub fn from_residuals(mut residuals: Vec<f64>) -> Self {
        if residuals.is_empty() {
            return Self::default();
        }
        residuals.sort_by(f64::total_cmp);
        let sum_sq: f64 = residuals.iter().map(|r| r * r).sum();
        Self {
            rms: (sum_sq / residuals.len() as f64).sqrt(),
            median: sorted_percentile(&residuals, 0.5),
            p90: sorted_percentile(&residuals, 0.9),
            max: residuals[residuals.len() - 1],
        }
    }

    /// Statistics of `residual(p)` over `points`.
    pub fn measure(points: &[Point], residual: impl Fn(Point) -> f64) -> Self {
        Self::from_residuals(points.iter().map(|&p| residual(p)).collect())
    }
}

/// Quantile `p` (0..=1) of `values`, interpolating between closest ranks.
/// Returns 0 for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted_percentile(&sorted, p)
}

fn sorted_percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let t = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * t
}

/// Signed total turn of `points` around `center`: the sum of consecutive
/// angle steps, each wrapped to `(-π, π]`. In image coordinates (y down)
/// a positive sweep runs clockwise on screen.
pub fn angular_sweep(points: &[Point], center: Point) -> f64 {
    let mut sweep = 0.0;
    let mut prev = match points.first() {
        Some(&p) => angle_of(p, center),
        None => return 0.0,
    };
    for &p in &points[1..] {
        let angle = angle_of(p, center);
        sweep += wrap_angle(angle - prev);
        prev = angle;
    }
    sweep
}
