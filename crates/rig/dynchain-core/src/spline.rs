//! Clamped B-spline curves: knot vectors, evaluation and closest-point queries.
//!
//! Chain positions are used directly as control vertices, so a curve starts and ends exactly on
//! the first and last controller and is pulled toward the ones in between.

use crate::error::SceneError;
use crate::scene::SceneStore;
use crate::types::{CurveNodes, NodeHandle};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Open (clamped) or periodic curve form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveForm {
    Open,
    Periodic,
}

/// Non-decreasing knot vector with `n + degree + 1` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnotVector(Vec<f64>);

impl KnotVector {
    /// Clamped knot vector for `n` control vertices: `degree + 1` zeros, the interior integers,
    /// then `degree + 1` copies of `n - degree`.
    pub fn clamped(n: usize, degree: usize) -> Result<Self, SceneError> {
        if degree == 0 {
            return Err(SceneError::InvalidCurve("degree must be at least 1".into()));
        }
        if n <= degree {
            return Err(SceneError::InvalidCurve(format!(
                "{n} control vertices cannot carry a degree {degree} curve"
            )));
        }
        let spans = n - degree;
        let mut knots = Vec::with_capacity(n + degree + 1);
        knots.extend(std::iter::repeat(0.0).take(degree));
        knots.extend((0..=spans).map(|k| k as f64));
        knots.extend(std::iter::repeat(spans as f64).take(degree));
        Ok(KnotVector(knots))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Knots in the host's convention, which omits the outermost entry at each end
    /// (`n + degree - 1` values).
    pub fn host_knots(&self) -> &[f64] {
        if self.0.len() < 2 {
            return &self.0;
        }
        &self.0[1..self.0.len() - 1]
    }
}

/// Geometry handed to the host's curve construction primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveData {
    pub cvs: Vec<Point3<f64>>,
    pub knots: KnotVector,
    pub degree: usize,
    pub form: CurveForm,
    pub rational: bool,
}

impl CurveData {
    /// Open, non-rational curve of `degree` over `cvs`.
    pub fn open(cvs: Vec<Point3<f64>>, degree: usize) -> Result<Self, SceneError> {
        let knots = KnotVector::clamped(cvs.len(), degree)?;
        Ok(Self {
            cvs,
            knots,
            degree,
            form: CurveForm::Open,
            rational: false,
        })
    }

    /// Check the B-spline relation between vertex count, degree and knot count.
    pub fn validate(&self) -> Result<(), SceneError> {
        let expected = self.cvs.len() + self.degree + 1;
        if self.knots.len() != expected {
            return Err(SceneError::InvalidCurve(format!(
                "expected {expected} knots, got {}",
                self.knots.len()
            )));
        }
        if self.knots.as_slice().windows(2).any(|w| w[1] < w[0]) {
            return Err(SceneError::InvalidCurve("knots must be non-decreasing".into()));
        }
        if self.rational {
            return Err(SceneError::InvalidCurve("rational curves are not supported".into()));
        }
        Ok(())
    }

    /// Parameter range `(min, max)`.
    pub fn domain(&self) -> (f64, f64) {
        let k = self.knots.as_slice();
        (k[self.degree], k[self.cvs.len()])
    }

    fn span(&self, t: f64) -> usize {
        let k = self.knots.as_slice();
        let n = self.cvs.len();
        if t >= k[n] {
            return n - 1;
        }
        let mut span = self.degree;
        while span + 1 < n && k[span + 1] <= t {
            span += 1;
        }
        span
    }

    /// Position at parameter `t` (clamped to the domain), by de Boor's algorithm.
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        let (lo, hi) = self.domain();
        let t = t.clamp(lo, hi);
        let p = self.degree;
        let k = self.knots.as_slice();
        let s = self.span(t);

        let mut d: Vec<Vector3<f64>> = (0..=p).map(|j| self.cvs[j + s - p].coords).collect();
        for r in 1..=p {
            for j in (r..=p).rev() {
                let left = k[j + s - p];
                let denom = k[j + 1 + s - r] - left;
                let alpha = if denom.abs() < f64::EPSILON {
                    0.0
                } else {
                    (t - left) / denom
                };
                d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
            }
        }
        Point3::from(d[p])
    }

    /// The hodograph: a curve one degree lower whose points are this curve's first derivative.
    /// `None` for degree 1 input, whose derivative is piecewise constant and handled directly.
    fn hodograph(&self) -> Option<CurveData> {
        if self.degree < 2 {
            return None;
        }
        let p = self.degree as f64;
        let k = self.knots.as_slice();
        let cvs = self
            .cvs
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let denom = k[i + self.degree + 1] - k[i + 1];
                if denom.abs() < f64::EPSILON {
                    Point3::origin()
                } else {
                    Point3::from((w[1] - w[0]) * (p / denom))
                }
            })
            .collect();
        Some(CurveData {
            cvs,
            knots: KnotVector(k[1..k.len() - 1].to_vec()),
            degree: self.degree - 1,
            form: self.form,
            rational: false,
        })
    }

    /// First derivative (unnormalized tangent) at `t`.
    pub fn tangent_at(&self, t: f64) -> Vector3<f64> {
        match self.hodograph() {
            Some(h) => h.point_at(t).coords,
            None => {
                let (lo, hi) = self.domain();
                let s = self.span(t.clamp(lo, hi));
                let k = self.knots.as_slice();
                let denom = k[s + 1] - k[s];
                if denom.abs() < f64::EPSILON {
                    Vector3::zeros()
                } else {
                    (self.cvs[s] - self.cvs[s - 1]) / denom
                }
            }
        }
    }

    fn second_derivative_at(&self, t: f64) -> Vector3<f64> {
        match self.hodograph() {
            Some(h) => h.tangent_at(t),
            None => Vector3::zeros(),
        }
    }

    /// Parameter of the point on the curve closest to `point`: a coarse scan followed by
    /// `iterations` Newton refinements.
    pub fn closest_param(&self, point: &Point3<f64>, iterations: u32) -> f64 {
        let (lo, hi) = self.domain();
        let samples = 16 * (self.cvs.len() - self.degree).max(1);
        let mut best_t = lo;
        let mut best_d = f64::INFINITY;
        for i in 0..=samples {
            let t = lo + (hi - lo) * i as f64 / samples as f64;
            let d = (self.point_at(t) - point).norm_squared();
            if d < best_d {
                best_d = d;
                best_t = t;
            }
        }

        let mut t = best_t;
        for _ in 0..iterations {
            let diff = self.point_at(t) - point;
            let d1 = self.tangent_at(t);
            let d2 = self.second_derivative_at(t);
            let f = diff.dot(&d1);
            let df = d1.dot(&d1) + diff.dot(&d2);
            if df.abs() < 1e-12 {
                break;
            }
            let next = (t - f / df).clamp(lo, hi);
            if (next - t).abs() < 1e-12 {
                t = next;
                break;
            }
            t = next;
        }
        t
    }
}

/// Build an open curve of `degree` over `points` in the scene. Given `transform`, the new shape is
/// parented under it; calling twice with the first call's transform yields two independent shapes
/// sharing one transform.
pub fn build_curve<S: SceneStore + ?Sized>(
    store: &mut S,
    points: &[Point3<f64>],
    degree: usize,
    transform: Option<NodeHandle>,
) -> Result<CurveNodes, SceneError> {
    let data = CurveData::open(points.to_vec(), degree)?;
    store.create_curve(&data, transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect()
    }

    #[test]
    fn clamped_knots_follow_the_bspline_relation() {
        for n in 2..12 {
            for degree in 1..n.min(4) {
                let knots = KnotVector::clamped(n, degree).unwrap();
                let k = knots.as_slice();
                assert_eq!(k.len(), n + degree + 1);
                assert!(k.windows(2).all(|w| w[0] <= w[1]));
                let max = (n - degree) as f64;
                assert!(k[..=degree].iter().all(|&v| v == 0.0));
                assert!(k[k.len() - degree - 1..].iter().all(|&v| v == max));
            }
        }
    }

    #[test]
    fn host_knots_drop_one_clamp_at_each_end() {
        let knots = KnotVector::clamped(5, 2).unwrap();
        assert_eq!(knots.as_slice(), &[0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
        assert_eq!(knots.host_knots(), &[0.0, 0.0, 1.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn rejects_too_few_vertices() {
        assert!(KnotVector::clamped(2, 2).is_err());
        assert!(KnotVector::clamped(3, 0).is_err());
    }

    #[test]
    fn endpoints_are_interpolated() {
        let cvs = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, -1.0, 1.0),
            Point3::new(4.0, 0.5, 0.0),
        ];
        let curve = CurveData::open(cvs.clone(), 2).unwrap();
        let (lo, hi) = curve.domain();
        assert_eq!((lo, hi), (0.0, 2.0));
        assert!((curve.point_at(lo) - cvs[0]).norm() < 1e-12);
        assert!((curve.point_at(hi) - cvs[3]).norm() < 1e-12);
    }

    #[test]
    fn tangent_matches_finite_difference() {
        let cvs = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, -1.0, 1.0),
            Point3::new(4.0, 0.5, 0.0),
        ];
        let curve = CurveData::open(cvs, 2).unwrap();
        let h = 1e-6;
        for &t in &[0.25, 0.9, 1.4] {
            let fd = (curve.point_at(t + h) - curve.point_at(t - h)) / (2.0 * h);
            assert!((fd - curve.tangent_at(t)).norm() < 1e-5);
        }
    }

    #[test]
    fn closest_param_recovers_points_on_a_straight_curve() {
        let curve = CurveData::open(line(5), 2).unwrap();
        for i in 0..5 {
            let target = Point3::new(i as f64, 0.0, 0.0);
            let t = curve.closest_param(&target, 10);
            assert!((curve.point_at(t) - target).norm() < 1e-6, "cv {i}");
        }
    }

    #[test]
    fn closest_param_projects_off_curve_points() {
        let curve = CurveData::open(line(4), 2).unwrap();
        let t = curve.closest_param(&Point3::new(1.5, 3.0, 0.0), 10);
        let p = curve.point_at(t);
        assert!((p.x - 1.5).abs() < 1e-6);
        assert!(p.y.abs() < 1e-12);
    }

    #[test]
    fn build_curve_shares_a_transform_on_request() {
        use crate::memory::MemoryScene;

        let mut scene = MemoryScene::new();
        let points = line(4);
        let input = build_curve(&mut scene, &points, 2, None).unwrap();
        let output = build_curve(&mut scene, &points, 2, Some(input.transform)).unwrap();
        assert_eq!(input.transform, output.transform);
        assert_ne!(input.shape, output.shape);
        assert!(build_curve(&mut scene, &points[..2], 2, None).is_err());
    }

    #[test]
    fn validate_flags_bad_knot_counts() {
        let mut curve = CurveData::open(line(4), 2).unwrap();
        assert!(curve.validate().is_ok());
        curve.cvs.push(Point3::new(9.0, 0.0, 0.0));
        assert!(curve.validate().is_err());
    }
}
