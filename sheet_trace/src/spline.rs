//! Not-a-knot cubic spline without extrapolation.

use nalgebra::{DMatrix, DVector};

/// Interpolating cubic spline through sorted samples.
///
/// Evaluation outside the sample range yields `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    ms: Vec<f64>,
}

impl CubicSpline {
    /// Builds a spline through `(x, y)` samples. Samples are sorted by `x`;
    /// repeated `x` values keep the first sample. Non-finite samples are
    /// dropped.
    pub fn new(samples: &[(f64, f64)]) -> Self {
        let mut pts: Vec<(f64, f64)> = samples
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        pts.sort_by(|a, b| a.0.total_cmp(&b.0));
        pts.dedup_by(|b, a| a.0 == b.0);
        let xs: Vec<f64> = pts.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = pts.iter().map(|p| p.1).collect();
        let ms = second_derivatives(&xs, &ys);
        Self { xs, ys, ms }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Value at `x`, `NaN` outside `[x_first, x_last]`.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if n == 0 || !(x >= self.xs[0] && x <= self.xs[n - 1]) {
            return f64::NAN;
        }
        if n == 1 {
            return self.ys[0];
        }
        let i = match self.xs.partition_point(|&v| v <= x) {
            0 => 0,
            p if p >= n => n - 2,
            p => p - 1,
        };
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.ms[i], self.ms[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

fn second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    match n {
        0..=2 => vec![0.0; n],
        3 => {
            // not-a-knot on three points is the interpolating parabola
            let d01 = (ys[1] - ys[0]) / (xs[1] - xs[0]);
            let d12 = (ys[2] - ys[1]) / (xs[2] - xs[1]);
            let m = 2.0 * (d12 - d01) / (xs[2] - xs[0]);
            vec![m; 3]
        }
        _ => {
            let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
            let mut a = DMatrix::<f64>::zeros(n, n);
            let mut r = DVector::<f64>::zeros(n);
            // continuous third derivative at the second and second-to-last knots
            a[(0, 0)] = h[1];
            a[(0, 1)] = -(h[0] + h[1]);
            a[(0, 2)] = h[0];
            for i in 1..n - 1 {
                a[(i, i - 1)] = h[i - 1];
                a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
                a[(i, i + 1)] = h[i];
                r[i] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
            }
            a[(n - 1, n - 3)] = h[n - 2];
            a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
            a[(n - 1, n - 1)] = h[n - 3];
            match a.lu().solve(&r) {
                Some(m) => m.iter().copied().collect(),
                None => {
                    log::warn!("spline: singular system for {n} knots, using natural ends");
                    vec![0.0; n]
                }
            }
        }
    }
}
