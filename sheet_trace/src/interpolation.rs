//! Height interpolation over a triangulation.

use nalgebra::{DMatrix, DVector, SVD};

use crate::geometry::{barycentric, distance, Point};
use crate::triangulation::{Location, Triangulation};

/// Interpolation scheme for the height field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Piecewise linear over each triangle.
    Linear,
    /// Height of the nearest vertex of the containing triangle. This is not
    /// always the globally nearest point: a vertex of a neighbouring triangle
    /// can be closer to a query near an obtuse corner.
    Nearest,
    /// C1 reduced Clough-Tocher.
    #[default]
    CloughTocher,
}

impl Interpolation {
    /// Parses the `interpolation` fragment parameter. Unknown values select
    /// Clough-Tocher.
    pub fn from_param(value: &str) -> Self {
        match value {
            "linear" => Interpolation::Linear,
            "nearest" => Interpolation::Nearest,
            _ => Interpolation::CloughTocher,
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            Interpolation::Linear => "linear",
            Interpolation::Nearest => "nearest",
            Interpolation::CloughTocher => "cubic",
        }
    }
}

fn pseudoinverse(m: &DMatrix<f64>, tol: f64) -> Option<DMatrix<f64>> {
    let svd = SVD::new(m.clone(), true, true);
    let mut s_inv = svd.singular_values.clone();
    for val in s_inv.iter_mut() {
        if *val > tol {
            *val = 1.0 / *val;
        } else {
            *val = 0.0;
        }
    }
    let u = svd.u?;
    let vt = svd.v_t?;
    Some(vt.transpose() * DMatrix::from_diagonal(&s_inv) * u.transpose())
}

fn solve_weighted(a: &DMatrix<f64>, b: &DVector<f64>, w: &DVector<f64>) -> Option<DVector<f64>> {
    let aw = DMatrix::from_fn(a.nrows(), a.ncols(), |r, c| a[(r, c)] * w[r]);
    let n = aw.transpose() * a;
    let u = aw.transpose() * b;
    let sol = n
        .clone()
        .lu()
        .solve(&u)
        .filter(|s| s.iter().all(|v| v.is_finite()))
        .or_else(|| pseudoinverse(&n, 1e-12).map(|p| p * u))?;
    Some(sol)
}

/// Gradient at vertex `v` from a weighted least-squares fit over its 1-ring.
///
/// Fits a quadratic when at least five neighbours are available, a plane
/// otherwise. Neighbours are visited in coordinate order so the result does
/// not depend on vertex numbering.
pub fn vertex_gradient(tri: &Triangulation, v: usize) -> [f64; 2] {
    let origin = tri.vertices[v];
    let f0 = tri.heights[v];
    let mut ring: Vec<usize> = tri
        .vertex_neighbors(v)
        .iter()
        .copied()
        .filter(|&n| distance(tri.vertices[n], origin) > 0.0)
        .collect();
    if ring.is_empty() {
        return [0.0, 0.0];
    }
    ring.sort_by(|&a, &b| {
        let (pa, pb) = (tri.vertices[a], tri.vertices[b]);
        pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y))
    });
    let cols = if ring.len() >= 5 { 5 } else { 2 };
    let mut a = DMatrix::<f64>::zeros(ring.len(), cols);
    let mut b = DVector::<f64>::zeros(ring.len());
    let mut w = DVector::<f64>::zeros(ring.len());
    for (row, &n) in ring.iter().enumerate() {
        let dx = tri.vertices[n].x - origin.x;
        let dy = tri.vertices[n].y - origin.y;
        a[(row, 0)] = dx;
        a[(row, 1)] = dy;
        if cols == 5 {
            a[(row, 2)] = 0.5 * dx * dx;
            a[(row, 3)] = dx * dy;
            a[(row, 4)] = 0.5 * dy * dy;
        }
        b[row] = tri.heights[n] - f0;
        w[row] = 1.0 / (dx * dx + dy * dy);
    }
    match solve_weighted(&a, &b, &w) {
        Some(sol) => [sol[0], sol[1]],
        None => [0.0, 0.0],
    }
}

/// Evaluates heights at query points of a triangulation.
#[derive(Debug, Clone)]
pub struct Interpolator<'a> {
    tri: &'a Triangulation,
    method: Interpolation,
    gradients: Vec<[f64; 2]>,
}

impl<'a> Interpolator<'a> {
    pub fn new(tri: &'a Triangulation, method: Interpolation) -> Self {
        let gradients = if method == Interpolation::CloughTocher {
            (0..tri.vertices.len())
                .map(|v| vertex_gradient(tri, v))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            tri,
            method,
            gradients,
        }
    }

    pub fn method(&self) -> Interpolation {
        self.method
    }

    /// Height at `p`, which must lie in the located triangle.
    pub fn value(&self, p: Point, loc: &Location) -> f64 {
        match self.method {
            Interpolation::Linear => {
                let tri = self.tri.triangles[loc.triangle];
                (0..3)
                    .map(|k| loc.weights[k] * self.tri.heights[tri[k]])
                    .sum()
            }
            Interpolation::Nearest => self.nearest(p, loc),
            Interpolation::CloughTocher => self.clough_tocher(loc),
        }
    }

    /// Heights at many points; `NaN` outside the mesh.
    pub fn sample(&self, points: &[Point], bucket: f64) -> Vec<f64> {
        self.tri
            .locate_points(points, bucket, None)
            .iter()
            .zip(points)
            .map(|(loc, p)| loc.map_or(f64::NAN, |l| self.value(*p, &l)))
            .collect()
    }

    /// Only the three corners of `loc.triangle` are candidates, so the value
    /// depends on the triangle alone and stays inside its 1-ring for diffing.
    fn nearest(&self, p: Point, loc: &Location) -> f64 {
        let tri = self.tri.triangles[loc.triangle];
        let best = tri
            .iter()
            .copied()
            .min_by(|&a, &b| {
                let (pa, pb) = (self.tri.vertices[a], self.tri.vertices[b]);
                distance(p, pa)
                    .total_cmp(&distance(p, pb))
                    .then(pa.x.total_cmp(&pb.x))
                    .then(pa.y.total_cmp(&pb.y))
            })
            .unwrap_or(tri[0]);
        self.tri.heights[best]
    }

    /// Shape parameter for the edge opposite corner `k`, from the centroid of
    /// the triangle across that edge. Hull edges use `-1/2`.
    fn edge_shape(&self, t: usize, k: usize) -> f64 {
        let Some(nb) = self.tri.neighbors[t][(k + 1) % 3] else {
            return -0.5;
        };
        let nc = self.tri.corners(nb);
        let centroid = Point::new(
            (nc[0].x + nc[1].x + nc[2].x) / 3.0,
            (nc[0].y + nc[1].y + nc[2].y) / 3.0,
        );
        let [a, b, c] = self.tri.corners(t);
        let Some((y0, y1, y2)) = barycentric(centroid, a, b, c) else {
            return -0.5;
        };
        let y = [y0, y1, y2];
        let (p, q) = ((k + 2) % 3, (k + 1) % 3);
        let denom = 2.0 - 3.0 * y[p] - 3.0 * y[q];
        if denom.abs() < f64::EPSILON {
            return -0.5;
        }
        (2.0 * y[p] + y[q] - 1.0) / denom
    }

    fn clough_tocher(&self, loc: &Location) -> f64 {
        let t = loc.triangle;
        let idx = self.tri.triangles[t];
        let p = idx.map(|v| self.tri.vertices[v]);
        let f = idx.map(|v| self.tri.heights[v]);
        let df = idx.map(|v| self.gradients.get(v).copied().unwrap_or([0.0, 0.0]));
        let dot = |g: [f64; 2], a: Point, b: Point| g[0] * (b.x - a.x) + g[1] * (b.y - a.y);

        let df12 = dot(df[0], p[0], p[1]);
        let df21 = dot(df[1], p[1], p[0]);
        let df13 = dot(df[0], p[0], p[2]);
        let df31 = dot(df[2], p[2], p[0]);
        let df23 = dot(df[1], p[1], p[2]);
        let df32 = dot(df[2], p[2], p[1]);

        let c3000 = f[0];
        let c2100 = (df12 + 3.0 * c3000) / 3.0;
        let c2010 = (df13 + 3.0 * c3000) / 3.0;
        let c0300 = f[1];
        let c1200 = (df21 + 3.0 * c0300) / 3.0;
        let c0210 = (df23 + 3.0 * c0300) / 3.0;
        let c0030 = f[2];
        let c1020 = (df31 + 3.0 * c0030) / 3.0;
        let c0120 = (df32 + 3.0 * c0030) / 3.0;

        let c2001 = (c2100 + c2010 + c3000) / 3.0;
        let c0201 = (c1200 + c0300 + c0210) / 3.0;
        let c0021 = (c1020 + c0120 + c0030) / 3.0;

        let g = [self.edge_shape(t, 0), self.edge_shape(t, 1), self.edge_shape(t, 2)];

        let c0111 = (g[0] * (-c0300 + 3.0 * c0210 - 3.0 * c0120 + c0030)
            + (-c0300 + 2.0 * c0210 - c0120 + c0021 + c0201))
            / 2.0;
        let c1011 = (g[1] * (-c0030 + 3.0 * c1020 - 3.0 * c2010 + c3000)
            + (-c0030 + 2.0 * c1020 - c2010 + c2001 + c0021))
            / 2.0;
        let c1101 = (g[2] * (-c3000 + 3.0 * c2100 - 3.0 * c1200 + c0300)
            + (-c3000 + 2.0 * c2100 - c1200 + c2001 + c0201))
            / 2.0;

        let c1002 = (c1101 + c1011 + c2001) / 3.0;
        let c0102 = (c1101 + c0111 + c0201) / 3.0;
        let c0012 = (c1011 + c0111 + c0021) / 3.0;
        let c0003 = (c1002 + c0102 + c0012) / 3.0;

        let w = loc.weights;
        let minval = w[0].min(w[1]).min(w[2]);
        let b1 = w[0] - minval;
        let b2 = w[1] - minval;
        let b3 = w[2] - minval;
        let b4 = 3.0 * minval;

        b1.powi(3) * c3000
            + 3.0 * b1 * b1 * b2 * c2100
            + 3.0 * b1 * b1 * b3 * c2010
            + 3.0 * b1 * b1 * b4 * c2001
            + 3.0 * b1 * b2 * b2 * c1200
            + 6.0 * b1 * b2 * b4 * c1101
            + 3.0 * b1 * b3 * b3 * c1020
            + 6.0 * b1 * b3 * b4 * c1011
            + 3.0 * b1 * b4 * b4 * c1002
            + b2.powi(3) * c0300
            + 3.0 * b2 * b2 * b3 * c0210
            + 3.0 * b2 * b2 * b4 * c0201
            + 3.0 * b2 * b3 * b3 * c0120
            + 6.0 * b2 * b3 * b4 * c0111
            + 3.0 * b2 * b4 * b4 * c0102
            + b3.powi(3) * c0030
            + 3.0 * b3 * b3 * b4 * c0021
            + 3.0 * b3 * b4 * b4 * c0012
            + b4.powi(3) * c0003
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane_mesh() -> Triangulation {
        let f = |x: f64, y: f64| 2.0 * x + 3.0 * y + 1.0;
        let mut v = Vec::new();
        for j in 0..5 {
            for i in 0..5 {
                let p = crate::triangulation::jitter(i as f64 * 4.0, j as f64 * 4.0);
                v.push(p);
            }
        }
        let h = v.iter().map(|p| f(p.x, p.y)).collect();
        Triangulation::from_vertices(v, h).unwrap()
    }

    #[test]
    fn param_parsing() {
        assert_eq!(Interpolation::from_param("linear"), Interpolation::Linear);
        assert_eq!(Interpolation::from_param("nearest"), Interpolation::Nearest);
        assert_eq!(Interpolation::from_param(""), Interpolation::CloughTocher);
        assert_eq!(Interpolation::from_param("cubic"), Interpolation::CloughTocher);
    }

    #[test]
    fn gradients_of_a_plane() {
        let m = plane_mesh();
        for v in 0..m.vertices.len() {
            let g = vertex_gradient(&m, v);
            assert!((g[0] - 2.0).abs() < 1e-6, "{g:?}");
            assert!((g[1] - 3.0).abs() < 1e-6, "{g:?}");
        }
    }

    #[test]
    fn all_methods_reproduce_a_plane() {
        let m = plane_mesh();
        let pts = vec![Point::new(5.0, 7.0), Point::new(13.0, 2.0), Point::new(8.0, 8.0)];
        for method in [Interpolation::Linear, Interpolation::CloughTocher] {
            let z = Interpolator::new(&m, method).sample(&pts, 1.0);
            for (p, z) in pts.iter().zip(z) {
                assert!((z - (2.0 * p.x + 3.0 * p.y + 1.0)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn nearest_picks_a_vertex_height() {
        let m = plane_mesh();
        let z = Interpolator::new(&m, Interpolation::Nearest).sample(&[Point::new(0.5, 0.5)], 1.0);
        assert!((z[0] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn nearest_ignores_vertices_of_other_triangles() {
        // (5, -4.5) is closest to the query but lies across the edge y = 0
        let v = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 6.0),
            Point::new(5.0, -4.5),
        ];
        let m = Triangulation::from_vertices(v, vec![1.0, 1.0, 2.0, 9.0]).unwrap();
        assert_eq!(m.len(), 2);
        let z = Interpolator::new(&m, Interpolation::Nearest).sample(&[Point::new(5.0, 0.3)], 1.0);
        assert_eq!(z[0], 1.0);
    }

    #[test]
    fn outside_is_nan() {
        let m = plane_mesh();
        let z = Interpolator::new(&m, Interpolation::CloughTocher)
            .sample(&[Point::new(-5.0, 3.0), Point::new(30.0, 30.0)], 1.0);
        assert!(z.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn clough_tocher_hits_vertices() {
        let v = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(4.0, 6.0),
        ];
        let h = vec![1.0, 5.0, -2.0, 3.0, 8.0];
        let m = Triangulation::from_vertices(v.clone(), h.clone()).unwrap();
        let z = Interpolator::new(&m, Interpolation::CloughTocher).sample(&v, 1.0);
        for (a, b) in z.iter().zip(h) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
