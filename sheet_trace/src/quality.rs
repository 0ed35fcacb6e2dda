//! Geometric quality predicates for triangles and border propagation of
//! bad triangles.

use std::collections::VecDeque;

use crate::triangulation::Triangulation;

/// Default minimum roundness below which a triangle counts as skinny.
pub const DEFAULT_MIN_ROUNDNESS: f64 = 0.1;
/// Max-angle cosine threshold, about 172 degrees.
pub const MAX_ANGLE_COS_STRICT: f64 = -0.99;
/// Max-angle cosine threshold, about 162 degrees.
pub const MAX_ANGLE_COS_LOOSE: f64 = -0.95;
/// Default minimum out-of-plane component of the unit-scaled normal.
pub const DEFAULT_MIN_NORMAL: f64 = 0.1;

/// Which predicates mark a triangle as bad. Each is enabled by giving a threshold.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QualityCriteria {
    /// Minimum roundness (equilateral = 1).
    pub min_roundness: Option<f64>,
    /// Minimum allowed cosine of any interior angle.
    pub min_angle_cos: Option<f64>,
    /// Minimum `|n_k|` of the unit-scaled 3D normal.
    pub min_normal: Option<f64>,
}

impl Default for QualityCriteria {
    fn default() -> Self {
        Self {
            min_roundness: Some(DEFAULT_MIN_ROUNDNESS),
            min_angle_cos: None,
            min_normal: None,
        }
    }
}

impl QualityCriteria {
    /// Criteria that never flag anything.
    pub fn none() -> Self {
        Self {
            min_roundness: None,
            min_angle_cos: None,
            min_normal: None,
        }
    }

    pub fn is_bad(&self, tri: &Triangulation, t: usize) -> bool {
        if let Some(min) = self.min_roundness {
            if roundness(tri, t) < min {
                return true;
            }
        }
        if let Some(min) = self.min_angle_cos {
            if min_angle_cosine(tri, t) < min {
                return true;
            }
        }
        if let Some(min) = self.min_normal {
            if normal_k(tri, t).abs() < min {
                return true;
            }
        }
        false
    }

    /// Per-triangle bad flags.
    pub fn bad_triangles(&self, tri: &Triangulation) -> Vec<bool> {
        (0..tri.len()).map(|t| self.is_bad(tri, t)).collect()
    }
}

fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

fn plane_corners(tri: &Triangulation, t: usize) -> [[f64; 2]; 3] {
    tri.corners(t).map(|p| [p.x, p.y])
}

/// `sqrt(area) / (perimeter * c)` with `c` chosen so an equilateral triangle scores 1.
pub fn roundness(tri: &Triangulation, t: usize) -> f64 {
    let [v0, v1, v2] = plane_corners(tri, t);
    let v01 = sub(v1, v0);
    let v02 = sub(v2, v0);
    let v12 = sub(v2, v1);
    let area = (0.5 * (v01[0] * v02[1] - v01[1] * v02[0])).abs();
    let len = |v: [f64; 2]| (v[0] * v[0] + v[1] * v[1]).sqrt();
    let perimeter = len(v01) + len(v02) + len(v12);
    let pmax = (0.25 * 3f64.sqrt()).sqrt() / 3.0;
    if perimeter <= 0.0 {
        return 0.0;
    }
    area.sqrt() / (perimeter * pmax)
}

/// Smallest interior-angle cosine, i.e. the cosine of the largest angle.
pub fn min_angle_cosine(tri: &Triangulation, t: usize) -> f64 {
    let [v0, v1, v2] = plane_corners(tri, t);
    let v01 = sub(v1, v0);
    let v02 = sub(v2, v0);
    let v12 = sub(v2, v1);
    let dot = |a: [f64; 2], b: [f64; 2]| a[0] * b[0] + a[1] * b[1];
    let len = |v: [f64; 2]| dot(v, v).sqrt();
    let (l01, l02, l12) = (len(v01), len(v02), len(v12));
    let d0 = dot(v01, v02) / (l01 * l02);
    let d1 = -dot(v01, v12) / (l01 * l12);
    let d2 = dot(v02, v12) / (l02 * l12);
    let m = d0.min(d1).min(d2);
    if m.is_nan() {
        -1.0
    } else {
        m
    }
}

/// Out-of-plane component of `cross(v01, v02) / (l01 * l02)` in 3D.
pub fn normal_k(tri: &Triangulation, t: usize) -> f64 {
    let [p0, p1, p2] = tri.corners3(t);
    let v01 = [p1.x - p0.x, p1.y - p0.y, p1.z - p0.z];
    let v02 = [p2.x - p0.x, p2.y - p0.y, p2.z - p0.z];
    let l01 = (v01[0] * v01[0] + v01[1] * v01[1] + v01[2] * v01[2]).sqrt();
    let l02 = (v02[0] * v02[0] + v02[1] * v02[1] + v02[2] * v02[2]).sqrt();
    let nk = v01[0] * v02[1] - v01[1] * v02[0];
    let d = l01 * l02;
    if d <= 0.0 {
        0.0
    } else {
        nk / d
    }
}

/// Bad triangles reachable from outside the mesh through other bad triangles.
///
/// Bad triangles fully enclosed by good ones are not included.
pub fn bad_border_triangles(tri: &Triangulation, bads: &[bool]) -> Vec<bool> {
    let n = tri.len();
    let is_bad = |t: usize| bads.get(t).copied().unwrap_or(false);
    let mut border = vec![false; n];
    let mut queue = VecDeque::new();
    for t in 0..n {
        if is_bad(t) && tri.neighbors[t].iter().any(Option::is_none) {
            border[t] = true;
            queue.push_back(t);
        }
    }
    while let Some(t) = queue.pop_front() {
        for nb in tri.neighbors[t].iter().flatten() {
            if is_bad(*nb) && !border[*nb] {
                border[*nb] = true;
                queue.push_back(*nb);
            }
        }
    }
    border
}
