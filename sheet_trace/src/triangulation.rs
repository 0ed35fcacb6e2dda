//! Deterministic Delaunay triangulation of surface points.
//!
//! Points are jittered by a tiny amount derived from their own plane
//! coordinates before being handed to `delaunator`, so that co-circular
//! configurations resolve the same way every time regardless of point order.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::geometry::{barycentric, BoundingBox, Point, Point3};
use crate::point_store::LocalPoint;

const JITTER_EPS: f64 = 1.0 / (1024.0 * 1024.0);
const INSIDE_TOL: f64 = 1e-10;

/// Plane position of a point after the deterministic jitter.
pub fn jitter(i: f64, j: f64) -> Point {
    let key = (i * 1019.0 + j * 1013.0) as i64;
    Point::new(
        i + JITTER_EPS * key.rem_euclid(503) as f64,
        j + JITTER_EPS * key.rem_euclid(509) as f64,
    )
}

/// One vertex of a line-mode polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineVertex {
    /// Coordinate along the varying plane axis.
    pub t: f64,
    /// Height.
    pub z: f64,
    /// Index into the point store.
    pub index: usize,
}

/// Points that all share one plane coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMode {
    /// Plane axis that is constant (0 = `i`, 1 = `j`).
    pub axis: usize,
    /// The shared coordinate, truncated.
    pub position: i64,
    /// Vertices sorted by `t`.
    pub vertices: Vec<LineVertex>,
}

/// Delaunay triangulation over jittered plane positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangulation {
    /// Jittered plane positions, one per input point.
    pub vertices: Vec<Point>,
    /// Height of each vertex.
    pub heights: Vec<f64>,
    pub triangles: Vec<[usize; 3]>,
    /// `neighbors[t][e]` is the triangle across the edge from vertex `e` to
    /// vertex `(e + 1) % 3`, `None` on the hull.
    pub neighbors: Vec<[Option<usize>; 3]>,
    adjacency: Vec<Vec<usize>>,
}

/// Where a query point falls inside a triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub triangle: usize,
    /// Barycentric weights of the triangle's three vertices.
    pub weights: [f64; 3],
}

/// Result of triangulating a point set.
#[derive(Debug, Clone, PartialEq)]
pub enum Tessellation {
    Empty,
    Line(LineMode),
    Mesh(Triangulation),
}

impl Tessellation {
    pub fn mesh(&self) -> Option<&Triangulation> {
        match self {
            Tessellation::Mesh(t) => Some(t),
            _ => None,
        }
    }

    pub fn line(&self) -> Option<&LineMode> {
        match self {
            Tessellation::Line(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Tessellation::Empty)
    }
}

/// Triangulates surface points given in the surface's own local frame.
pub fn triangulate(points: &[LocalPoint]) -> Tessellation {
    if points.len() <= 1 {
        return Tessellation::Empty;
    }
    if let Some(line) = detect_line(points) {
        return Tessellation::Line(line);
    }
    if points
        .iter()
        .any(|p| !(p.i.is_finite() && p.j.is_finite() && p.k.is_finite()))
    {
        log::warn!("triangulate: non-finite point coordinates, skipping");
        return Tessellation::Empty;
    }
    let vertices: Vec<Point> = points.iter().map(|p| jitter(p.i, p.j)).collect();
    let heights = points.iter().map(|p| p.k).collect();
    match Triangulation::from_vertices(vertices, heights) {
        Some(t) => Tessellation::Mesh(t),
        None => {
            log::warn!(
                "triangulate: no triangles produced for {} points",
                points.len()
            );
            Tessellation::Empty
        }
    }
}

fn count_unique(values: impl Iterator<Item = f64>) -> usize {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    v.len()
}

fn detect_line(points: &[LocalPoint]) -> Option<LineMode> {
    let iu = count_unique(points.iter().map(|p| p.i));
    let ju = count_unique(points.iter().map(|p| p.j));
    let axis = if iu == 1 && ju > 1 {
        0
    } else if ju == 1 && iu > 1 {
        1
    } else {
        return None;
    };
    let mut vertices: Vec<LineVertex> = points
        .iter()
        .map(|p| LineVertex {
            t: p.coord(1 - axis),
            z: p.k,
            index: p.index,
        })
        .collect();
    vertices.sort_by(|a, b| a.t.total_cmp(&b.t));
    Some(LineMode {
        axis,
        position: points[0].coord(axis) as i64,
        vertices,
    })
}

fn cmp_points(a: &Point, b: &Point) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

impl Triangulation {
    /// Runs Delaunay on already-jittered vertices. `None` if nothing could be
    /// triangulated (fewer than three points, or all collinear).
    pub fn from_vertices(vertices: Vec<Point>, heights: Vec<f64>) -> Option<Self> {
        let coords: Vec<delaunator::Point> = vertices
            .iter()
            .map(|p| delaunator::Point { x: p.x, y: p.y })
            .collect();
        let result = delaunator::triangulate(&coords);
        if result.triangles.is_empty() {
            return None;
        }
        let triangles: Vec<[usize; 3]> = result
            .triangles
            .chunks(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let neighbors = (0..triangles.len())
            .map(|t| {
                let mut n = [None; 3];
                for (e, slot) in n.iter_mut().enumerate() {
                    let opposite = result.halfedges[3 * t + e];
                    if opposite != delaunator::EMPTY {
                        *slot = Some(opposite / 3);
                    }
                }
                n
            })
            .collect();
        let mut adjacency = vec![Vec::new(); vertices.len()];
        for tri in &triangles {
            for e in 0..3 {
                let a = tri[e];
                let b = tri[(e + 1) % 3];
                adjacency[a].push(b);
                adjacency[b].push(a);
            }
        }
        for list in &mut adjacency {
            list.sort_unstable();
            list.dedup();
        }
        Some(Self {
            vertices,
            heights,
            triangles,
            neighbors,
            adjacency,
        })
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Vertices sharing an edge with `v`.
    pub fn vertex_neighbors(&self, v: usize) -> &[usize] {
        self.adjacency.get(v).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The given vertices plus every vertex adjacent to one of them, sorted.
    pub fn expand_vertices(&self, nodes: &[usize]) -> Vec<usize> {
        let mut out: Vec<usize> = nodes.to_vec();
        for &n in nodes {
            out.extend_from_slice(self.vertex_neighbors(n));
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Corners of triangle `t` in the plane.
    pub fn corners(&self, t: usize) -> [Point; 3] {
        let [a, b, c] = self.triangles[t];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    /// Corners of triangle `t` with heights as the third coordinate.
    pub fn corners3(&self, t: usize) -> [Point3; 3] {
        let tri = self.triangles[t];
        tri.map(|v| Point3::new(self.vertices[v].x, self.vertices[v].y, self.heights[v]))
    }

    /// Bounding box of the given vertices.
    pub fn vertices_bbox(&self, nodes: &[usize]) -> Option<BoundingBox> {
        BoundingBox::from_points(nodes.iter().filter_map(|&n| self.vertices.get(n).copied()))
    }

    /// Index-independent key of a vertex: its jittered position and height.
    pub fn vertex_key(&self, v: usize) -> [u64; 3] {
        let p = self.vertices[v];
        [p.x.to_bits(), p.y.to_bits(), self.heights[v].to_bits()]
    }

    /// Index-independent key of a triangle: its corners sorted by coordinate.
    pub fn triangle_key(&self, t: usize) -> [u64; 6] {
        let mut c = self.corners(t);
        c.sort_by(cmp_points);
        [
            c[0].x.to_bits(),
            c[0].y.to_bits(),
            c[1].x.to_bits(),
            c[1].y.to_bits(),
            c[2].x.to_bits(),
            c[2].y.to_bits(),
        ]
    }

    fn cmp_triangles(&self, a: usize, b: usize) -> Ordering {
        let mut ca = self.corners(a);
        let mut cb = self.corners(b);
        ca.sort_by(cmp_points);
        cb.sort_by(cmp_points);
        ca.iter()
            .zip(cb.iter())
            .map(|(p, q)| cmp_points(p, q))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }

    fn contains(&self, t: usize, p: Point) -> Option<[f64; 3]> {
        let [a, b, c] = self.corners(t);
        let (u, v, w) = barycentric(p, a, b, c)?;
        if u >= -INSIDE_TOL && v >= -INSIDE_TOL && w >= -INSIDE_TOL {
            Some([u, v, w])
        } else {
            None
        }
    }

    /// Locates many query points at once.
    ///
    /// A point on a shared edge goes to a triangle flagged in `preferred`
    /// (when given) and otherwise to the triangle with the smallest
    /// coordinate key, so the result does not depend on triangle order.
    /// `bucket` should be about the spacing of the query points.
    pub fn locate_points(
        &self,
        points: &[Point],
        bucket: f64,
        preferred: Option<&[bool]>,
    ) -> Vec<Option<Location>> {
        let mut out: Vec<Option<Location>> = vec![None; points.len()];
        if points.is_empty() || self.triangles.is_empty() {
            return out;
        }
        let bucket = if bucket > 0.0 { bucket } else { 1.0 };
        let cell = |v: f64| (v / bucket).floor() as i64;
        let mut buckets: FxHashMap<(i64, i64), Vec<usize>> = FxHashMap::default();
        // bucket extent of the queries; triangles are only walked inside it
        let (mut x0, mut y0, mut x1, mut y1) = (i64::MAX, i64::MAX, i64::MIN, i64::MIN);
        for (idx, p) in points.iter().enumerate() {
            if p.x.is_finite() && p.y.is_finite() {
                let (bx, by) = (cell(p.x), cell(p.y));
                x0 = x0.min(bx);
                y0 = y0.min(by);
                x1 = x1.max(bx);
                y1 = y1.max(by);
                buckets.entry((bx, by)).or_default().push(idx);
            }
        }
        if buckets.is_empty() {
            return out;
        }
        let is_preferred = |t: usize| preferred.map_or(true, |p| p.get(t).copied().unwrap_or(false));
        for t in 0..self.triangles.len() {
            let Some(bb) = BoundingBox::from_points(self.corners(t)) else {
                continue;
            };
            let bx0 = cell(bb.min.x - INSIDE_TOL).max(x0);
            let bx1 = cell(bb.max.x + INSIDE_TOL).min(x1);
            let by0 = cell(bb.min.y - INSIDE_TOL).max(y0);
            let by1 = cell(bb.max.y + INSIDE_TOL).min(y1);
            if bx0 > bx1 || by0 > by1 {
                continue;
            }
            for by in by0..=by1 {
                for bx in bx0..=bx1 {
                    let Some(list) = buckets.get(&(bx, by)) else {
                        continue;
                    };
                    for &idx in list {
                        let Some(weights) = self.contains(t, points[idx]) else {
                            continue;
                        };
                        let better = match out[idx] {
                            None => true,
                            Some(cur) => match (is_preferred(t), is_preferred(cur.triangle)) {
                                (true, false) => true,
                                (false, true) => false,
                                _ => self.cmp_triangles(t, cur.triangle) == Ordering::Less,
                            },
                        };
                        if better {
                            out[idx] = Some(Location {
                                triangle: t,
                                weights,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lp(pts: &[(f64, f64, f64)]) -> Vec<LocalPoint> {
        pts.iter()
            .enumerate()
            .map(|(index, &(i, j, k))| LocalPoint { i, j, k, index })
            .collect()
    }

    #[test]
    fn jitter_is_tiny_and_positive() {
        let p = jitter(10.0, 20.0);
        let key = (10.0f64 * 1019.0 + 20.0 * 1013.0) as i64;
        assert_eq!(p.x, 10.0 + JITTER_EPS * (key % 503) as f64);
        assert_eq!(p.y, 20.0 + JITTER_EPS * (key % 509) as f64);
        let n = jitter(-3.0, -1.0);
        assert!(n.x >= -3.0 && n.y >= -1.0);
    }

    #[test]
    fn too_few_points() {
        assert!(triangulate(&[]).is_empty());
        assert!(triangulate(&lp(&[(1.0, 1.0, 1.0)])).is_empty());
    }

    #[test]
    fn shared_i_is_line_mode() {
        let t = triangulate(&lp(&[(5.7, 9.0, 1.0), (5.7, 2.0, 2.0), (5.7, 4.0, 3.0)]));
        let line = t.line().unwrap();
        assert_eq!(line.axis, 0);
        assert_eq!(line.position, 5);
        let ts: Vec<f64> = line.vertices.iter().map(|v| v.t).collect();
        assert_eq!(ts, vec![2.0, 4.0, 9.0]);
        assert_eq!(line.vertices[0].index, 1);
    }

    #[test]
    fn shared_j_is_line_mode() {
        let t = triangulate(&lp(&[(1.0, 3.0, 1.0), (2.0, 3.0, 2.0)]));
        assert_eq!(t.line().unwrap().axis, 1);
    }

    #[test]
    fn three_diagonal_points_are_empty() {
        let t = triangulate(&lp(&[(0.0, 0.0, 1.0), (1.0, 1.0, 1.0), (2.0, 2.0, 1.0)]));
        assert!(t.is_empty());
    }

    #[test]
    fn longer_diagonal_jitters_into_slivers() {
        let pts: Vec<(f64, f64, f64)> = (0..6).map(|n| (n as f64 * 7.0, n as f64 * 7.0, 1.0)).collect();
        let t = triangulate(&lp(&pts));
        let mesh = t.mesh().unwrap();
        assert!(!mesh.is_empty());
        for tri in &mesh.triangles {
            let [a, b, c] = tri.map(|v| mesh.vertices[v]);
            let area = ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)).abs() / 2.0;
            assert!(area < 1.0, "{area}");
        }
    }

    #[test]
    fn non_finite_is_empty() {
        let t = triangulate(&lp(&[(0.0, 0.0, 1.0), (1.0, 0.0, f64::NAN), (0.0, 1.0, 1.0)]));
        assert!(t.is_empty());
    }

    #[test]
    fn square_neighbors_and_adjacency() {
        let t = triangulate(&lp(&[
            (0.0, 0.0, 0.0),
            (10.0, 0.0, 0.0),
            (10.0, 10.0, 0.0),
            (0.0, 10.0, 0.0),
        ]));
        let mesh = t.mesh().unwrap();
        assert_eq!(mesh.len(), 2);
        let inner: usize = mesh
            .neighbors
            .iter()
            .map(|n| n.iter().filter(|x| x.is_some()).count())
            .sum();
        assert_eq!(inner, 2);
        let total: usize = (0..4).map(|v| mesh.vertex_neighbors(v).len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn locate_prefers_smallest_key_on_shared_edge() {
        let t = triangulate(&lp(&[
            (0.0, 0.0, 0.0),
            (4.0, 0.0, 0.0),
            (4.0, 4.0, 0.0),
            (0.0, 4.0, 0.0),
        ]));
        let mesh = t.mesh().unwrap();
        let pts = vec![Point::new(2.0, 2.0), Point::new(1.0, 0.5), Point::new(9.0, 9.0)];
        let a = mesh.locate_points(&pts, 1.0, None);
        assert!(a[0].is_some());
        assert!(a[1].is_some());
        assert!(a[2].is_none());
        let w = a[1].unwrap().weights;
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        let b = mesh.locate_points(&pts, 3.0, None);
        assert_eq!(a, b);
    }

    #[test]
    fn locating_a_window_matches_the_full_grid() {
        let mut pts = Vec::new();
        for j in 0..6 {
            for i in 0..6 {
                let k = ((i * 7 + j * 3) % 5) as f64;
                pts.push((i as f64 * 10.0 + (j % 2) as f64 * 3.0, j as f64 * 10.0, k));
            }
        }
        let t = triangulate(&lp(&pts));
        let mesh = t.mesh().unwrap();
        let grid: Vec<Point> = (0..60)
            .flat_map(|j| (0..60).map(move |i| Point::new(i as f64, j as f64)))
            .collect();
        let full = mesh.locate_points(&grid, 1.0, None);
        let window: Vec<(usize, Point)> = grid
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| (20.0..30.0).contains(&p.x) && (35.0..41.0).contains(&p.y))
            .collect();
        let queries: Vec<Point> = window.iter().map(|&(_, p)| p).collect();
        let part = mesh.locate_points(&queries, 1.0, None);
        assert_eq!(part.len(), 60);
        for ((idx, _), loc) in window.iter().zip(&part) {
            assert!(loc.is_some());
            assert_eq!(*loc, full[*idx]);
        }
        assert!(mesh.locate_points(&[Point::new(500.0, 500.0)], 1.0, None)[0].is_none());
    }
}
