//! Cross-sections of a surface with axis-aligned slice planes.

use std::cell::RefCell;

use crate::geometry::{CellRect, Point};
use crate::point_store::LocalPoint;
use crate::raster::HeightField;

/// Cached depth-axis cross-section, keyed by slice position.
#[derive(Debug, Default)]
pub struct SliceCache {
    entry: RefCell<Option<(i64, Vec<Point>)>>,
}

impl SliceCache {
    pub fn clear(&self) {
        self.entry.borrow_mut().take();
    }

    pub fn is_empty(&self) -> bool {
        self.entry.borrow().is_none()
    }

    /// Returns the cached points for `position`, computing them on a miss.
    pub fn get_or_compute<F>(&self, position: i64, compute: F) -> Vec<Point>
    where
        F: FnOnce() -> Vec<Point>,
    {
        if let Some((cached, pts)) = self.entry.borrow().as_ref() {
            if *cached == position {
                return pts.clone();
            }
        }
        let pts = compute();
        *self.entry.borrow_mut() = Some((position, pts.clone()));
        pts
    }
}

impl Clone for SliceCache {
    fn clone(&self) -> Self {
        Self {
            entry: RefCell::new(self.entry.borrow().clone()),
        }
    }
}

/// Cross-section across a plane axis of the height field.
///
/// `axis` 0 fixes local `i` and reads a column; 1 fixes `j` and reads a row.
/// An all-`NaN` line is retried one cell below and then one above. Points
/// are `(index along the line, height)`, swapped when `swap` is set.
pub fn plane_cross_section(zsurf: &HeightField, axis: usize, position: i64, swap: bool) -> Vec<Point> {
    let len = if axis == 0 {
        zsurf.width()
    } else {
        zsurf.height()
    };
    let mut line: Option<Vec<f32>> = None;
    for delta in [0, -1, 1] {
        let v = position + delta;
        if v < 0 || v as usize >= len {
            continue;
        }
        let values = if axis == 0 {
            zsurf.column(v as usize)
        } else {
            zsurf.row(v as usize)
        };
        let found = values.iter().any(|z| !z.is_nan());
        line = Some(values);
        if found {
            break;
        }
    }
    let Some(values) = line else {
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter(|(_, z)| !z.is_nan())
        .map(|(idx, z)| {
            if swap {
                Point::new(*z as f64, idx as f64)
            } else {
                Point::new(idx as f64, *z as f64)
            }
        })
        .collect()
}

/// Cells of `rect` whose height rounds to `position`, as `(i, j)`, or
/// `(j, i)` when `swap` is set. Scans row by row.
pub fn depth_cross_section(zsurf: &HeightField, rect: CellRect, position: i64, swap: bool) -> Vec<Point> {
    let rect = zsurf.clip(rect);
    rect.cells()
        .filter(|&(i, j)| {
            zsurf
                .get(i, j)
                .is_some_and(|z| !z.is_nan() && z.round_ties_even() as i64 == position)
        })
        .map(|(i, j)| {
            if swap {
                Point::new(j as f64, i as f64)
            } else {
                Point::new(i as f64, j as f64)
            }
        })
        .collect()
}

/// Intersections of a polyline with the plane `coord(axis) == position`.
///
/// Points use the two remaining axes in ascending order.
pub fn polyline_cross_section(vertices: &[LocalPoint], axis: usize, position: f64) -> Vec<Point> {
    let others: Vec<usize> = (0..3).filter(|a| *a != axis).collect();
    let project = |p: &LocalPoint| Point::new(p.coord(others[0]), p.coord(others[1]));
    let mut out: Vec<Point> = Vec::new();
    for seg in vertices.windows(2) {
        let (a, b) = (&seg[0], &seg[1]);
        let (ca, cb) = (a.coord(axis), b.coord(axis));
        let hit = if ca == cb {
            (ca == position).then(|| project(a))
        } else if (ca - position) * (cb - position) <= 0.0 {
            let t = (position - ca) / (cb - ca);
            let (pa, pb) = (project(a), project(b));
            Some(Point::new(pa.x + t * (pb.x - pa.x), pa.y + t * (pb.y - pa.y)))
        } else {
            None
        };
        if let Some(p) = hit {
            if out.last() != Some(&p) {
                out.push(p);
            }
        }
    }
    out
}

/// Points lying within half a voxel of the slice plane.
pub fn points_on_slice(points: &[LocalPoint], axis: usize, position: f64) -> Vec<LocalPoint> {
    points
        .iter()
        .filter(|p| {
            let c = p.coord(axis);
            c >= position - 0.5 && c < position + 0.5
        })
        .copied()
        .collect()
}
