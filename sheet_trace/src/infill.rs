//! Grid infill points and export mesh assembly.
//!
//! Infill works in the transposed global frame (global coordinates permuted
//! into the surface orientation, without volume scaling), so results do not
//! depend on which volume happens to be viewed.

use rustc_hash::FxHashSet;

use crate::frame::{transpose_global, untranspose_global, Orientation};
use crate::geometry::{BoundingBox, Point, Point3};
use crate::interpolation::{Interpolation, Interpolator};
use crate::point_store::LocalPoint;
use crate::quality::{bad_border_triangles, QualityCriteria};
use crate::triangulation::{triangulate, Tessellation, Triangulation};

/// Vertices and triangles handed to mesh exporters.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExportMesh {
    /// Global positions: the surface points followed by infill points.
    pub vertices: Vec<Point3>,
    pub triangles: Vec<[usize; 3]>,
}

fn transposed(points: &[Point3], orientation: Orientation) -> Vec<LocalPoint> {
    points
        .iter()
        .enumerate()
        .map(|(index, g)| {
            let t = transpose_global(*g, orientation);
            LocalPoint {
                i: t.x,
                j: t.y,
                k: t.z,
                index,
            }
        })
        .collect()
}

fn good_flags(tri: &Triangulation, criteria: &QualityCriteria) -> Vec<bool> {
    let bad = criteria.bad_triangles(tri);
    bad_border_triangles(tri, &bad)
        .into_iter()
        .map(|b| !b)
        .collect()
}

/// Grid cell range `(origin, count)` covering `[min, max]` at `spacing`.
fn cell_range(min: f64, max: f64, spacing: f64) -> (i64, i64) {
    let lo = (min / spacing).floor();
    let hi_d = max / spacing;
    let mut hi = hi_d.floor();
    if hi != hi_d {
        hi += 1.0;
    }
    (lo as i64, (hi - lo) as i64 + 1)
}

/// Infill points on a `spacing` grid over the surface's transposed extent.
///
/// Grid cells that already hold a surface point are skipped, as are samples
/// that fall outside the mesh or in border-propagated bad triangles. The
/// input points are not modified.
pub fn generate(
    points: &[Point3],
    orientation: Orientation,
    spacing: f64,
    criteria: &QualityCriteria,
) -> Vec<Point3> {
    if !(spacing > 0.0) || points.is_empty() {
        return Vec::new();
    }
    let local = transposed(points, orientation);
    let Some(bb) = BoundingBox::from_points(local.iter().map(|p| Point::new(p.i, p.j))) else {
        return Vec::new();
    };
    let (i0, ni) = cell_range(bb.min.x, bb.max.x, spacing);
    let (j0, nj) = cell_range(bb.min.y, bb.max.y, spacing);

    let occupied: FxHashSet<(i64, i64)> = local
        .iter()
        .map(|p| {
            (
                (p.i / spacing - i0 as f64).floor() as i64,
                (p.j / spacing - j0 as f64).floor() as i64,
            )
        })
        .collect();
    let mut candidates = Vec::new();
    for jj in 0..nj {
        for ii in 0..ni {
            if occupied.contains(&(ii, jj)) {
                continue;
            }
            candidates.push(Point::new(
                ((ii + i0) as f64 * spacing + spacing / 2.0).round_ties_even(),
                ((jj + j0) as f64 * spacing + spacing / 2.0).round_ties_even(),
            ));
        }
    }

    let tess = triangulate(&local);
    let Tessellation::Mesh(tri) = tess else {
        log::debug!("infill: no mesh for {} points", points.len());
        return Vec::new();
    };
    let good = good_flags(&tri, criteria);
    let interp = Interpolator::new(&tri, Interpolation::CloughTocher);
    let locations = tri.locate_points(&candidates, spacing, Some(&good));
    let infill: Vec<Point3> = candidates
        .iter()
        .zip(locations)
        .filter_map(|(p, loc)| {
            let loc = loc?;
            if !good[loc.triangle] {
                return None;
            }
            let k = interp.value(*p, &loc);
            if k.is_nan() {
                return None;
            }
            Some(untranspose_global(Point3::new(p.x, p.y, k), orientation))
        })
        .collect();
    log::debug!(
        "infill: {} candidates, {} kept at spacing {spacing}",
        candidates.len(),
        infill.len()
    );
    infill
}

/// Surface points plus infill, retriangulated with border-bad triangles
/// removed. A non-positive `spacing` exports the points alone.
pub fn export_mesh(
    points: &[Point3],
    orientation: Orientation,
    spacing: f64,
    criteria: &QualityCriteria,
) -> ExportMesh {
    let mut vertices = points.to_vec();
    vertices.extend(generate(points, orientation, spacing, criteria));
    let triangles = match triangulate(&transposed(&vertices, orientation)) {
        Tessellation::Mesh(tri) => {
            let good = good_flags(&tri, criteria);
            tri.triangles
                .iter()
                .zip(&good)
                .filter(|(_, g)| **g)
                .map(|(t, _)| *t)
                .collect()
        }
        _ => Vec::new(),
    };
    ExportMesh {
        vertices,
        triangles,
    }
}
