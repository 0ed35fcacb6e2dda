//! Changed-region detection between two rasterized triangulations.
//!
//! Points are compared by jittered position and height, triangles by their
//! coordinate-sorted corners, so index shifts caused by deletions do not
//! register as changes.

use rustc_hash::FxHashSet;

use crate::geometry::{BoundingBox, CellRect};
use crate::triangulation::Triangulation;

/// Triangulation state that a raster was last computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tri: Triangulation,
    /// Border-bad flags per triangle; empty when suppression is off.
    pub border_bad: Vec<bool>,
}

impl Snapshot {
    pub fn new(tri: Triangulation, border_bad: Vec<bool>) -> Self {
        Self { tri, border_bad }
    }

    fn point_keys(&self) -> FxHashSet<[u64; 3]> {
        (0..self.tri.vertices.len())
            .map(|v| self.tri.vertex_key(v))
            .collect()
    }

    fn triangle_keys(&self) -> FxHashSet<[u64; 6]> {
        (0..self.tri.len()).map(|t| self.tri.triangle_key(t)).collect()
    }

    fn border_keys(&self) -> FxHashSet<[u64; 6]> {
        (0..self.tri.len())
            .filter(|&t| self.border_bad.get(t).copied().unwrap_or(false))
            .map(|t| self.tri.triangle_key(t))
            .collect()
    }
}

/// What changed between two snapshots and where.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub deleted_points: usize,
    pub added_points: usize,
    pub deleted_triangles: usize,
    pub added_triangles: usize,
    pub border_changes: usize,
    /// Plane region whose cells may have changed.
    pub bbox: Option<BoundingBox>,
}

impl ChangeSet {
    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.bbox.is_none()
    }

    /// Changed cells of a `width` x `height` raster, padded by one cell.
    /// `None` when no raster cell is affected.
    pub fn rect(&self, width: usize, height: usize) -> Option<CellRect> {
        let rect = self.bbox?.to_cells(width, height);
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }
}

/// Vertices of `snap` whose key is missing from `other`.
fn missing_points(snap: &Snapshot, other: &FxHashSet<[u64; 3]>) -> Vec<usize> {
    (0..snap.tri.vertices.len())
        .filter(|&v| !other.contains(&snap.tri.vertex_key(v)))
        .collect()
}

fn missing_triangles(snap: &Snapshot, other: &FxHashSet<[u64; 6]>) -> Vec<usize> {
    (0..snap.tri.len())
        .filter(|&t| !other.contains(&snap.tri.triangle_key(t)))
        .collect()
}

/// Region touched by changed points: the bounding box of their 2-ring.
fn points_region(tri: &Triangulation, points: &[usize]) -> Option<BoundingBox> {
    if points.is_empty() {
        return None;
    }
    let ring = tri.expand_vertices(&tri.expand_vertices(points));
    tri.vertices_bbox(&ring)
}

/// Region touched by changed triangles: the bounding box of the 1-ring of
/// their corners.
fn triangles_region(tri: &Triangulation, triangles: &[usize]) -> Option<BoundingBox> {
    if triangles.is_empty() {
        return None;
    }
    let mut corners: Vec<usize> = triangles
        .iter()
        .flat_map(|&t| tri.triangles[t])
        .collect();
    corners.sort_unstable();
    corners.dedup();
    tri.vertices_bbox(&tri.expand_vertices(&corners))
}

fn border_region(snap: &Snapshot, other: &FxHashSet<[u64; 6]>) -> (usize, Option<BoundingBox>) {
    let changed: Vec<usize> = (0..snap.tri.len())
        .filter(|&t| snap.border_bad.get(t).copied().unwrap_or(false))
        .filter(|&t| !other.contains(&snap.tri.triangle_key(t)))
        .collect();
    let bbox = BoundingBox::from_points(changed.iter().flat_map(|&t| snap.tri.corners(t)));
    (changed.len(), bbox)
}

/// Compares the snapshot a raster was built from with a new one.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let old_pts = old.point_keys();
    let new_pts = new.point_keys();
    let deleted_pts = missing_points(old, &new_pts);
    let added_pts = missing_points(new, &old_pts);
    let pts_rect = BoundingBox::union_opt(
        points_region(&old.tri, &deleted_pts),
        points_region(&new.tri, &added_pts),
    );

    let old_tris = old.triangle_keys();
    let new_tris = new.triangle_keys();
    let deleted_tris = missing_triangles(old, &new_tris);
    let added_tris = missing_triangles(new, &old_tris);
    let tris_rect = BoundingBox::union_opt(
        triangles_region(&old.tri, &deleted_tris),
        triangles_region(&new.tri, &added_tris),
    );

    let (lost, lost_rect) = border_region(old, &new.border_keys());
    let (gained, gained_rect) = border_region(new, &old.border_keys());
    let border_rect = BoundingBox::union_opt(lost_rect, gained_rect);

    let bbox = BoundingBox::union_opt(BoundingBox::union_opt(pts_rect, tris_rect), border_rect);
    ChangeSet {
        deleted_points: deleted_pts.len(),
        added_points: added_pts.len(),
        deleted_triangles: deleted_tris.len(),
        added_triangles: added_tris.len(),
        border_changes: lost + gained,
        bbox,
    }
}
