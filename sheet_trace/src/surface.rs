//! A traced surface: points, triangulation and cached rasters.
//!
//! Edits go through the [`PointStore`]; every successful edit re-projects the
//! points, re-triangulates them and, when live updates are on, refreshes only
//! the part of the height and sample fields that the edit could have changed.

use std::fmt;
use std::rc::Rc;

use crate::diff::{diff, Snapshot};
use crate::error::{EditError, EditResult};
use crate::frame::{Orientation, ViewContext};
use crate::geometry::{polygon_area3, BoundingBox, CellRect, Point, Point3};
use crate::infill::{self, ExportMesh};
use crate::interpolation::Interpolator;
use crate::point_store::{timestamp, AddOutcome, LocalPoint, PointStore};
use crate::quality::bad_border_triangles;
use crate::raster::{HeightField, SampleField};
use crate::settings::SurfaceSettings;
use crate::slice::{self, SliceCache};
use crate::spline::CubicSpline;
use crate::suggest::PointSuggester;
use crate::triangulation::{triangulate, LineMode, Tessellation, Triangulation};

/// Default display color of new surfaces.
pub const DEFAULT_COLOR: &str = "#00ff00";

/// Square micrometres per square centimetre.
const UM2_PER_CM2: f64 = 1e8;

/// How a surface is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Triangulated height field.
    #[default]
    Meshed,
    /// Depth-ordered line, e.g. a scroll's umbilicus.
    Polyline,
}

/// Called after a refresh leaves the rasters current, with the surface name
/// and the point revision they were built from.
pub type UpdateHook = Box<dyn FnMut(&str, u64)>;

pub struct Surface {
    name: String,
    kind: SurfaceKind,
    store: PointStore,
    settings: SurfaceSettings,
    view: Option<ViewContext>,
    fpoints: Vec<LocalPoint>,
    vpoints: Vec<LocalPoint>,
    working_points: Vec<bool>,
    working_triangles: Vec<bool>,
    tessellation: Tessellation,
    polyline: Vec<LocalPoint>,
    bad: Vec<bool>,
    border_bad: Vec<bool>,
    snapshot: Option<Snapshot>,
    zsurf: Option<HeightField>,
    ssurf: Option<SampleField>,
    last_changed_rect: Option<CellRect>,
    slice_cache: SliceCache,
    mesh_visible: bool,
    area: f64,
    created: String,
    color: String,
    params: serde_json::Map<String, serde_json::Value>,
    on_fully_updated: Option<UpdateHook>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("points", &self.store.len())
            .field("revision", &self.store.revision())
            .field("settings", &self.settings)
            .field("view", &self.view)
            .field("mesh_visible", &self.mesh_visible)
            .finish_non_exhaustive()
    }
}

impl Surface {
    pub fn new(name: impl Into<String>, orientation: Orientation, kind: SurfaceKind) -> Self {
        Self::with_settings(name, orientation, kind, SurfaceSettings::default())
    }

    pub fn with_settings(
        name: impl Into<String>,
        orientation: Orientation,
        kind: SurfaceKind,
        settings: SurfaceSettings,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            store: PointStore::new(orientation, settings.history_capacity),
            settings,
            view: None,
            fpoints: Vec::new(),
            vpoints: Vec::new(),
            working_points: Vec::new(),
            working_triangles: Vec::new(),
            tessellation: Tessellation::Empty,
            polyline: Vec::new(),
            bad: Vec::new(),
            border_bad: Vec::new(),
            snapshot: None,
            zsurf: None,
            ssurf: None,
            last_changed_rect: None,
            slice_cache: SliceCache::default(),
            mesh_visible: true,
            area: 0.0,
            created: timestamp(),
            color: DEFAULT_COLOR.to_string(),
            params: serde_json::Map::new(),
            on_fully_updated: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn orientation(&self) -> Orientation {
        self.store.orientation()
    }

    pub fn store(&self) -> &PointStore {
        &self.store
    }

    /// Global points, in store order.
    pub fn points(&self) -> &[Point3] {
        self.store.points()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn settings(&self) -> &SurfaceSettings {
        &self.settings
    }

    pub fn view(&self) -> Option<&ViewContext> {
        self.view.as_ref()
    }

    pub fn fpoints(&self) -> &[LocalPoint] {
        &self.fpoints
    }

    pub fn vpoints(&self) -> &[LocalPoint] {
        &self.vpoints
    }

    pub fn working_points(&self) -> &[bool] {
        &self.working_points
    }

    pub fn working_triangles(&self) -> &[bool] {
        &self.working_triangles
    }

    pub fn tessellation(&self) -> &Tessellation {
        &self.tessellation
    }

    pub fn triangulation(&self) -> Option<&Triangulation> {
        self.tessellation.mesh()
    }

    /// Depth-sorted vertices of a polyline surface.
    pub fn polyline(&self) -> &[LocalPoint] {
        &self.polyline
    }

    /// Segments of a polyline surface as index pairs into the point store.
    pub fn polyline_segments(&self) -> Vec<[usize; 2]> {
        self.polyline
            .windows(2)
            .map(|w| [w[0].index, w[1].index])
            .collect()
    }

    pub fn bad_triangles(&self) -> &[bool] {
        &self.bad
    }

    pub fn border_bad_triangles(&self) -> &[bool] {
        &self.border_bad
    }

    pub fn zsurf(&self) -> Option<&HeightField> {
        self.zsurf.as_ref()
    }

    pub fn ssurf(&self) -> Option<&SampleField> {
        self.ssurf.as_ref()
    }

    /// Cells touched by the latest raster update.
    pub fn last_changed_rect(&self) -> Option<CellRect> {
        self.last_changed_rect
    }

    pub fn mesh_visible(&self) -> bool {
        self.mesh_visible
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    pub fn set_created(&mut self, stamp: String) {
        self.created = stamp;
    }

    pub fn modified(&self) -> &str {
        self.store.modified()
    }

    pub fn set_modified(&mut self, stamp: String) {
        self.store.set_modified(stamp);
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn params(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.params
    }

    /// Replaces the fragment parameters and applies their settings overrides.
    pub fn set_params(&mut self, params: serde_json::Map<String, serde_json::Value>) {
        let settings = self.settings.with_params(&params);
        self.params = params;
        self.set_settings(settings);
    }

    /// Name of the surface this one echoes, if any.
    pub fn echo_source(&self) -> Option<&str> {
        self.params
            .get("echo")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Infill spacing from the `infill` parameter; 0 when unset.
    pub fn infill_spacing(&self) -> f64 {
        match self.params.get("infill") {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn set_on_fully_updated(&mut self, hook: Option<UpdateHook>) {
        self.on_fully_updated = hook;
    }

    /// Surface area in square centimetres for the given voxel size.
    pub fn area_sq_cm(&self, voxel_size_um: f64) -> f64 {
        self.area * voxel_size_um * voxel_size_um / UM2_PER_CM2
    }

    // --- configuration ---------------------------------------------------

    fn invalidate(&mut self) {
        self.snapshot = None;
        self.zsurf = None;
        self.ssurf = None;
        self.slice_cache.clear();
    }

    /// Switches the viewed volume. A new frame, orientation or sampler
    /// forces a full recompute.
    pub fn set_view(&mut self, view: Option<ViewContext>) {
        let changed = match (&self.view, &view) {
            (None, None) => false,
            (Some(a), Some(b)) => {
                a.differs_from(b)
                    || match (&a.sampler, &b.sampler) {
                        (None, None) => false,
                        (Some(x), Some(y)) => !Rc::ptr_eq(x, y),
                        _ => true,
                    }
            }
            _ => true,
        };
        if !changed {
            return;
        }
        self.view = view;
        self.invalidate();
        self.refresh(true);
    }

    pub fn set_settings(&mut self, settings: SurfaceSettings) {
        let old = self.settings;
        if old == settings {
            return;
        }
        self.settings = settings;
        self.store.set_history_capacity(settings.history_capacity);
        if old.affects_raster(&settings) {
            log::debug!("{}: settings changed, full recompute", self.name);
            self.invalidate();
            self.refresh(true);
        } else if settings.live_update && !old.live_update {
            self.refresh(true);
        }
    }

    /// Turns live raster updates on or off. Turning them on runs one update.
    pub fn set_live_update(&mut self, live: bool) {
        if live == self.settings.live_update {
            return;
        }
        self.settings.live_update = live;
        if live {
            self.refresh(true);
        }
    }

    /// Shows or hides the mesh. Hidden meshes keep no triangulation or rasters.
    pub fn set_mesh_visible(&mut self, visible: bool) {
        if visible == self.mesh_visible {
            return;
        }
        self.mesh_visible = visible;
        self.invalidate();
        self.refresh(true);
    }

    // --- edits -----------------------------------------------------------

    fn require_view(&self) -> EditResult<ViewContext> {
        self.view.clone().ok_or(EditError::NoView)
    }

    fn after_edit(&mut self, revision: u64) {
        if self.store.revision() != revision {
            self.refresh(false);
        }
    }

    /// Adds a point in global coordinates.
    pub fn add_point(&mut self, global: Point3) -> EditResult<AddOutcome> {
        let view = self.require_view()?;
        let revision = self.store.revision();
        let outcome = self.store.add_point(global, &view.frame)?;
        self.after_edit(revision);
        Ok(outcome)
    }

    /// Adds a point given in the viewed volume's local frame.
    pub fn add_point_view(&mut self, local: Point3) -> EditResult<AddOutcome> {
        let view = self.require_view()?;
        self.add_point(view.frame.local_to_global(local, view.orientation))
    }

    pub fn move_point(&mut self, index: usize, global: Point3) -> EditResult<()> {
        let view = self.require_view()?;
        let revision = self.store.revision();
        self.store.move_point(index, global, &view.frame)?;
        self.after_edit(revision);
        Ok(())
    }

    pub fn move_point_view(&mut self, index: usize, local: Point3) -> EditResult<()> {
        let view = self.require_view()?;
        self.move_point(index, view.frame.local_to_global(local, view.orientation))
    }

    pub fn delete_point(&mut self, index: usize) -> EditResult<()> {
        let revision = self.store.revision();
        self.store.delete_point(index)?;
        self.after_edit(revision);
        Ok(())
    }

    pub fn undo(&mut self) -> EditResult<()> {
        let revision = self.store.revision();
        self.store.undo()?;
        self.after_edit(revision);
        Ok(())
    }

    /// Replaces every point, e.g. when loading.
    pub fn set_points(&mut self, points: Vec<Point3>) {
        let revision = self.store.revision();
        self.store.replace_all(points);
        self.after_edit(revision);
    }

    /// Sets the points read from a file without recording an undo step.
    pub fn load_points(&mut self, points: Vec<Point3>) {
        self.store.load(points);
        self.refresh(false);
    }

    /// Copies another surface's points, adding infill when the `infill`
    /// parameter is positive.
    pub fn echo_from(&mut self, source: &[Point3]) {
        let mut points = source.to_vec();
        let spacing = self.infill_spacing();
        if spacing > 0.0 && self.kind == SurfaceKind::Meshed {
            let extra = infill::generate(source, self.orientation(), spacing, &self.settings.quality);
            log::debug!("{}: echo with {} infill points", self.name, extra.len());
            points.extend(extra);
        }
        self.set_points(points);
    }

    /// Feeds suggested points through [`Surface::add_point`] with live updates
    /// paused, then runs a single update. Returns how many were accepted.
    pub fn apply_suggestions(&mut self, suggester: &dyn PointSuggester, seed: Point3) -> EditResult<usize> {
        self.require_view()?;
        let suggestions = suggester.suggest_points(seed, self.orientation());
        let live = self.settings.live_update;
        self.set_live_update(false);
        let mut accepted = 0;
        for p in suggestions {
            match self.add_point(p) {
                Ok(_) => accepted += 1,
                Err(e) => log::debug!("{}: suggestion {:?} skipped: {e}", self.name, p),
            }
        }
        self.set_live_update(live);
        log::info!("{}: accepted {accepted} suggested points", self.name);
        Ok(accepted)
    }

    // --- derived state ---------------------------------------------------

    /// Re-projects the points and rebuilds the derived state.
    ///
    /// Rasters are updated when `always_update` is set or live updates are on.
    pub fn refresh(&mut self, always_update: bool) {
        let Some(view) = self.view.clone() else {
            self.fpoints.clear();
            self.vpoints.clear();
            self.working_points.clear();
            self.polyline.clear();
            self.clear_mesh_state();
            return;
        };
        self.fpoints = self.store.local_points(&view.frame, self.orientation());
        self.vpoints = self.store.local_points(&view.frame, view.orientation);
        self.working_points = vec![true; self.fpoints.len()];

        if self.kind == SurfaceKind::Polyline {
            self.polyline = self.fpoints.clone();
            self.polyline.sort_by(|a, b| a.k.total_cmp(&b.k).then(a.index.cmp(&b.index)));
            self.fire_hook();
            return;
        }
        if !self.mesh_visible {
            self.clear_mesh_state();
            return;
        }
        let updated = self.create_zsurf(always_update || self.settings.live_update);
        self.area = self.compute_area();
        if updated {
            self.fire_hook();
        }
    }

    /// Drops everything derived from a triangulation. Indices in it would
    /// go stale on the next delete.
    fn clear_mesh_state(&mut self) {
        self.tessellation = Tessellation::Empty;
        self.bad.clear();
        self.border_bad.clear();
        self.working_triangles.clear();
        self.invalidate();
        self.last_changed_rect = None;
        self.area = 0.0;
    }

    fn fire_hook(&mut self) {
        let revision = self.store.revision();
        if let Some(hook) = self.on_fully_updated.as_mut() {
            hook(&self.name, revision);
        }
    }

    /// Re-triangulates and, when `do_update` is set, brings the rasters up to
    /// date. Returns `true` if the rasters are current afterwards.
    pub fn create_zsurf(&mut self, do_update: bool) -> bool {
        let Some(view) = self.view.clone() else {
            return false;
        };
        self.tessellation = triangulate(&self.fpoints);
        match &self.tessellation {
            Tessellation::Mesh(tri) => {
                self.bad = self.settings.quality.bad_triangles(tri);
                self.border_bad = bad_border_triangles(tri, &self.bad);
            }
            _ => {
                self.bad.clear();
                self.border_bad.clear();
            }
        }
        self.working_triangles = vec![true; self.bad.len()];
        if !do_update {
            return false;
        }

        let (ni, nj, _) = view.frame.local_shape(self.orientation());
        let shape_ok = self
            .zsurf
            .as_ref()
            .is_some_and(|z| z.width() == ni && z.height() == nj);
        if !shape_ok {
            self.snapshot = None;
        }
        match self.tessellation.clone() {
            Tessellation::Mesh(tri) => self.update_mesh(&view, tri, ni, nj),
            Tessellation::Line(line) => self.update_line(&view, &line, ni, nj),
            Tessellation::Empty => {
                self.reset_rasters(ni, nj);
                self.snapshot = None;
                self.last_changed_rect = Some(CellRect::new(0, 0, ni, nj));
            }
        }
        true
    }

    fn reset_rasters(&mut self, ni: usize, nj: usize) {
        self.zsurf = Some(HeightField::nan(ni, nj));
        self.ssurf = Some(SampleField::filled(ni, nj, 0));
        self.slice_cache.clear();
    }

    fn update_mesh(&mut self, view: &ViewContext, tri: Triangulation, ni: usize, nj: usize) {
        let suppress = self.settings.hide_skinny_triangles;
        let flags = if suppress {
            self.border_bad.clone()
        } else {
            Vec::new()
        };
        let next = Snapshot::new(tri, flags);
        let rect = match self.snapshot.take() {
            Some(prev) if !prev.tri.is_empty() => {
                let changes = diff(&prev, &next);
                log::debug!(
                    "{}: -{}/+{} points, -{}/+{} triangles, {} border changes",
                    self.name,
                    changes.deleted_points,
                    changes.added_points,
                    changes.deleted_triangles,
                    changes.added_triangles,
                    changes.border_changes
                );
                match changes.rect(ni, nj) {
                    Some(rect) => {
                        self.last_changed_rect = Some(rect);
                        rect
                    }
                    None => {
                        self.snapshot = Some(next);
                        return;
                    }
                }
            }
            _ => {
                self.reset_rasters(ni, nj);
                self.last_changed_rect = Some(CellRect::new(0, 0, ni, nj));
                let bbox = BoundingBox::from_points(self.fpoints.iter().map(|p| Point::new(p.i, p.j)));
                match bbox {
                    Some(bb) => bb.to_cells(ni, nj),
                    None => CellRect::new(0, 0, 0, 0),
                }
            }
        };
        self.fill_heights(&next, rect);
        self.fill_samples(view, rect);
        self.slice_cache.clear();
        self.snapshot = Some(next);
    }

    fn fill_heights(&mut self, snap: &Snapshot, rect: CellRect) {
        let Some(zsurf) = self.zsurf.as_mut() else {
            return;
        };
        let cells: Vec<(usize, usize)> = rect.cells().collect();
        let queries: Vec<Point> = cells
            .iter()
            .map(|&(i, j)| Point::new(i as f64, j as f64))
            .collect();
        let preferred: Option<Vec<bool>> = if snap.border_bad.is_empty() {
            None
        } else {
            Some(snap.border_bad.iter().map(|b| !b).collect())
        };
        let interp = Interpolator::new(&snap.tri, self.settings.interpolation);
        let locations = snap.tri.locate_points(&queries, 1.0, preferred.as_deref());
        for ((&(i, j), p), loc) in cells.iter().zip(&queries).zip(locations) {
            let z = match loc {
                Some(l) if !snap.border_bad.get(l.triangle).copied().unwrap_or(false) => {
                    interp.value(*p, &l) as f32
                }
                _ => f32::NAN,
            };
            zsurf.set(i, j, z);
        }
    }

    fn fill_samples(&mut self, view: &ViewContext, rect: CellRect) {
        let (Some(zsurf), Some(ssurf)) = (self.zsurf.as_ref(), self.ssurf.as_mut()) else {
            return;
        };
        let (_, _, nk) = view.frame.local_shape(self.store.orientation());
        let orientation = self.store.orientation();
        for (i, j) in rect.cells() {
            let value = match (zsurf.get(i, j), view.sampler.as_ref()) {
                (Some(z), Some(sampler)) if !z.is_nan() => {
                    let k = z.round_ties_even() as i64;
                    if k >= 0 && (k as usize) < nk {
                        let local = Point3::new(i as f64, j as f64, k as f64);
                        sampler.sample(view.frame.local_to_global(local, orientation))
                    } else {
                        0
                    }
                }
                _ => 0,
            };
            ssurf.set(i, j, value);
        }
    }

    fn update_line(&mut self, view: &ViewContext, line: &LineMode, ni: usize, nj: usize) {
        self.reset_rasters(ni, nj);
        self.snapshot = None;
        self.last_changed_rect = Some(CellRect::new(0, 0, ni, nj));
        let samples: Vec<(f64, f64)> = line.vertices.iter().map(|v| (v.t, v.z)).collect();
        let spline = CubicSpline::new(&samples);
        let pos = line.position;
        let rect = if line.axis == 0 {
            if pos < 0 || pos as usize >= ni {
                return;
            }
            CellRect::new(pos as usize, 0, pos as usize + 1, nj)
        } else {
            if pos < 0 || pos as usize >= nj {
                return;
            }
            CellRect::new(0, pos as usize, ni, pos as usize + 1)
        };
        if let Some(zsurf) = self.zsurf.as_mut() {
            for (i, j) in rect.cells() {
                let t = if line.axis == 0 { j } else { i };
                zsurf.set(i, j, spline.eval(t as f64) as f32);
            }
        }
        self.fill_samples(view, rect);
    }

    fn compute_area(&self) -> f64 {
        let Some(tri) = self.tessellation.mesh() else {
            return 0.0;
        };
        let points = self.store.points();
        tri.triangles
            .iter()
            .map(|t| polygon_area3(&[points[t[0]], points[t[1]], points[t[2]]]))
            .sum()
    }

    // --- queries ---------------------------------------------------------

    /// Cross-section with the view plane `coord(view_axis) == position`, in
    /// the two remaining view axes.
    pub fn cross_section(&self, view_axis: usize, position: i64) -> Vec<Point> {
        let Some(view) = self.view.as_ref() else {
            return Vec::new();
        };
        if view_axis > 2 {
            return Vec::new();
        }
        if self.kind == SurfaceKind::Polyline {
            let vertices: Vec<LocalPoint> = self
                .polyline
                .iter()
                .filter_map(|p| self.vpoints.get(p.index).copied())
                .collect();
            return slice::polyline_cross_section(&vertices, view_axis, position as f64);
        }
        let Some(zsurf) = self.zsurf.as_ref() else {
            return Vec::new();
        };
        let aligned = view.orientation == self.orientation();
        let faxis = if aligned { view_axis } else { 2 - view_axis };
        if faxis < 2 {
            return slice::plane_cross_section(zsurf, faxis, position, !aligned);
        }
        let Some(bbox) = BoundingBox::from_points(self.fpoints.iter().map(|p| Point::new(p.i, p.j)))
        else {
            return Vec::new();
        };
        let rect = bbox.to_cells(zsurf.width(), zsurf.height());
        self.slice_cache.get_or_compute(position, || {
            slice::depth_cross_section(zsurf, rect, position, !aligned)
        })
    }

    /// Points within half a voxel of the view plane.
    pub fn points_on_slice(&self, view_axis: usize, position: f64) -> Vec<LocalPoint> {
        if view_axis > 2 {
            return Vec::new();
        }
        slice::points_on_slice(&self.vpoints, view_axis, position)
    }

    /// Infill points at `spacing` for this surface.
    pub fn infill_points(&self, spacing: f64) -> Vec<Point3> {
        if self.kind == SurfaceKind::Polyline {
            return Vec::new();
        }
        infill::generate(self.points(), self.orientation(), spacing, &self.settings.quality)
    }

    /// Mesh for exporters. Hidden meshes and polylines export their points only.
    pub fn export_mesh(&self, spacing: f64) -> ExportMesh {
        if !self.mesh_visible || self.kind == SurfaceKind::Polyline {
            return ExportMesh {
                vertices: self.points().to_vec(),
                triangles: Vec::new(),
            };
        }
        infill::export_mesh(self.points(), self.orientation(), spacing, &self.settings.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::VolumeFrame;
    use std::cell::RefCell;

    fn view(o: Orientation) -> ViewContext {
        ViewContext::new(VolumeFrame::unit([64, 64, 64]), o)
    }

    // Yz surface: local (i, j, k) = (gy, gz, gx)
    fn yz(i: f64, j: f64, k: f64) -> Point3 {
        Point3::new(k, i, j)
    }

    fn surface() -> Surface {
        let mut s = Surface::new("s", Orientation::Yz, SurfaceKind::Meshed);
        s.set_view(Some(view(Orientation::Yz)));
        s
    }

    #[test]
    fn edits_need_a_view() {
        let mut s = Surface::new("s", Orientation::Yz, SurfaceKind::Meshed);
        assert_eq!(s.add_point(yz(1.0, 1.0, 1.0)), Err(EditError::NoView));
        assert_eq!(s.delete_point(0), Err(EditError::OutOfRange { index: 0, len: 0 }));
    }

    #[test]
    fn triangle_fills_its_hull() {
        let mut s = surface();
        s.add_point(yz(10.0, 10.0, 5.0)).unwrap();
        s.add_point(yz(30.0, 10.0, 5.0)).unwrap();
        s.add_point(yz(10.0, 30.0, 5.0)).unwrap();
        assert_eq!(s.triangulation().map(|t| t.len()), Some(1));
        let z = s.zsurf().unwrap();
        assert!((z.get(15, 15).unwrap() - 5.0).abs() < 1e-4);
        assert!(z.get(28, 28).unwrap().is_nan());
        assert!(z.get(5, 5).unwrap().is_nan());
    }

    #[test]
    fn live_update_off_leaves_rasters_stale() {
        let mut s = surface();
        s.set_live_update(false);
        for p in [yz(10.0, 10.0, 5.0), yz(30.0, 10.0, 5.0), yz(10.0, 30.0, 5.0)] {
            s.add_point(p).unwrap();
        }
        assert_eq!(s.triangulation().map(|t| t.len()), Some(1));
        assert_eq!(s.zsurf().map(|z| z.count_valid()), Some(0));
        s.set_live_update(true);
        assert!(s.zsurf().unwrap().count_valid() > 0);
    }

    #[test]
    fn hook_reports_revision() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut s = surface();
        s.set_on_fully_updated(Some(Box::new(move |name: &str, rev: u64| {
            sink.borrow_mut().push((name.to_string(), rev));
        })));
        s.add_point(yz(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(seen.borrow().last(), Some(&("s".to_string(), 1)));
    }

    #[test]
    fn unaligned_view_swaps_axes() {
        let mut s = surface();
        for p in [yz(10.0, 10.0, 5.0), yz(30.0, 10.0, 5.0), yz(10.0, 30.0, 5.0)] {
            s.add_point(p).unwrap();
        }
        let aligned = s.cross_section(0, 12);
        assert!(!aligned.is_empty());
        assert!(aligned.iter().all(|p| (p.y - 5.0).abs() < 1e-3));

        // an Xz view of the same volume: surface axis 0 is view axis 2
        s.set_view(Some(view(Orientation::Xz)));
        let swapped = s.cross_section(2, 12);
        assert_eq!(swapped.len(), aligned.len());
        assert!(swapped.iter().all(|p| (p.x - 5.0).abs() < 1e-3));
        let depth = s.cross_section(0, 5);
        assert!(!depth.is_empty());
    }

    #[test]
    fn polyline_sorts_by_depth() {
        let mut s = Surface::new("u", Orientation::Yz, SurfaceKind::Polyline);
        s.set_view(Some(view(Orientation::Yz)));
        s.add_point(yz(10.0, 1.0, 40.0)).unwrap();
        s.add_point(yz(12.0, 2.0, 20.0)).unwrap();
        s.add_point(yz(14.0, 3.0, 30.0)).unwrap();
        assert_eq!(s.polyline_segments(), vec![[1, 2], [2, 0]]);
        assert!(s.zsurf().is_none());
        assert!(s.triangulation().is_none());
        let hit = s.cross_section(2, 25);
        assert_eq!(hit, vec![Point::new(13.0, 2.5)]);
        assert!(s.export_mesh(5.0).triangles.is_empty());
    }

    #[test]
    fn hidden_mesh_keeps_points_only() {
        let mut s = surface();
        for p in [yz(10.0, 10.0, 5.0), yz(30.0, 10.0, 5.0), yz(10.0, 30.0, 5.0)] {
            s.add_point(p).unwrap();
        }
        s.set_mesh_visible(false);
        assert!(s.zsurf().is_none());
        assert!(s.triangulation().is_none());
        assert_eq!(s.export_mesh(0.0).vertices.len(), 3);
        s.set_mesh_visible(true);
        assert!(s.zsurf().is_some());
    }

    #[test]
    fn dropping_the_view_clears_the_mesh() {
        let mut s = surface();
        for p in [yz(10.0, 10.0, 5.0), yz(30.0, 10.0, 5.0), yz(30.0, 30.0, 5.0), yz(10.0, 30.0, 5.0)] {
            s.add_point(p).unwrap();
        }
        assert_eq!(s.triangulation().map(|t| t.len()), Some(2));
        s.set_view(None);
        s.delete_point(3).unwrap();
        s.delete_point(2).unwrap();
        assert_eq!(s.points().len(), 2);
        assert!(s.triangulation().is_none());
        assert!(s.working_triangles().is_empty());
        assert!(s.bad_triangles().is_empty());
        assert!(s.zsurf().is_none());
        assert!(s.ssurf().is_none());
        assert_eq!(s.area_sq_cm(10.0), 0.0);

        s.set_view(Some(view(Orientation::Yz)));
        // the two remaining points share j = 10
        assert!(matches!(s.tessellation(), Tessellation::Line(_)));
        assert!(s.triangulation().is_none());
        assert!(s.zsurf().unwrap().get(20, 10).is_some_and(|z| !z.is_nan()));
    }

    #[test]
    fn area_of_flat_square() {
        let mut s = surface();
        for p in [yz(0.0, 0.0, 5.0), yz(10.0, 0.0, 5.0), yz(10.0, 10.0, 5.0), yz(0.0, 10.0, 5.0)] {
            s.add_point(p).unwrap();
        }
        // 100 voxels of 10 um each side: 1e4 um^2
        assert!((s.area_sq_cm(10.0) - 1e-4).abs() < 1e-9);
    }

    #[test]
    fn echo_adds_infill() {
        let mut source = surface();
        for p in [yz(0.0, 0.0, 5.0), yz(40.0, 0.0, 5.0), yz(40.0, 40.0, 5.0), yz(0.0, 40.0, 5.0)] {
            source.add_point(p).unwrap();
        }
        let mut echo = surface();
        let mut params = serde_json::Map::new();
        params.insert("echo".into(), "s".into());
        params.insert("infill".into(), 10.into());
        echo.set_params(params);
        assert_eq!(echo.echo_source(), Some("s"));
        echo.echo_from(source.points());
        assert!(echo.points().len() > 4);
        assert_eq!(&echo.points()[..4], source.points());
    }
}
