//! Registry of the surfaces in one session.

use std::collections::{BTreeMap, BTreeSet};

use crate::frame::ViewContext;
use crate::surface::Surface;

/// Voxel edge length of the reference scans, in micrometres.
pub const DEFAULT_VOXEL_SIZE_UM: f64 = 7.91;

/// Surfaces by name, plus the state they share.
#[derive(Debug)]
pub struct Project {
    surfaces: BTreeMap<String, Surface>,
    voxel_size_um: f64,
    view: Option<ViewContext>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        Self {
            surfaces: BTreeMap::new(),
            voxel_size_um: DEFAULT_VOXEL_SIZE_UM,
            view: None,
        }
    }

    pub fn voxel_size_um(&self) -> f64 {
        self.voxel_size_um
    }

    pub fn set_voxel_size_um(&mut self, size: f64) {
        self.voxel_size_um = size;
    }

    pub fn view(&self) -> Option<&ViewContext> {
        self.view.as_ref()
    }

    /// Sets the active view on every surface.
    pub fn set_view(&mut self, view: Option<ViewContext>) {
        for surface in self.surfaces.values_mut() {
            surface.set_view(view.clone());
        }
        self.view = view;
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.surfaces.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }

    pub fn get(&self, name: &str) -> Option<&Surface> {
        self.surfaces.get(name)
    }

    /// Direct access. Echo surfaces are not updated; use [`Project::edit`]
    /// or call [`Project::refresh`] afterwards.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Surface> {
        self.surfaces.get_mut(name)
    }

    /// Adds a surface under its own name, replacing any surface of that name.
    ///
    /// The surface picks up the active view. An echo surface is filled from
    /// its source right away, and surfaces echoing the new one are updated.
    pub fn insert(&mut self, mut surface: Surface) -> Option<Surface> {
        surface.set_view(self.view.clone());
        let name = surface.name().to_string();
        let source = surface.echo_source().map(str::to_string);
        let old = self.surfaces.insert(name.clone(), surface);
        if let Some(points) = source
            .and_then(|s| self.surfaces.get(&s))
            .map(|s| s.points().to_vec())
        {
            if let Some(echo) = self.surfaces.get_mut(&name) {
                echo.echo_from(&points);
            }
        }
        self.propagate(&name);
        old
    }

    pub fn remove(&mut self, name: &str) -> Option<Surface> {
        self.surfaces.remove(name)
    }

    /// Names of the surfaces whose `echo` parameter names `source`.
    pub fn echoes_of(&self, source: &str) -> Vec<String> {
        self.surfaces
            .values()
            .filter(|s| s.echo_source() == Some(source))
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Refreshes one surface and the surfaces echoing it.
    pub fn refresh(&mut self, name: &str) -> bool {
        let Some(surface) = self.surfaces.get_mut(name) else {
            return false;
        };
        surface.refresh(false);
        self.propagate(name);
        true
    }

    /// Runs `f` on a surface and propagates any point change to its echoes.
    pub fn edit<R, F>(&mut self, name: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Surface) -> R,
    {
        let surface = self.surfaces.get_mut(name)?;
        let revision = surface.revision();
        let result = f(surface);
        if surface.revision() != revision {
            self.propagate(name);
        }
        Some(result)
    }

    /// Pushes the points of `name` down its echo chain, visiting each surface
    /// at most once.
    fn propagate(&mut self, name: &str) {
        let mut visited = BTreeSet::from([name.to_string()]);
        let mut pending = vec![name.to_string()];
        while let Some(source) = pending.pop() {
            let Some(points) = self.surfaces.get(&source).map(|s| s.points().to_vec()) else {
                continue;
            };
            for echo in self.echoes_of(&source) {
                if !visited.insert(echo.clone()) {
                    log::warn!("echo cycle through {echo}, not revisited");
                    continue;
                }
                if let Some(target) = self.surfaces.get_mut(&echo) {
                    log::debug!("echo {source} -> {echo} ({} points)", points.len());
                    target.echo_from(&points);
                }
                pending.push(echo);
            }
        }
    }

    /// Area of a surface in square centimetres at the project voxel size.
    pub fn area_sq_cm(&self, name: &str) -> Option<f64> {
        self.surfaces
            .get(name)
            .map(|s| s.area_sq_cm(self.voxel_size_um))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Orientation, VolumeFrame};
    use crate::geometry::Point3;
    use crate::surface::SurfaceKind;

    fn project() -> Project {
        let mut p = Project::new();
        p.set_view(Some(ViewContext::new(VolumeFrame::unit([50, 50, 50]), Orientation::Yz)));
        p
    }

    fn echo(name: &str, source: &str) -> Surface {
        let mut s = Surface::new(name, Orientation::Yz, SurfaceKind::Meshed);
        let mut params = serde_json::Map::new();
        params.insert("echo".into(), source.into());
        s.set_params(params);
        s
    }

    #[test]
    fn default_voxel_size() {
        assert_eq!(Project::default().voxel_size_um(), DEFAULT_VOXEL_SIZE_UM);
    }

    #[test]
    fn edits_reach_echo_chain() {
        let mut p = project();
        p.insert(Surface::new("a", Orientation::Yz, SurfaceKind::Meshed));
        p.insert(echo("b", "a"));
        p.insert(echo("c", "b"));
        assert_eq!(p.echoes_of("a"), vec!["b".to_string()]);

        let added = p.edit("a", |s| s.add_point(Point3::new(3.0, 4.0, 5.0)));
        assert!(matches!(added, Some(Ok(_))));
        assert_eq!(p.get("b").unwrap().points(), &[Point3::new(3.0, 4.0, 5.0)]);
        assert_eq!(p.get("c").unwrap().points(), &[Point3::new(3.0, 4.0, 5.0)]);
    }

    #[test]
    fn echo_cycle_terminates() {
        let mut p = project();
        p.insert(echo("a", "b"));
        p.insert(echo("b", "a"));
        p.edit("a", |s| s.add_point(Point3::new(1.0, 1.0, 1.0)).unwrap());
        assert_eq!(p.get("b").unwrap().points().len(), 1);
        assert!(p.refresh("b"));
        assert!(!p.refresh("missing"));
    }

    #[test]
    fn inserted_surface_gets_view() {
        let mut p = project();
        p.insert(Surface::new("a", Orientation::Xz, SurfaceKind::Meshed));
        assert!(p.get("a").unwrap().view().is_some());
        assert!(p.remove("a").is_some());
        assert!(p.is_empty());
    }
}
