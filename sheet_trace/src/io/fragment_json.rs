//! Fragment JSON files.
//!
//! A file holds one fragment object or a list of them. Each object carries
//! `name`, `direction` and `gpoints`; the remaining fields are optional.

use serde::{Deserialize, Serialize};

use crate::frame::Orientation;
use crate::geometry::Point3;
use crate::settings::SurfaceSettings;
use crate::surface::{Surface, SurfaceKind, DEFAULT_COLOR};

const TYPE_FRAGMENT: &str = "fragment";
const TYPE_UMBILICUS: &str = "umbilicus";

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_type() -> String {
    TYPE_FRAGMENT.to_string()
}

/// One fragment as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
    pub direction: i64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    pub gpoints: Vec<[f64; 3]>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FragmentFile {
    One(FragmentRecord),
    Many(Vec<FragmentRecord>),
}

impl FragmentRecord {
    /// Record for `surface`. Echo surfaces are stored without points.
    pub fn from_surface(surface: &Surface) -> Self {
        let gpoints = if surface.echo_source().is_some() {
            Vec::new()
        } else {
            surface.points().iter().map(|p| p.to_array()).collect()
        };
        let kind = match surface.kind() {
            SurfaceKind::Meshed => TYPE_FRAGMENT,
            SurfaceKind::Polyline => TYPE_UMBILICUS,
        };
        Self {
            name: surface.name().to_string(),
            created: surface.created().to_string(),
            modified: surface.modified().to_string(),
            direction: surface.orientation().direction() as i64,
            color: surface.color().to_string(),
            params: surface.params().clone(),
            kind: kind.to_string(),
            gpoints,
        }
    }

    pub fn surface_kind(&self) -> SurfaceKind {
        if self.kind == TYPE_UMBILICUS {
            SurfaceKind::Polyline
        } else {
            SurfaceKind::Meshed
        }
    }

    /// Builds a surface. Fails with `InvalidData` for an unknown direction.
    pub fn to_surface(&self) -> std::io::Result<Surface> {
        let orientation = Orientation::from_direction(self.direction).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("fragment {}: invalid direction {}", self.name, self.direction),
            )
        })?;
        let settings = SurfaceSettings::default().with_params(&self.params);
        let mut surface = Surface::with_settings(&self.name, orientation, self.surface_kind(), settings);
        surface.set_params(self.params.clone());
        surface.set_color(&self.color);
        if !self.created.is_empty() {
            surface.set_created(self.created.clone());
        }
        surface.load_points(self.gpoints.iter().map(|a| Point3::from_array(*a)).collect());
        if !self.modified.is_empty() {
            surface.set_modified(self.modified.clone());
        }
        Ok(surface)
    }
}

pub fn read_fragments_json(path: &str) -> std::io::Result<Vec<FragmentRecord>> {
    let contents = crate::io::read_to_string(path)?;
    let file: FragmentFile = serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let records = match file {
        FragmentFile::One(r) => vec![r],
        FragmentFile::Many(rs) => rs,
    };
    log::info!("read {} fragments from {path}", records.len());
    Ok(records)
}

/// Writes a list of fragments.
pub fn write_fragments_json(path: &str, records: &[FragmentRecord]) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(records).map_err(std::io::Error::other)?;
    crate::io::write_string(path, &json)
}

pub fn read_surfaces_json(path: &str) -> std::io::Result<Vec<Surface>> {
    read_fragments_json(path)?
        .iter()
        .map(FragmentRecord::to_surface)
        .collect()
}

pub fn write_surfaces_json(path: &str, surfaces: &[&Surface]) -> std::io::Result<()> {
    let records: Vec<FragmentRecord> = surfaces
        .iter()
        .map(|s| FragmentRecord::from_surface(s))
        .collect();
    write_fragments_json(path, &records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &str = r##"{
        "name": "frag1",
        "direction": 1,
        "color": "#ff0000",
        "params": {"interpolation": "linear"},
        "gpoints": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]
    }"##;

    #[test]
    fn single_object_file() {
        let file: FragmentFile = serde_json::from_str(SINGLE).unwrap();
        let FragmentFile::One(rec) = file else {
            panic!("expected a single record");
        };
        assert_eq!(rec.kind, "fragment");
        let s = rec.to_surface().unwrap();
        assert_eq!(s.orientation(), Orientation::Xz);
        assert_eq!(s.points().len(), 2);
        assert_eq!(s.color(), "#ff0000");
        assert_eq!(s.settings().interpolation, crate::interpolation::Interpolation::Linear);
        assert!(s.store().history().is_empty());
    }

    #[test]
    fn echo_written_without_points() {
        let mut rec: FragmentRecord = serde_json::from_str(SINGLE).unwrap();
        rec.params.insert("echo".into(), "other".into());
        let s = rec.to_surface().unwrap();
        let out = FragmentRecord::from_surface(&s);
        assert!(out.gpoints.is_empty());
        assert_eq!(out.params.get("echo").and_then(|v| v.as_str()), Some("other"));
    }

    #[test]
    fn bad_direction_is_invalid_data() {
        let mut rec: FragmentRecord = serde_json::from_str(SINGLE).unwrap();
        rec.direction = 7;
        let err = rec.to_surface().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn umbilicus_type() {
        let json = r#"[{"name": "u", "direction": 0, "type": "umbilicus", "gpoints": []}]"#;
        let file: FragmentFile = serde_json::from_str(json).unwrap();
        let FragmentFile::Many(recs) = file else {
            panic!("expected a list");
        };
        assert_eq!(recs[0].surface_kind(), SurfaceKind::Polyline);
        let s = recs[0].to_surface().unwrap();
        assert_eq!(FragmentRecord::from_surface(&s).kind, "umbilicus");
    }
}
