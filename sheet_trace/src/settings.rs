//! Per-surface configuration.

use crate::interpolation::Interpolation;
use crate::point_store::DEFAULT_HISTORY_CAPACITY;
use crate::quality::QualityCriteria;

/// Settings that control how a surface is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SurfaceSettings {
    /// Height interpolation scheme.
    pub interpolation: Interpolation,
    /// Blank out cells in border-propagated bad triangles.
    pub hide_skinny_triangles: bool,
    /// Predicates used to classify bad triangles.
    pub quality: QualityCriteria,
    /// Number of undo snapshots kept.
    pub history_capacity: usize,
    /// Recompute rasters after every edit.
    pub live_update: bool,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::CloughTocher,
            hide_skinny_triangles: false,
            quality: QualityCriteria::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            live_update: true,
        }
    }
}

impl SurfaceSettings {
    /// Returns `true` if switching to `other` changes raster values.
    pub fn affects_raster(&self, other: &SurfaceSettings) -> bool {
        self.interpolation != other.interpolation
            || self.hide_skinny_triangles != other.hide_skinny_triangles
            || self.quality != other.quality
    }

    /// Applies overrides from a fragment's `params` object.
    pub fn with_params(mut self, params: &serde_json::Map<String, serde_json::Value>) -> Self {
        if let Some(v) = params.get("interpolation").and_then(|v| v.as_str()) {
            self.interpolation = Interpolation::from_param(v);
        }
        self
    }

    /// Saves these settings to a JSON file.
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &str) -> std::io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let settings: SurfaceSettings = serde_json::from_str(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(settings)
    }
}
