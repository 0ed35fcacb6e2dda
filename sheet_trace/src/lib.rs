//! Core library for tracing sheet surfaces through volumetric scans.

pub mod diff;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod infill;
pub mod interpolation;
pub mod io;
pub mod point_store;
pub mod project;
pub mod quality;
pub mod raster;
pub mod settings;
pub mod slice;
pub mod spline;
pub mod suggest;
pub mod surface;
pub mod triangulation;

pub use error::{EditError, EditResult, FrameError};
pub use frame::{Orientation, ViewContext, VolumeFrame, VolumeSampler};
pub use geometry::{Point, Point3};
pub use project::Project;
pub use settings::SurfaceSettings;
pub use surface::{Surface, SurfaceKind};
