//! Global to transposed-local coordinate frames.
//!
//! A surface is parametrised over a 2D plane `(i, j)` with `k` as its height.
//! Which global axes become `i`, `j` and `k` depends on the [`Orientation`].

use std::fmt;
use std::rc::Rc;

use crate::error::FrameError;
use crate::geometry::Point3;

/// Slicing orientation of a surface or a volume view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Orientation {
    /// Height runs along global x: local `(i, j, k) = (gy, gz, gx)`.
    Yz,
    /// Height runs along global y: local `(i, j, k) = (gx, gz, gy)`.
    Xz,
}

impl Orientation {
    /// Numeric direction used in fragment files (0 or 1).
    pub fn direction(self) -> u8 {
        match self {
            Orientation::Yz => 0,
            Orientation::Xz => 1,
        }
    }

    pub fn from_direction(direction: i64) -> Option<Self> {
        match direction {
            0 => Some(Orientation::Yz),
            1 => Some(Orientation::Xz),
            _ => None,
        }
    }

    /// Global axis index feeding local axis 0, 1 and 2.
    fn permutation(self) -> [usize; 3] {
        match self {
            Orientation::Yz => [1, 2, 0],
            Orientation::Xz => [0, 2, 1],
        }
    }
}

/// Global axis that corresponds to a local axis in the given orientation.
pub fn global_axis_from_local(axis: usize, orientation: Orientation) -> usize {
    match orientation {
        Orientation::Yz => (axis + 1) % 3,
        Orientation::Xz => [0, 2, 1][axis % 3],
    }
}

/// Permutes global coordinates into the transposed frame with no scaling.
pub fn transpose_global(g: Point3, orientation: Orientation) -> Point3 {
    let a = g.to_array();
    let p = orientation.permutation();
    Point3::new(a[p[0]], a[p[1]], a[p[2]])
}

/// Inverse of [`transpose_global`].
pub fn untranspose_global(t: Point3, orientation: Orientation) -> Point3 {
    let a = t.to_array();
    let p = orientation.permutation();
    let mut out = [0.0; 3];
    for (local, &global) in p.iter().enumerate() {
        out[global] = a[local];
    }
    Point3::from_array(out)
}

/// Maps local coordinates between two orientations of the same volume.
///
/// The two orientations differ by a swap of local `i` and `k`, so the mapping
/// is its own inverse.
pub fn view_to_surface(ijk: Point3, surface: Orientation, view: Orientation) -> Point3 {
    if surface == view {
        ijk
    } else {
        Point3::new(ijk.z, ijk.y, ijk.x)
    }
}

/// Integer affine placement of a volume in global coordinates.
///
/// Steps are positive; [`VolumeFrame::new`] and deserialization reject
/// anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct VolumeFrame {
    starts: [i64; 3],
    steps: [i64; 3],
    sizes: [usize; 3],
}

#[derive(serde::Deserialize)]
struct RawFrame {
    starts: [i64; 3],
    steps: [i64; 3],
    sizes: [usize; 3],
}

impl TryFrom<RawFrame> for VolumeFrame {
    type Error = FrameError;

    fn try_from(raw: RawFrame) -> Result<Self, FrameError> {
        Self::new(raw.starts, raw.steps, raw.sizes)
    }
}

impl VolumeFrame {
    /// `starts` is the global coordinate of voxel 0 along x, y and z,
    /// `steps` the global distance between consecutive voxels and `sizes`
    /// the voxel counts.
    pub fn new(starts: [i64; 3], steps: [i64; 3], sizes: [usize; 3]) -> Result<Self, FrameError> {
        if let Some(axis) = steps.iter().position(|&s| s <= 0) {
            return Err(FrameError::NonPositiveStep {
                axis,
                step: steps[axis],
            });
        }
        Ok(Self {
            starts,
            steps,
            sizes,
        })
    }

    /// Frame with unit steps starting at the origin.
    pub fn unit(sizes: [usize; 3]) -> Self {
        Self {
            starts: [0; 3],
            steps: [1; 3],
            sizes,
        }
    }

    pub fn starts(&self) -> [i64; 3] {
        self.starts
    }

    pub fn steps(&self) -> [i64; 3] {
        self.steps
    }

    pub fn sizes(&self) -> [usize; 3] {
        self.sizes
    }

    /// Converts a global position to local voxel coordinates.
    pub fn global_to_local(&self, g: Point3, orientation: Orientation) -> Point3 {
        let a = g.to_array();
        let mut idx = [0.0; 3];
        for axis in 0..3 {
            let step = self.steps[axis] as f64;
            idx[axis] = (a[axis] - self.starts[axis] as f64) / step;
        }
        transpose_global(Point3::from_array(idx), orientation)
    }

    /// Converts local voxel coordinates back to a global position.
    pub fn local_to_global(&self, l: Point3, orientation: Orientation) -> Point3 {
        let idx = untranspose_global(l, orientation).to_array();
        let mut g = [0.0; 3];
        for axis in 0..3 {
            g[axis] = self.starts[axis] as f64 + idx[axis] * self.steps[axis] as f64;
        }
        Point3::from_array(g)
    }

    pub fn globals_to_locals(&self, points: &[Point3], orientation: Orientation) -> Vec<Point3> {
        points
            .iter()
            .map(|p| self.global_to_local(*p, orientation))
            .collect()
    }

    pub fn locals_to_globals(&self, points: &[Point3], orientation: Orientation) -> Vec<Point3> {
        points
            .iter()
            .map(|p| self.local_to_global(*p, orientation))
            .collect()
    }

    /// Local extent `(ni, nj, nk)` in the given orientation.
    pub fn local_shape(&self, orientation: Orientation) -> (usize, usize, usize) {
        let p = orientation.permutation();
        (self.sizes[p[0]], self.sizes[p[1]], self.sizes[p[2]])
    }
}

/// Source of volume intensities for the sample field.
pub trait VolumeSampler {
    /// Intensity at a global position.
    fn sample(&self, global: Point3) -> u16;
}

impl<F> VolumeSampler for F
where
    F: Fn(Point3) -> u16,
{
    fn sample(&self, global: Point3) -> u16 {
        self(global)
    }
}

/// The volume currently being viewed.
#[derive(Clone)]
pub struct ViewContext {
    pub frame: VolumeFrame,
    pub orientation: Orientation,
    pub sampler: Option<Rc<dyn VolumeSampler>>,
}

impl ViewContext {
    pub fn new(frame: VolumeFrame, orientation: Orientation) -> Self {
        Self {
            frame,
            orientation,
            sampler: None,
        }
    }

    pub fn with_sampler(mut self, sampler: Rc<dyn VolumeSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Returns `true` if the frame or orientation differ. Samplers are not compared.
    pub fn differs_from(&self, other: &ViewContext) -> bool {
        self.frame != other.frame || self.orientation != other.orientation
    }
}

impl fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContext")
            .field("frame", &self.frame)
            .field("orientation", &self.orientation)
            .field("sampler", &self.sampler.is_some())
            .finish()
    }
}
