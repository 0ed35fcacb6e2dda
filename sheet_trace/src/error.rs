//! Error types for point edits and volume frames.

use thiserror::Error;

/// Rejections returned by point edits. State is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The target cell is already occupied by another point.
    #[error("cell ({i}, {j}) is already occupied by point {occupant}")]
    Collision { i: i64, j: i64, occupant: usize },

    /// A point index no longer refers to a stored point.
    #[error("point index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// Undo was requested with no snapshot available.
    #[error("undo history is empty")]
    EmptyHistory,

    /// The operation needs a volume view and none is set.
    #[error("no volume view is active")]
    NoView,
}

/// Result type for point edits.
pub type EditResult<T> = std::result::Result<T, EditError>;

/// Rejected volume frame parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("voxel step along axis {axis} must be positive, got {step}")]
    NonPositiveStep { axis: usize, step: i64 },
}
