//! Automatic point suggestions.

use crate::frame::Orientation;
use crate::geometry::Point3;

/// Source of candidate surface points, e.g. a structure-tensor tracker.
///
/// Suggestions are fed through the normal point-adding path, so they merge
/// with existing points the same way manual input does.
pub trait PointSuggester {
    /// Candidate global points grown from `seed` while viewing in `direction`.
    fn suggest_points(&self, seed: Point3, direction: Orientation) -> Vec<Point3>;
}

impl<F> PointSuggester for F
where
    F: Fn(Point3, Orientation) -> Vec<Point3>,
{
    fn suggest_points(&self, seed: Point3, direction: Orientation) -> Vec<Point3> {
        self(seed, direction)
    }
}

/// Replays a fixed list of points regardless of the seed.
#[derive(Debug, Clone, Default)]
pub struct FixedSuggestions {
    pub points: Vec<Point3>,
}

impl PointSuggester for FixedSuggestions {
    fn suggest_points(&self, _seed: Point3, _direction: Orientation) -> Vec<Point3> {
        self.points.clone()
    }
}
