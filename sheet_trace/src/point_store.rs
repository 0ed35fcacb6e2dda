//! Canonical point list of a surface with bounded undo history.

use crate::error::{EditError, EditResult};
use crate::frame::{Orientation, VolumeFrame};
use crate::geometry::Point3;

/// Default number of undo snapshots kept per surface.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Current wall-clock time in the format stored in fragment files.
pub fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// A point expressed in a transposed local frame.
///
/// `index` refers back into the point store and is valid only until the next
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPoint {
    pub i: f64,
    pub j: f64,
    pub k: f64,
    pub index: usize,
}

impl LocalPoint {
    pub fn coord(&self, axis: usize) -> f64 {
        match axis {
            0 => self.i,
            1 => self.j,
            _ => self.k,
        }
    }

    /// Integer plane cell, rounding half to even.
    pub fn cell(&self) -> (i64, i64) {
        (
            self.i.round_ties_even() as i64,
            self.j.round_ties_even() as i64,
        )
    }
}

/// Result of [`PointStore::add_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new point was appended at this index.
    Appended(usize),
    /// An existing point in the same cell was replaced.
    MergedInto(usize),
}

impl AddOutcome {
    pub fn index(self) -> usize {
        match self {
            AddOutcome::Appended(i) | AddOutcome::MergedInto(i) => i,
        }
    }
}

/// Fixed-capacity ring buffer of point list snapshots.
#[derive(Debug, Clone)]
pub struct History {
    slots: Vec<Option<Vec<Point3>>>,
    head: usize,
    len: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a snapshot, overwriting the oldest one when full.
    pub fn push(&mut self, snapshot: Vec<Point3>) {
        let cap = self.capacity();
        if cap == 0 {
            return;
        }
        self.slots[self.head] = Some(snapshot);
        self.head = (self.head + 1) % cap;
        self.len = (self.len + 1).min(cap);
    }

    /// Removes and returns the newest snapshot.
    pub fn pop(&mut self) -> Option<Vec<Point3>> {
        if self.len == 0 {
            return None;
        }
        let cap = self.capacity();
        self.head = (self.head + cap - 1) % cap;
        self.len -= 1;
        self.slots[self.head].take()
    }

    /// Changes the capacity, keeping the newest snapshots.
    pub fn resize(&mut self, capacity: usize) {
        let mut kept = Vec::new();
        while let Some(s) = self.pop() {
            kept.push(s);
        }
        *self = History::new(capacity);
        for s in kept.into_iter().take(capacity).rev() {
            self.push(s);
        }
    }
}

/// Owns the global points of one surface.
#[derive(Debug, Clone)]
pub struct PointStore {
    orientation: Orientation,
    points: Vec<Point3>,
    history: History,
    revision: u64,
    modified: String,
}

impl PointStore {
    /// Creates an empty store for a surface with the given orientation.
    pub fn new(orientation: Orientation, history_capacity: usize) -> Self {
        Self {
            orientation,
            points: Vec::new(),
            history: History::new(history_capacity),
            revision: 0,
            modified: timestamp(),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Monotonic counter bumped by every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn modified(&self) -> &str {
        &self.modified
    }

    pub fn set_modified(&mut self, stamp: String) {
        self.modified = stamp;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.history.resize(capacity);
    }

    /// Points in the local frame of `orientation`.
    pub fn local_points(&self, frame: &VolumeFrame, orientation: Orientation) -> Vec<LocalPoint> {
        self.points
            .iter()
            .enumerate()
            .map(|(index, g)| {
                let l = frame.global_to_local(*g, orientation);
                LocalPoint {
                    i: l.x,
                    j: l.y,
                    k: l.z,
                    index,
                }
            })
            .collect()
    }

    fn cell_of(&self, global: Point3, frame: &VolumeFrame) -> (i64, i64) {
        let l = frame.global_to_local(global, self.orientation);
        (l.x.round_ties_even() as i64, l.y.round_ties_even() as i64)
    }

    fn find_in_cell(&self, cell: (i64, i64), frame: &VolumeFrame, skip: Option<usize>) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != skip)
            .find(|(_, p)| self.cell_of(**p, frame) == cell)
            .map(|(idx, _)| idx)
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.modified = timestamp();
    }

    /// Adds a point, or replaces the point already occupying its plane cell.
    pub fn add_point(&mut self, global: Point3, frame: &VolumeFrame) -> EditResult<AddOutcome> {
        let cell = self.cell_of(global, frame);
        if let Some(existing) = self.find_in_cell(cell, frame, None) {
            log::debug!("add_point: cell {:?} occupied by {existing}, merging", cell);
            self.move_point(existing, global, frame)?;
            return Ok(AddOutcome::MergedInto(existing));
        }
        self.history.push(self.points.clone());
        self.points.push(global);
        self.touch();
        Ok(AddOutcome::Appended(self.points.len() - 1))
    }

    /// Moves a point. Fails if it would land in a cell owned by another point.
    pub fn move_point(&mut self, index: usize, global: Point3, frame: &VolumeFrame) -> EditResult<()> {
        let len = self.points.len();
        let old = *self
            .points
            .get(index)
            .ok_or(EditError::OutOfRange { index, len })?;
        if old == global {
            return Ok(());
        }
        let old_cell = self.cell_of(old, frame);
        let new_cell = self.cell_of(global, frame);
        if old_cell != new_cell {
            if let Some(occupant) = self.find_in_cell(new_cell, frame, Some(index)) {
                return Err(EditError::Collision {
                    i: new_cell.0,
                    j: new_cell.1,
                    occupant,
                });
            }
        }
        self.history.push(self.points.clone());
        self.points[index] = global;
        self.touch();
        Ok(())
    }

    pub fn delete_point(&mut self, index: usize) -> EditResult<()> {
        let len = self.points.len();
        if index >= len {
            return Err(EditError::OutOfRange { index, len });
        }
        self.history.push(self.points.clone());
        self.points.remove(index);
        self.touch();
        Ok(())
    }

    /// Restores the most recent snapshot.
    pub fn undo(&mut self) -> EditResult<()> {
        let snapshot = self.history.pop().ok_or(EditError::EmptyHistory)?;
        self.points = snapshot;
        self.touch();
        Ok(())
    }

    /// Replaces the whole list, snapshotting the old one first.
    pub fn replace_all(&mut self, points: Vec<Point3>) {
        if points == self.points {
            return;
        }
        self.history.push(std::mem::take(&mut self.points));
        self.points = points;
        self.touch();
    }

    /// Sets the points of a freshly loaded surface. Nothing is recorded in
    /// the history, so the loaded state cannot be undone.
    pub fn load(&mut self, points: Vec<Point3>) {
        self.history = History::new(self.history.capacity());
        self.points = points;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> VolumeFrame {
        VolumeFrame::unit([100, 100, 100])
    }

    // Yz: local (i, j) = (gy, gz)
    fn g(i: f64, j: f64, k: f64) -> Point3 {
        Point3::new(k, i, j)
    }

    #[test]
    fn add_merges_same_cell() {
        let f = frame();
        let mut s = PointStore::new(Orientation::Yz, 10);
        assert_eq!(s.add_point(g(1.0, 1.0, 5.0), &f), Ok(AddOutcome::Appended(0)));
        assert_eq!(s.add_point(g(3.0, 1.0, 5.0), &f), Ok(AddOutcome::Appended(1)));
        assert_eq!(s.add_point(g(1.2, 0.9, 7.0), &f), Ok(AddOutcome::MergedInto(0)));
        assert_eq!(s.len(), 2);
        assert_eq!(s.points()[0], g(1.2, 0.9, 7.0));
    }

    #[test]
    fn identical_add_is_noop() {
        let f = frame();
        let mut s = PointStore::new(Orientation::Yz, 10);
        s.add_point(g(1.0, 1.0, 5.0), &f).unwrap();
        let rev = s.revision();
        let hist = s.history().len();
        assert_eq!(s.add_point(g(1.0, 1.0, 5.0), &f), Ok(AddOutcome::MergedInto(0)));
        assert_eq!(s.revision(), rev);
        assert_eq!(s.history().len(), hist);
    }

    #[test]
    fn move_collision_rejected() {
        let f = frame();
        let mut s = PointStore::new(Orientation::Yz, 10);
        s.add_point(g(1.0, 1.0, 5.0), &f).unwrap();
        s.add_point(g(4.0, 1.0, 5.0), &f).unwrap();
        let err = s.move_point(0, g(4.4, 1.0, 2.0), &f).unwrap_err();
        assert!(matches!(err, EditError::Collision { occupant: 1, .. }));
        assert_eq!(s.points()[0], g(1.0, 1.0, 5.0));
        // same cell is fine
        s.move_point(0, g(1.3, 1.0, 2.0), &f).unwrap();
        assert!(matches!(
            s.move_point(5, g(0.0, 0.0, 0.0), &f),
            Err(EditError::OutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn delete_and_undo() {
        let f = frame();
        let mut s = PointStore::new(Orientation::Xz, 10);
        s.add_point(Point3::new(1.0, 2.0, 3.0), &f).unwrap();
        s.add_point(Point3::new(5.0, 2.0, 3.0), &f).unwrap();
        let before = s.points().to_vec();
        s.delete_point(0).unwrap();
        assert_eq!(s.len(), 1);
        assert!(s.delete_point(3).is_err());
        s.undo().unwrap();
        assert_eq!(s.points(), &before[..]);
    }

    #[test]
    fn history_is_bounded() {
        let mut h = History::new(3);
        for n in 0..5 {
            h.push(vec![Point3::new(n as f64, 0.0, 0.0)]);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.pop().unwrap()[0].x, 4.0);
        assert_eq!(h.pop().unwrap()[0].x, 3.0);
        assert_eq!(h.pop().unwrap()[0].x, 2.0);
        assert!(h.pop().is_none());
    }

    #[test]
    fn history_resize_keeps_newest() {
        let mut h = History::new(5);
        for n in 0..5 {
            h.push(vec![Point3::new(n as f64, 0.0, 0.0)]);
        }
        h.resize(2);
        assert_eq!(h.capacity(), 2);
        assert_eq!(h.pop().unwrap()[0].x, 4.0);
        assert_eq!(h.pop().unwrap()[0].x, 3.0);
        assert!(h.is_empty());
    }

    #[test]
    fn undo_on_empty_history() {
        let mut s = PointStore::new(Orientation::Yz, 0);
        assert_eq!(s.undo(), Err(EditError::EmptyHistory));
        s.add_point(Point3::new(0.0, 0.0, 0.0), &frame()).unwrap();
        assert_eq!(s.undo(), Err(EditError::EmptyHistory));
    }

    #[test]
    fn load_clears_history() {
        let mut s = PointStore::new(Orientation::Yz, 5);
        s.add_point(Point3::new(0.0, 0.0, 0.0), &frame()).unwrap();
        s.load(vec![Point3::new(1.0, 2.0, 3.0)]);
        assert_eq!(s.points(), &[Point3::new(1.0, 2.0, 3.0)]);
        assert!(s.history().is_empty());
        assert_eq!(s.history().capacity(), 5);
        assert_eq!(s.revision(), 2);
    }
}
