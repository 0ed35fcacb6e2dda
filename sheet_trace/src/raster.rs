//! Dense 2D grids addressed by local plane cells.

use crate::geometry::CellRect;

/// Row-major grid of `width` columns (local `i`) by `height` rows (local `j`).
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

/// Height field type.
pub type HeightField = Raster<f32>;
/// Sample field type.
pub type SampleField = Raster<u16>;

impl<T: Copy> Raster<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Rectangle covering the whole grid.
    pub fn bounds(&self) -> CellRect {
        CellRect::new(0, 0, self.width, self.height)
    }

    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i < self.width && j < self.height {
            Some(self.data[j * self.width + i])
        } else {
            None
        }
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        if i < self.width && j < self.height {
            self.data[j * self.width + i] = value;
        }
    }

    /// Sets every cell of `rect` (clipped to the grid) to `value`.
    pub fn fill_rect(&mut self, rect: CellRect, value: T) {
        let rect = self.clip(rect);
        for (i, j) in rect.cells() {
            self.data[j * self.width + i] = value;
        }
    }

    /// Intersection of `rect` with the grid.
    pub fn clip(&self, rect: CellRect) -> CellRect {
        CellRect::new(
            rect.min_x.min(self.width),
            rect.min_y.min(self.height),
            rect.max_x.min(self.width),
            rect.max_y.min(self.height),
        )
    }

    /// Values of column `i` from top to bottom.
    pub fn column(&self, i: usize) -> Vec<T> {
        if i >= self.width {
            return Vec::new();
        }
        (0..self.height)
            .map(|j| self.data[j * self.width + i])
            .collect()
    }

    /// Values of row `j` from left to right.
    pub fn row(&self, j: usize) -> Vec<T> {
        if j >= self.height {
            return Vec::new();
        }
        self.data[j * self.width..(j + 1) * self.width].to_vec()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }
}

impl Raster<f32> {
    /// Grid of `NaN`.
    pub fn nan(width: usize, height: usize) -> Self {
        Self::filled(width, height, f32::NAN)
    }

    /// Smallest rectangle containing every non-`NaN` cell.
    pub fn data_bounds(&self) -> Option<CellRect> {
        let mut found: Option<CellRect> = None;
        for j in 0..self.height {
            for i in 0..self.width {
                if self.data[j * self.width + i].is_nan() {
                    continue;
                }
                found = Some(match found {
                    None => CellRect::new(i, j, i + 1, j + 1),
                    Some(r) => CellRect::new(
                        r.min_x.min(i),
                        r.min_y.min(j),
                        r.max_x.max(i + 1),
                        r.max_y.max(j + 1),
                    ),
                });
            }
        }
        found
    }

    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Cells whose values differ, `NaN` matching `NaN`.
    pub fn diff_cells(&self, other: &Raster<f32>, tol: f32) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        if self.width != other.width || self.height != other.height {
            return self.bounds().cells().collect();
        }
        for (idx, (a, b)) in self.data.iter().zip(&other.data).enumerate() {
            let same = (a.is_nan() && b.is_nan()) || (a - b).abs() <= tol;
            if !same {
                out.push((idx % self.width, idx / self.width));
            }
        }
        out
    }
}
