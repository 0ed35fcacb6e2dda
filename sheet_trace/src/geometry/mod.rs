//! Basic geometry primitives shared by the surface engine.

/// Representation of a 2D point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Representation of a 3D point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns the coordinate along `axis` (0 = x, 1 = y, 2 = z).
    pub fn coord(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

/// Calculates the Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

fn cross(a: Point3, b: Point3) -> Point3 {
    Point3 {
        x: a.y * b.z - a.z * b.y,
        y: a.z * b.x - a.x * b.z,
        z: a.x * b.y - a.y * b.x,
    }
}

fn subtract(a: Point3, b: Point3) -> Point3 {
    Point3::new(a.x - b.x, a.y - b.y, a.z - b.z)
}

/// Calculates the area of a planar polygon in 3D space.
pub fn polygon_area3(vertices: &[Point3]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = Point3::new(0.0, 0.0, 0.0);
    for i in 1..(vertices.len() - 1) {
        let v0 = subtract(vertices[i], vertices[0]);
        let v1 = subtract(vertices[i + 1], vertices[0]);
        let c = cross(v0, v1);
        sum.x += c.x;
        sum.y += c.y;
        sum.z += c.z;
    }
    0.5 * (sum.x.powi(2) + sum.y.powi(2) + sum.z.powi(2)).sqrt()
}

/// Barycentric coordinates of `p` with respect to triangle `(a, b, c)`.
///
/// Returns `None` for a degenerate triangle.
pub fn barycentric(p: Point, a: Point, b: Point, c: Point) -> Option<(f64, f64, f64)> {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < f64::EPSILON {
        return None;
    }
    let u = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
    let v = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
    let w = 1.0 - u - v;
    Some((u, v, w))
}

/// Axis-aligned bounding box in continuous plane coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Bounding box of the given points, `None` when the iterator is empty.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = Self {
            min: first,
            max: first,
        };
        for p in iter {
            bb.min.x = bb.min.x.min(p.x);
            bb.min.y = bb.min.y.min(p.y);
            bb.max.x = bb.max.x.max(p.x);
            bb.max.y = bb.max.y.max(p.y);
        }
        Some(bb)
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Union of two optional boxes; either side may be missing.
    pub fn union_opt(a: Option<BoundingBox>, b: Option<BoundingBox>) -> Option<BoundingBox> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Converts to the grid cells covered by this box padded by one cell,
    /// clamped to a `width` x `height` grid.
    pub fn to_cells(&self, width: usize, height: usize) -> CellRect {
        CellRect::clamped(
            self.min.x.floor() as i64 - 1,
            self.min.y.floor() as i64 - 1,
            self.max.x.floor() as i64 + 2,
            self.max.y.floor() as i64 + 2,
            width,
            height,
        )
    }
}

/// Half-open rectangle of grid cells, `[min_x, max_x) x [min_y, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CellRect {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl CellRect {
    pub fn new(min_x: usize, min_y: usize, max_x: usize, max_y: usize) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Builds a rectangle from signed bounds clamped to `[0, width] x [0, height]`.
    pub fn clamped(
        min_x: i64,
        min_y: i64,
        max_x: i64,
        max_y: i64,
        width: usize,
        height: usize,
    ) -> Self {
        let clamp = |v: i64, hi: usize| v.clamp(0, hi as i64) as usize;
        Self {
            min_x: clamp(min_x, width),
            min_y: clamp(min_y, height),
            max_x: clamp(max_x, width),
            max_y: clamp(max_y, height),
        }
    }

    pub fn width(&self) -> usize {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> usize {
        self.max_y.saturating_sub(self.min_y)
    }

    /// Returns `true` if the rectangle covers no cells.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Iterates over `(x, y)` cell coordinates in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.min_y..self.max_y).flat_map(move |y| (self.min_x..self.max_x).map(move |x| (x, y)))
    }
}
