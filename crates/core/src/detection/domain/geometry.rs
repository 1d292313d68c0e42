/// A point in normalized image coordinates ([0, 1] on both axes).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned face bounding box in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceBox {
    /// Box grown by `fraction` of its own width/height on every side.
    pub fn expanded(&self, fraction: f64) -> FaceBox {
        let dx = self.width * fraction;
        let dy = self.height * fraction;
        FaceBox {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2.0 * dx,
            height: self.height + 2.0 * dy,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// A detected region in pixel coordinates, as produced by the cascade scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Centroid of a landmark set; `None` for an empty set.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let y = points.iter().map(|p| p.y).sum::<f64>() / n;
    Some(Point::new(x, y))
}

/// Mean Euclidean distance between corresponding landmarks.
///
/// `None` when the sets are empty or of different cardinality — the caller
/// treats that as "no movement evidence", not as zero movement.
pub fn mean_displacement(previous: &[Point], current: &[Point]) -> Option<f64> {
    if previous.is_empty() || previous.len() != current.len() {
        return None;
    }
    let total: f64 = previous
        .iter()
        .zip(current)
        .map(|(a, b)| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt())
        .sum();
    Some(total / current.len() as f64)
}
