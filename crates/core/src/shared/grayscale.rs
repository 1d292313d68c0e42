use crate::shared::frame::Frame;

/// Sobel gradient magnitude (|gx| + |gy|) above which a pixel counts as an edge.
const EDGE_MAGNITUDE_THRESHOLD: i32 = 160;

/// A grayscale plane derived from a frame, plus the pixel statistics the
/// check suites are built on: mean brightness, contrast, consecutive-frame
/// differencing, and edge density.
#[derive(Clone, Debug)]
pub struct Grayscale {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Grayscale {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize),
            "data length must equal width * height"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert an RGB frame to luma using BT.601 weights.
    pub fn from_frame(frame: &Frame) -> Self {
        debug_assert_eq!(frame.channels(), 3, "expected an RGB frame");
        let data = frame
            .data()
            .chunks_exact(3)
            .map(|px| {
                let luma =
                    299 * u32::from(px[0]) + 587 * u32::from(px[1]) + 114 * u32::from(px[2]);
                (luma / 1000) as u8
            })
            .collect();
        Self::new(data, frame.width(), frame.height())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mean brightness over all pixels (0.0 for an empty plane).
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| u64::from(v)).sum();
        sum as f64 / self.data.len() as f64
    }

    /// Population standard deviation of pixel brightness.
    pub fn stddev(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .data
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / self.data.len() as f64;
        variance.sqrt()
    }

    /// Fraction of pixels whose absolute difference from `previous` exceeds
    /// `threshold`. Returns `None` when the planes have different dimensions.
    pub fn changed_fraction(&self, previous: &Grayscale, threshold: u8) -> Option<f64> {
        if self.width != previous.width || self.height != previous.height {
            return None;
        }
        if self.data.is_empty() {
            return Some(0.0);
        }
        let changed = self
            .data
            .iter()
            .zip(&previous.data)
            .filter(|(&a, &b)| a.abs_diff(b) > threshold)
            .count();
        Some(changed as f64 / self.data.len() as f64)
    }

    /// Fraction of pixels that lie on a strong edge (3x3 Sobel pass).
    ///
    /// Border pixels are never edges; the denominator is the full plane so the
    /// ratio stays comparable across resolutions.
    pub fn edge_fraction(&self) -> f64 {
        let w = self.width as usize;
        let h = self.height as usize;
        if w < 3 || h < 3 {
            return 0.0;
        }

        let px = |x: usize, y: usize| i32::from(self.data[y * w + x]);
        let mut edges = 0usize;
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let gx = px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2 * px(x - 1, y)
                    - px(x - 1, y + 1);
                let gy = px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2 * px(x, y - 1)
                    - px(x + 1, y - 1);
                if gx.abs() + gy.abs() > EDGE_MAGNITUDE_THRESHOLD {
                    edges += 1;
                }
            }
        }
        edges as f64 / (w * h) as f64
    }
}
