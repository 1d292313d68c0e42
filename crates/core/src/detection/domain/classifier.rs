use crate::detection::domain::geometry::PixelRect;
use crate::shared::grayscale::Grayscale;

/// Scan parameters for the sliding-window face classifier.
#[derive(Clone, Copy, Debug)]
pub struct ScanParams {
    /// Window growth factor between pyramid levels.
    pub scale_factor: f64,
    /// Minimum overlapping raw candidates required to keep a detection.
    pub min_neighbors: usize,
    /// Smallest window side in pixels.
    pub min_size: u32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 50,
        }
    }
}

/// Domain interface for face-region detection on a grayscale plane.
pub trait FaceRegionClassifier: Send + Sync {
    fn detect(
        &self,
        gray: &Grayscale,
        params: &ScanParams,
    ) -> Result<Vec<PixelRect>, Box<dyn std::error::Error>>;
}
