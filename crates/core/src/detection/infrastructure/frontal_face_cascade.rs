use thiserror::Error;

use crate::detection::domain::classifier::{FaceRegionClassifier, ScanParams};
use crate::detection::domain::geometry::PixelRect;
use crate::shared::grayscale::Grayscale;

use super::math;

/// Minimum brightness variance for a window to be considered at all.
/// Flat regions (walls, black frames) are rejected before any stage runs.
const MIN_WINDOW_VARIANCE: f64 = 144.0; // stddev >= 12

/// Rectangle-similarity tolerance for neighbor grouping, as a fraction of
/// the smaller rectangle's size.
const GROUPING_EPS: f64 = 0.2;

/// Sub-window band, as fractions of the window side.
#[derive(Clone, Copy, Debug)]
struct Band {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl Band {
    fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.left)
            && (0.0..=1.0).contains(&self.right)
            && (0.0..=1.0).contains(&self.top)
            && (0.0..=1.0).contains(&self.bottom)
            && self.left < self.right
            && self.top < self.bottom
    }
}

/// One contrast test: the `darker` band's mean brightness must undercut the
/// `brighter` band's by at least `margin` gray levels.
#[derive(Clone, Copy, Debug)]
struct ContrastStage {
    darker: Band,
    brighter: Band,
    margin: f64,
}

const EYE_BAND: Band = Band {
    left: 0.10,
    top: 0.25,
    right: 0.90,
    bottom: 0.45,
};
const FOREHEAD: Band = Band {
    left: 0.15,
    top: 0.05,
    right: 0.85,
    bottom: 0.20,
};
const CHEEKS: Band = Band {
    left: 0.15,
    top: 0.50,
    right: 0.85,
    bottom: 0.70,
};
const LEFT_EYE: Band = Band {
    left: 0.12,
    top: 0.28,
    right: 0.35,
    bottom: 0.43,
};
const RIGHT_EYE: Band = Band {
    left: 0.65,
    top: 0.28,
    right: 0.88,
    bottom: 0.43,
};
const NOSE_BRIDGE: Band = Band {
    left: 0.40,
    top: 0.28,
    right: 0.60,
    bottom: 0.43,
};

/// Frontal-face stage table: the eye band is darker than forehead and
/// cheeks, and both eye sockets are darker than the nose bridge between
/// them. Ordered cheapest-reject-first.
const STAGES: [ContrastStage; 4] = [
    ContrastStage {
        darker: EYE_BAND,
        brighter: FOREHEAD,
        margin: 5.0,
    },
    ContrastStage {
        darker: EYE_BAND,
        brighter: CHEEKS,
        margin: 5.0,
    },
    ContrastStage {
        darker: LEFT_EYE,
        brighter: NOSE_BRIDGE,
        margin: 15.0,
    },
    ContrastStage {
        darker: RIGHT_EYE,
        brighter: NOSE_BRIDGE,
        margin: 15.0,
    },
];

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("invalid stage table: {0}")]
    InvalidStages(&'static str),
}

/// Multi-scale sliding-window frontal-face detector over integral images.
///
/// A window passes when its brightness variance clears the flatness gate and
/// every contrast stage holds; raw candidates are then clustered with
/// union-find and clusters below the neighbor threshold are discarded.
pub struct FrontalFaceCascade {
    stages: Vec<ContrastStage>,
}

impl FrontalFaceCascade {
    /// Build the classifier, validating the stage table.
    pub fn new() -> Result<Self, CascadeError> {
        for stage in &STAGES {
            if !stage.darker.is_valid() || !stage.brighter.is_valid() {
                return Err(CascadeError::InvalidStages("band outside the unit window"));
            }
            if stage.margin <= 0.0 {
                return Err(CascadeError::InvalidStages("non-positive stage margin"));
            }
        }
        Ok(Self {
            stages: STAGES.to_vec(),
        })
    }

    fn window_passes(&self, integral: &IntegralImage, x: u32, y: u32, win: u32) -> bool {
        if integral.variance(x, y, win, win) < MIN_WINDOW_VARIANCE {
            return false;
        }
        self.stages.iter().all(|stage| {
            let darker = band_mean(integral, x, y, win, stage.darker);
            let brighter = band_mean(integral, x, y, win, stage.brighter);
            darker + stage.margin <= brighter
        })
    }
}

impl FaceRegionClassifier for FrontalFaceCascade {
    fn detect(
        &self,
        gray: &Grayscale,
        params: &ScanParams,
    ) -> Result<Vec<PixelRect>, Box<dyn std::error::Error>> {
        if params.scale_factor <= 1.0 {
            return Err("scale factor must be greater than 1.0".into());
        }
        if params.min_size == 0 {
            return Err("minimum window size must be positive".into());
        }

        let width = gray.width();
        let height = gray.height();
        let limit = width.min(height);
        let integral = IntegralImage::new(gray);

        let mut candidates = Vec::new();
        let mut size = params.min_size as f64;
        while size as u32 <= limit {
            let win = size as u32;
            let step = (win / 12).max(2);
            let mut y = 0;
            while y + win <= height {
                let mut x = 0;
                while x + win <= width {
                    if self.window_passes(&integral, x, y, win) {
                        candidates.push(PixelRect {
                            x,
                            y,
                            width: win,
                            height: win,
                        });
                    }
                    x += step;
                }
                y += step;
            }
            size *= params.scale_factor;
        }

        Ok(group_rectangles(&candidates, params.min_neighbors))
    }
}

// ---------------------------------------------------------------------------
// Integral image
// ---------------------------------------------------------------------------

/// Summed-area tables over brightness and squared brightness, giving O(1)
/// window mean and variance.
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &Grayscale) -> Self {
        let w = gray.width() as usize;
        let h = gray.height() as usize;
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq_sum = vec![0u64; stride * (h + 1)];
        let data = gray.data();

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = u64::from(data[y * w + x]);
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sq_sum[(y + 1) * stride + x + 1] = sq_sum[y * stride + x + 1] + row_sq;
            }
        }

        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    fn rect_sum(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        table[(y + h) * stride + x + w] + table[y * stride + x]
            - table[y * stride + x + w]
            - table[(y + h) * stride + x]
    }

    fn mean(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let area = u64::from(w) * u64::from(h);
        if area == 0 {
            return 0.0;
        }
        Self::rect_sum(&self.sum, self.stride, x, y, w, h) as f64 / area as f64
    }

    fn variance(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let area = u64::from(w) * u64::from(h);
        if area == 0 {
            return 0.0;
        }
        let mean = self.mean(x, y, w, h);
        let sq_mean = Self::rect_sum(&self.sq_sum, self.stride, x, y, w, h) as f64 / area as f64;
        (sq_mean - mean * mean).max(0.0)
    }
}

/// Mean brightness of a fractional band within the window at `(x, y, win)`.
fn band_mean(integral: &IntegralImage, x: u32, y: u32, win: u32, band: Band) -> f64 {
    let win_f = f64::from(win);
    let bx = (band.left * win_f).round() as u32;
    let by = (band.top * win_f).round() as u32;
    let bx1 = ((band.right * win_f).round() as u32).min(win);
    let by1 = ((band.bottom * win_f).round() as u32).min(win);
    let bw = (bx1.saturating_sub(bx)).max(1);
    let bh = (by1.saturating_sub(by)).max(1);
    integral.mean(x + bx, y + by, bw, bh)
}

// ---------------------------------------------------------------------------
// Neighbor grouping
// ---------------------------------------------------------------------------

/// Positional similarity in the manner of cascade detectors: all four edges
/// within `GROUPING_EPS` of the smaller rectangle's size.
fn similar(a: &PixelRect, b: &PixelRect) -> bool {
    let delta =
        GROUPING_EPS * 0.5 * (f64::from(a.width.min(b.width)) + f64::from(a.height.min(b.height)));
    let close = |p: u32, q: u32| f64::from(p.abs_diff(q)) <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

/// Cluster raw candidates with union-find; clusters with fewer than
/// `min_neighbors` members are discarded, survivors are averaged.
fn group_rectangles(candidates: &[PixelRect], min_neighbors: usize) -> Vec<PixelRect> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut parent: Vec<usize> = (0..candidates.len()).collect();
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            if similar(&candidates[i], &candidates[j]) {
                math::union(&mut parent, i, j);
            }
        }
    }

    let mut clusters: std::collections::HashMap<usize, Vec<PixelRect>> =
        std::collections::HashMap::new();
    for (i, rect) in candidates.iter().enumerate() {
        let root = math::find(&mut parent, i);
        clusters.entry(root).or_default().push(*rect);
    }

    let average = |members: &[PixelRect], f: fn(&PixelRect) -> u32| {
        (members.iter().map(|r| u64::from(f(r))).sum::<u64>() / members.len() as u64) as u32
    };
    let mut grouped: Vec<PixelRect> = clusters
        .into_values()
        .filter(|members| members.len() >= min_neighbors.max(1))
        .map(|members| PixelRect {
            x: average(&members, |r| r.x),
            y: average(&members, |r| r.y),
            width: average(&members, |r| r.width),
            height: average(&members, |r| r.height),
        })
        .collect();

    grouped.sort_by_key(|r| (r.x, r.y));
    grouped
}
