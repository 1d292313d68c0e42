use crate::detection::domain::backend::{AnalysisMethod, DetectionBackend, FrameAnalysis};
use crate::detection::domain::check::{names, CheckResult, Severity};
use crate::detection::domain::classifier::{FaceRegionClassifier, ScanParams};
use crate::detection::domain::state::DetectionState;
use crate::shared::frame::Frame;
use crate::shared::grayscale::Grayscale;

use super::frontal_face_cascade::FrontalFaceCascade;

/// Pixel-intensity delta above which a pixel counts as changed between frames.
const DIFF_THRESHOLD: u8 = 25;

/// Percentage of changed pixels above which movement is unusual.
const MOVEMENT_PERCENT_THRESHOLD: f64 = 30.0;

/// Movement needs this many prior frames before it is evaluated.
const MOVEMENT_WARMUP_FRAMES: u64 = 3;

/// Factor over the minimum window size below which a face is "too small".
const SMALL_FACE_FACTOR: f64 = 1.5;

/// Acceptable mean-brightness band.
const BRIGHTNESS_RANGE: (f64, f64) = (30.0, 220.0);

/// Brightness standard deviation below which the frame lacks contrast.
const CONTRAST_THRESHOLD: f64 = 15.0;

/// Edge-pixel ratio above which a person is likely present (basic mode).
const PRESENCE_EDGE_RATIO: f64 = 0.05;

/// Lightweight detection strategy: sliding-window face regions plus
/// grayscale frame differencing. When even the cascade classifier cannot be
/// initialized, degrades to basic brightness/edge analysis instead of
/// refusing to start.
pub struct CascadeBackend {
    classifier: Option<Box<dyn FaceRegionClassifier>>,
    params: ScanParams,
}

impl CascadeBackend {
    pub fn new() -> Self {
        match FrontalFaceCascade::new() {
            Ok(cascade) => Self::with_classifier(Some(Box::new(cascade))),
            Err(e) => {
                log::warn!("face cascade unavailable, falling back to basic analysis: {e}");
                Self::with_classifier(None)
            }
        }
    }

    pub fn with_classifier(classifier: Option<Box<dyn FaceRegionClassifier>>) -> Self {
        Self {
            classifier,
            params: ScanParams::default(),
        }
    }
}

impl Default for CascadeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionBackend for CascadeBackend {
    fn run(&self, frame: &Frame, state: &mut DetectionState) -> FrameAnalysis {
        let gray = Grayscale::from_frame(frame);

        let analysis = match &self.classifier {
            Some(classifier) => cascade_analysis(classifier.as_ref(), &self.params, &gray, state),
            None => basic_analysis(&gray),
        };

        state.previous_face_count = analysis.face_count.unwrap_or(0);
        state.previous_snapshot = Some(gray);
        state.frame_count += 1;

        analysis
    }
}

fn cascade_analysis(
    classifier: &dyn FaceRegionClassifier,
    params: &ScanParams,
    gray: &Grayscale,
    state: &DetectionState,
) -> FrameAnalysis {
    let faces = match classifier.detect(gray, params) {
        Ok(faces) => Some(faces),
        Err(e) => {
            log::warn!("face cascade scan failed, face checks skipped: {e}");
            None
        }
    };

    let mut checks = Vec::with_capacity(7);
    match &faces {
        // Failed scan: face checks degrade to their neutral results.
        None => {
            checks.push(CheckResult::clear(names::FACE_DETECTED));
            checks.push(CheckResult::clear(names::MULTIPLE_FACES));
            checks.push(CheckResult::clear(names::FACE_TOO_SMALL));
        }
        Some(faces) => {
            let count = faces.len();
            checks.push(if count == 0 {
                CheckResult::absence_violation(
                    names::FACE_DETECTED,
                    Severity::Blocking,
                    "No face detected",
                )
            } else {
                CheckResult::observed(names::FACE_DETECTED)
            });
            checks.push(if count > 1 {
                CheckResult::violation(
                    names::MULTIPLE_FACES,
                    Severity::Blocking,
                    format!("Multiple faces detected ({count})"),
                )
            } else {
                CheckResult::clear(names::MULTIPLE_FACES)
            });

            let small_side = f64::from(params.min_size) * SMALL_FACE_FACTOR;
            let too_small = faces
                .iter()
                .any(|f| f64::from(f.width) < small_side || f64::from(f.height) < small_side);
            checks.push(if too_small {
                CheckResult::violation(
                    names::FACE_TOO_SMALL,
                    Severity::Blocking,
                    "Face appears too small (possibly far from camera)",
                )
            } else {
                CheckResult::clear(names::FACE_TOO_SMALL)
            });
        }
    }

    checks.push(movement_check(state, gray));
    checks.extend(illumination_checks(gray));

    FrameAnalysis {
        method: AnalysisMethod::Cascade,
        checks,
        face_count: faces.map(|f| f.len()),
    }
}

/// Consecutive-frame differencing. The first frames of a session only build
/// the baseline; a mid-session resolution change makes snapshots
/// incomparable and skips the check.
fn movement_check(state: &DetectionState, gray: &Grayscale) -> CheckResult {
    if state.frame_count < MOVEMENT_WARMUP_FRAMES {
        return CheckResult::clear(names::UNUSUAL_MOVEMENT);
    }
    let Some(previous) = &state.previous_snapshot else {
        return CheckResult::clear(names::UNUSUAL_MOVEMENT);
    };
    match gray.changed_fraction(previous, DIFF_THRESHOLD) {
        Some(fraction) if fraction * 100.0 > MOVEMENT_PERCENT_THRESHOLD => CheckResult::violation(
            names::UNUSUAL_MOVEMENT,
            Severity::Blocking,
            "Unusual movement detected",
        ),
        Some(_) => CheckResult::clear(names::UNUSUAL_MOVEMENT),
        None => {
            log::debug!("frame dimensions changed mid-session, movement check skipped");
            CheckResult::clear(names::UNUSUAL_MOVEMENT)
        }
    }
}

/// Unlike the landmark strategy, lighting extremes here are blocking: with
/// no landmarks to cross-check, an unusable image is itself disqualifying.
fn illumination_checks(gray: &Grayscale) -> [CheckResult; 3] {
    let mean = gray.mean();
    let too_dark = mean < BRIGHTNESS_RANGE.0;
    let too_bright = mean > BRIGHTNESS_RANGE.1;
    let low_contrast = gray.stddev() < CONTRAST_THRESHOLD;

    let dark = if too_dark {
        CheckResult::violation(
            names::FRAME_TOO_DARK,
            Severity::Blocking,
            "Poor lighting - too dark",
        )
    } else {
        CheckResult::clear(names::FRAME_TOO_DARK)
    };
    let bright = if too_bright {
        CheckResult::violation(
            names::FRAME_TOO_BRIGHT,
            Severity::Blocking,
            "Poor lighting - too bright",
        )
    } else {
        CheckResult::clear(names::FRAME_TOO_BRIGHT)
    };
    let poor = if low_contrast {
        CheckResult::violation(
            names::POOR_LIGHTING,
            Severity::Blocking,
            "Poor lighting - low contrast",
        )
    } else if too_dark || too_bright {
        CheckResult::observed(names::POOR_LIGHTING)
    } else {
        CheckResult::clear(names::POOR_LIGHTING)
    };

    [dark, bright, poor]
}

/// Brightness plus edge density only; reported with its own analysis tag and
/// graded at a fixed confidence by the aggregator.
fn basic_analysis(gray: &Grayscale) -> FrameAnalysis {
    let mean = gray.mean();
    let mut checks = Vec::with_capacity(7);

    checks.push(if mean < BRIGHTNESS_RANGE.0 {
        CheckResult::violation(names::FRAME_TOO_DARK, Severity::Blocking, "Frame is too dark")
    } else {
        CheckResult::clear(names::FRAME_TOO_DARK)
    });
    checks.push(if mean > BRIGHTNESS_RANGE.1 {
        CheckResult::violation(
            names::FRAME_TOO_BRIGHT,
            Severity::Blocking,
            "Frame is too bright",
        )
    } else {
        CheckResult::clear(names::FRAME_TOO_BRIGHT)
    });
    // Edge density as a crude presence proxy: a framed person produces
    // texture that a covered or pointed-away camera does not.
    checks.push(if gray.edge_fraction() > PRESENCE_EDGE_RATIO {
        CheckResult::observed(names::FACE_DETECTED)
    } else {
        CheckResult::absence_violation(
            names::FACE_DETECTED,
            Severity::Blocking,
            "No person detected in frame",
        )
    });
    checks.push(CheckResult::clear(names::MULTIPLE_FACES));
    checks.push(CheckResult::clear(names::FACE_TOO_SMALL));
    checks.push(CheckResult::clear(names::UNUSUAL_MOVEMENT));
    checks.push(CheckResult::clear(names::POOR_LIGHTING));

    FrameAnalysis {
        method: AnalysisMethod::Basic,
        checks,
        face_count: None,
    }
}
