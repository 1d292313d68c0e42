use std::sync::Mutex;

use crate::detection::domain::backend::{AnalysisMethod, DetectionBackend, FrameAnalysis};
use crate::detection::domain::check::{names, CheckResult, Severity};
use crate::detection::domain::geometry::{centroid, mean_displacement, Point};
use crate::detection::domain::landmark_provider::{LandmarkObservation, LandmarkProvider};
use crate::detection::domain::state::DetectionState;
use crate::shared::constants::{POSE_MODEL_NAME, POSE_MODEL_URL};
use crate::shared::frame::Frame;
use crate::shared::grayscale::Grayscale;
use crate::shared::model_resolver;

use super::onnx_landmark_provider::OnnxLandmarkProvider;

/// Mean normalized landmark displacement above which movement is unusual.
const MOVEMENT_THRESHOLD: f64 = 0.05;

/// Face box growth (fraction of box width/height per side) for the
/// hands-near-face test.
const HAND_FACE_MARGIN: f64 = 0.2;

/// Acceptable mean-brightness band; outside it lighting is flagged.
const BRIGHTNESS_RANGE: (f64, f64) = (50.0, 200.0);

/// Capability-rich detection strategy: face localization, facial landmarks,
/// hand landmark sets, and a body-pose landmark set from one provider pass.
///
/// The provider sits behind a mutex because model sessions need exclusive
/// access per inference; the backend itself is shared across all sessions.
pub struct LandmarkBackend {
    provider: Mutex<Box<dyn LandmarkProvider>>,
}

impl LandmarkBackend {
    /// Resolve the pose model and build the production provider.
    ///
    /// Fails when the model cannot be resolved or the session cannot be
    /// constructed; the caller downgrades to the cascade strategy.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let model_path = model_resolver::resolve(POSE_MODEL_NAME, POSE_MODEL_URL, None, None)?;
        let provider = OnnxLandmarkProvider::new(&model_path)?;
        Ok(Self::with_provider(Box::new(provider)))
    }

    pub fn with_provider(provider: Box<dyn LandmarkProvider>) -> Self {
        Self {
            provider: Mutex::new(provider),
        }
    }

    fn observe(&self, frame: &Frame) -> Option<LandmarkObservation> {
        let mut provider = self
            .provider
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match provider.observe(frame) {
            Ok(observation) => Some(observation),
            Err(e) => {
                log::warn!("landmark extraction failed, perception checks skipped: {e}");
                None
            }
        }
    }
}

impl DetectionBackend for LandmarkBackend {
    fn run(&self, frame: &Frame, state: &mut DetectionState) -> FrameAnalysis {
        let observation = self.observe(frame);
        let mut checks = Vec::with_capacity(6);

        let (face_count, current_pose) = match &observation {
            // Failed extraction: every perception check degrades to its
            // neutral result.
            None => {
                checks.push(CheckResult::clear(names::FACE_DETECTED));
                checks.push(CheckResult::clear(names::MULTIPLE_FACES));
                checks.push(CheckResult::clear(names::LOOKING_AWAY));
                checks.push(CheckResult::clear(names::HANDS_NEAR_FACE));
                checks.push(CheckResult::clear(names::UNUSUAL_MOVEMENT));
                (None, Vec::new())
            }
            Some(obs) => {
                let count = obs.faces.len();
                checks.push(face_presence_check(count));
                checks.push(multiple_faces_check(count));
                checks.push(gaze_check());
                checks.push(hands_near_face_check(obs));
                checks.push(movement_check(state, &obs.pose));
                (Some(count), obs.pose.clone())
            }
        };

        checks.push(illumination_check(frame));

        state.previous_landmarks = current_pose;
        state.frame_count += 1;

        FrameAnalysis {
            method: AnalysisMethod::Landmark,
            checks,
            face_count,
        }
    }
}

fn face_presence_check(face_count: usize) -> CheckResult {
    if face_count == 0 {
        CheckResult::absence_violation(names::FACE_DETECTED, Severity::Blocking, "No face detected")
    } else {
        CheckResult::observed(names::FACE_DETECTED)
    }
}

fn multiple_faces_check(face_count: usize) -> CheckResult {
    if face_count > 1 {
        CheckResult::violation(
            names::MULTIPLE_FACES,
            Severity::Blocking,
            "Multiple faces detected",
        )
    } else {
        CheckResult::clear(names::MULTIPLE_FACES)
    }
}

/// Gaze estimation from the eye-region landmarks is not implemented; the
/// check always reports the candidate looking forward. It stays in the suite
/// so the report shape and confidence denominator are stable when an
/// estimator lands.
fn gaze_check() -> CheckResult {
    CheckResult::clear(names::LOOKING_AWAY)
}

fn hands_near_face_check(observation: &LandmarkObservation) -> CheckResult {
    let Some(face) = observation.faces.first() else {
        return CheckResult::clear(names::HANDS_NEAR_FACE);
    };
    let region = face.expanded(HAND_FACE_MARGIN);
    let near = observation
        .hands
        .iter()
        .filter_map(|hand| centroid(hand))
        .any(|center| region.contains(center));
    if near {
        CheckResult::violation(
            names::HANDS_NEAR_FACE,
            Severity::Blocking,
            "Hands detected near face",
        )
    } else {
        CheckResult::clear(names::HANDS_NEAR_FACE)
    }
}

/// The first frame of a session (or after a reset) only records the
/// baseline; landmark sets of different cardinality are not comparable and
/// skip the check.
fn movement_check(state: &DetectionState, current: &[Point]) -> CheckResult {
    if state.frame_count == 0 {
        return CheckResult::clear(names::UNUSUAL_MOVEMENT);
    }
    match mean_displacement(&state.previous_landmarks, current) {
        Some(mean) if mean > MOVEMENT_THRESHOLD => CheckResult::violation(
            names::UNUSUAL_MOVEMENT,
            Severity::Blocking,
            "Unusual movement detected",
        ),
        _ => CheckResult::clear(names::UNUSUAL_MOVEMENT),
    }
}

/// Advisory only: bad lighting degrades evidence quality but is not by
/// itself suspect.
fn illumination_check(frame: &Frame) -> CheckResult {
    let mean = Grayscale::from_frame(frame).mean();
    if mean < BRIGHTNESS_RANGE.0 || mean > BRIGHTNESS_RANGE.1 {
        CheckResult::violation(
            names::POOR_LIGHTING,
            Severity::Advisory,
            "Poor lighting conditions",
        )
    } else {
        CheckResult::clear(names::POOR_LIGHTING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::geometry::FaceBox;
    use crate::detection::domain::report::ViolationReport;
    use approx::assert_relative_eq;

    struct FakeProvider {
        observations: Vec<LandmarkObservation>,
        call_count: usize,
    }

    impl FakeProvider {
        fn new(observations: Vec<LandmarkObservation>) -> Self {
            Self {
                observations,
                call_count: 0,
            }
        }
    }

    impl LandmarkProvider for FakeProvider {
        fn observe(
            &mut self,
            _frame: &Frame,
        ) -> Result<LandmarkObservation, Box<dyn std::error::Error>> {
            let obs = self.observations[self.call_count % self.observations.len()].clone();
            self.call_count += 1;
            Ok(obs)
        }
    }

    struct FailingProvider;

    impl LandmarkProvider for FailingProvider {
        fn observe(
            &mut self,
            _frame: &Frame,
        ) -> Result<LandmarkObservation, Box<dyn std::error::Error>> {
            Err("inference session lost".into())
        }
    }

    fn frame(value: u8) -> Frame {
        Frame::new(vec![value; 16 * 16 * 3], 16, 16, 3)
    }

    fn face_at(x: f64, y: f64) -> FaceBox {
        FaceBox {
            x,
            y,
            width: 0.2,
            height: 0.2,
        }
    }

    fn observation(faces: Vec<FaceBox>, hands: Vec<Vec<Point>>, pose: Vec<Point>) -> LandmarkObservation {
        LandmarkObservation {
            faces,
            face_landmarks: Vec::new(),
            hands,
            pose,
        }
    }

    fn pose_at(offset: f64) -> Vec<Point> {
        (0..4)
            .map(|i| Point::new(0.2 + 0.1 * i as f64 + offset, 0.5 + offset))
            .collect()
    }

    fn run_one(backend: &LandmarkBackend, state: &mut DetectionState, value: u8) -> ViolationReport {
        ViolationReport::from_analysis(backend.run(&frame(value), state))
    }

    // ── face presence ───────────────────────────────────────────────

    #[test]
    fn test_no_face_is_blocking_violation() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![], vec![], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert!(report.suspicious_activity);
        assert!(report.violations.contains(&"No face detected".to_string()));
        assert_eq!(report.details[names::FACE_DETECTED], false);
        assert_eq!(report.face_count, Some(0));
        assert_eq!(report.analysis_method, "landmark");
    }

    #[test]
    fn test_single_face_clean_frame() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.0)),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert!(!report.suspicious_activity);
        assert!(report.violations.is_empty());
        assert_eq!(report.details[names::FACE_DETECTED], true);
        assert_eq!(report.face_count, Some(1));
        // face_detected is the only flagged detail out of six
        assert_relative_eq!(report.confidence, 1.0 / 6.0);
    }

    #[test]
    fn test_multiple_faces_is_blocking_violation() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.1, 0.3), face_at(0.6, 0.3)], vec![], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert!(report.suspicious_activity);
        assert_eq!(report.details[names::MULTIPLE_FACES], true);
        assert!(report
            .violations
            .contains(&"Multiple faces detected".to_string()));
        assert_eq!(report.face_count, Some(2));
    }

    // ── hands near face ─────────────────────────────────────────────

    #[test]
    fn test_hand_inside_expanded_face_box_triggers() {
        // Face box x: 0.4..0.6; expanded by 20% of width: 0.36..0.64.
        // A hand centroid at x=0.62 is outside the raw box but inside the margin.
        let hand = vec![Point::new(0.62, 0.4)];
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![hand], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert!(report.suspicious_activity);
        assert_eq!(report.details[names::HANDS_NEAR_FACE], true);
        assert!(report
            .violations
            .contains(&"Hands detected near face".to_string()));
    }

    #[test]
    fn test_hand_outside_expanded_face_box_is_clear() {
        let hand = vec![Point::new(0.9, 0.9)];
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![hand], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::HANDS_NEAR_FACE], false);
    }

    #[test]
    fn test_hand_centroid_is_averaged_over_landmarks() {
        // Individual landmarks straddle the face region; their centroid
        // (0.5, 0.4) falls inside it.
        let hand = vec![Point::new(0.1, 0.4), Point::new(0.9, 0.4)];
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![hand], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::HANDS_NEAR_FACE], true);
    }

    #[test]
    fn test_hands_without_face_are_ignored() {
        let hand = vec![Point::new(0.5, 0.5)];
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![], vec![hand], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::HANDS_NEAR_FACE], false);
    }

    // ── movement ────────────────────────────────────────────────────

    #[test]
    fn test_movement_never_triggers_on_first_frame() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.0)),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::UNUSUAL_MOVEMENT], false);
        assert_eq!(state.frame_count, 1);
        assert_eq!(state.previous_landmarks, pose_at(0.0));
    }

    #[test]
    fn test_large_displacement_triggers_movement() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.0)),
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.2)),
        ])));
        let mut state = DetectionState::new();

        run_one(&backend, &mut state, 128);
        let report = run_one(&backend, &mut state, 128);

        assert!(report.suspicious_activity);
        assert_eq!(report.details[names::UNUSUAL_MOVEMENT], true);
        assert!(report
            .violations
            .contains(&"Unusual movement detected".to_string()));
    }

    #[test]
    fn test_small_displacement_is_clear() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.0)),
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.01)),
        ])));
        let mut state = DetectionState::new();

        run_one(&backend, &mut state, 128);
        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::UNUSUAL_MOVEMENT], false);
    }

    #[test]
    fn test_cardinality_change_skips_movement() {
        let short_pose = vec![Point::new(0.9, 0.9)];
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.0)),
            observation(vec![face_at(0.4, 0.3)], vec![], short_pose),
        ])));
        let mut state = DetectionState::new();

        run_one(&backend, &mut state, 128);
        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::UNUSUAL_MOVEMENT], false);
    }

    #[test]
    fn test_movement_never_triggers_after_reset() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.0)),
            observation(vec![face_at(0.4, 0.3)], vec![], pose_at(0.3)),
        ])));
        let mut state = DetectionState::new();

        run_one(&backend, &mut state, 128);
        state.reset();
        // First frame after reset carries a large displacement vs. the
        // discarded baseline, but must be treated as a fresh baseline.
        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::UNUSUAL_MOVEMENT], false);
    }

    // ── illumination ────────────────────────────────────────────────

    #[test]
    fn test_poor_lighting_alone_is_not_suspicious() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 20); // dark frame

        assert_eq!(report.details[names::POOR_LIGHTING], true);
        assert!(report
            .violations
            .contains(&"Poor lighting conditions".to_string()));
        assert!(!report.suspicious_activity);
    }

    #[test]
    fn test_bright_frame_flags_lighting() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 230);

        assert_eq!(report.details[names::POOR_LIGHTING], true);
    }

    #[test]
    fn test_normal_brightness_is_clear() {
        let backend = LandmarkBackend::with_provider(Box::new(FakeProvider::new(vec![
            observation(vec![face_at(0.4, 0.3)], vec![], vec![]),
        ])));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert_eq!(report.details[names::POOR_LIGHTING], false);
    }

    // ── provider failure ────────────────────────────────────────────

    #[test]
    fn test_provider_failure_degrades_to_neutral_checks() {
        let backend = LandmarkBackend::with_provider(Box::new(FailingProvider));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 128);

        assert!(!report.suspicious_activity);
        assert!(report.violations.is_empty());
        assert_eq!(report.face_count, None);
        assert_eq!(report.details.len(), 6);
        assert!(report.details.values().all(|&flagged| !flagged));
        // State still advances so the stream position is tracked
        assert_eq!(state.frame_count, 1);
    }

    #[test]
    fn test_provider_failure_still_runs_illumination() {
        let backend = LandmarkBackend::with_provider(Box::new(FailingProvider));
        let mut state = DetectionState::new();

        let report = run_one(&backend, &mut state, 10);

        assert_eq!(report.details[names::POOR_LIGHTING], true);
        assert!(!report.suspicious_activity);
    }
}
