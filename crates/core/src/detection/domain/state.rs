use crate::detection::domain::geometry::Point;
use crate::shared::grayscale::Grayscale;

/// Per-session temporal memory used by the movement checks.
///
/// Owned by exactly one session and mutated only while that session's lock
/// is held. Never dropped implicitly — the owning session lifecycle disposes
/// it through the state store when the interview ends.
#[derive(Debug, Default)]
pub struct DetectionState {
    /// Pose landmark set from the previous frame (landmark strategy).
    pub previous_landmarks: Vec<Point>,
    /// Grayscale plane from the previous frame (cascade strategy).
    pub previous_snapshot: Option<Grayscale>,
    pub frame_count: u64,
    pub previous_face_count: usize,
}

impl DetectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the state; the next frame becomes a fresh movement baseline.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
