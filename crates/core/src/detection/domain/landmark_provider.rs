use crate::detection::domain::geometry::{FaceBox, Point};
use crate::shared::frame::Frame;

/// Everything the rich strategy extracts from one frame, in normalized
/// image coordinates.
#[derive(Clone, Debug, Default)]
pub struct LandmarkObservation {
    pub faces: Vec<FaceBox>,
    /// Facial keypoints of the most confident face; empty when none.
    pub face_landmarks: Vec<Point>,
    /// One landmark set per detected hand.
    pub hands: Vec<Vec<Point>>,
    /// Body-pose landmark set; empty when no person was found.
    pub pose: Vec<Point>,
}

/// Capability interface of the rich detection strategy: face localization,
/// facial landmarks, hand landmark sets, and a body-pose landmark set from a
/// single observation pass.
///
/// Implementations may be stateful (model sessions), hence `&mut self`.
pub trait LandmarkProvider: Send {
    fn observe(&mut self, frame: &Frame)
        -> Result<LandmarkObservation, Box<dyn std::error::Error>>;
}
