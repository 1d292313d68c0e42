/// Check names, used as the keys of a report's `details` map.
pub mod names {
    pub const FACE_DETECTED: &str = "face_detected";
    pub const MULTIPLE_FACES: &str = "multiple_faces";
    pub const LOOKING_AWAY: &str = "looking_away";
    pub const HANDS_NEAR_FACE: &str = "hands_near_face";
    pub const UNUSUAL_MOVEMENT: &str = "unusual_movement";
    pub const POOR_LIGHTING: &str = "poor_lighting";
    pub const FACE_TOO_SMALL: &str = "face_too_small";
    pub const FRAME_TOO_DARK: &str = "frame_too_dark";
    pub const FRAME_TOO_BRIGHT: &str = "frame_too_bright";
    pub const CHEAT_DETECTION_DISABLED: &str = "cheat_detection_disabled";
}

/// Whether a triggered check contributes to the overall suspicion flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Contributes to `suspicious_activity`.
    Blocking,
    /// Recorded in the report but never escalates on its own.
    Advisory,
}

/// Outcome of one check against one frame.
///
/// `flagged` is the value recorded in the report's `details` map; `triggered`
/// is whether the check raises a violation. The two coincide for every check
/// except face presence, where `face_detected` reads `true` on good frames
/// (no violation) and stays `false` while the blocking "No face detected"
/// violation fires.
#[derive(Clone, Debug)]
pub struct CheckResult {
    pub name: &'static str,
    pub flagged: bool,
    pub triggered: bool,
    pub message: Option<String>,
    pub severity: Severity,
}

impl CheckResult {
    /// Neutral outcome: nothing observed, nothing raised. Also the default
    /// when a check's inputs could not be produced (a failed check never
    /// escalates).
    pub fn clear(name: &'static str) -> Self {
        Self {
            name,
            flagged: false,
            triggered: false,
            message: None,
            severity: Severity::Advisory,
        }
    }

    /// Positive observation recorded in `details` without raising a violation.
    pub fn observed(name: &'static str) -> Self {
        Self {
            flagged: true,
            ..Self::clear(name)
        }
    }

    /// Triggered violation with its detail flag set.
    pub fn violation(name: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            name,
            flagged: true,
            triggered: true,
            message: Some(message.into()),
            severity,
        }
    }

    /// Triggered violation whose detail flag stays false. Used by face
    /// presence: the violation reports what is *missing* from the frame.
    pub fn absence_violation(
        name: &'static str,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name,
            flagged: false,
            triggered: true,
            message: Some(message.into()),
            severity,
        }
    }

    pub fn contributes_blocking(&self) -> bool {
        self.triggered && self.severity == Severity::Blocking
    }
}
