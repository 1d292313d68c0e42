use crate::detection::domain::check::CheckResult;
use crate::detection::domain::state::DetectionState;
use crate::shared::frame::Frame;

/// Identifies which detection strategy produced a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisMethod {
    /// Rich landmark-based strategy.
    Landmark,
    /// Lightweight sliding-window cascade strategy.
    Cascade,
    /// Brightness/edge heuristics only; the cascade classifier failed to
    /// initialize.
    Basic,
}

impl AnalysisMethod {
    pub fn tag(self) -> &'static str {
        match self {
            AnalysisMethod::Landmark => "landmark",
            AnalysisMethod::Cascade => "cascade",
            AnalysisMethod::Basic => "basic",
        }
    }
}

/// Everything a backend observed about one frame.
///
/// `checks` is in evaluation order; the report's violation list preserves it.
#[derive(Clone, Debug)]
pub struct FrameAnalysis {
    pub method: AnalysisMethod,
    pub checks: Vec<CheckResult>,
    pub face_count: Option<usize>,
}

/// Domain interface for a detection strategy.
///
/// Implementations are shared process-wide across sessions, hence `&self`;
/// per-session temporal memory lives in the caller-owned [`DetectionState`].
/// A run never fails: checks whose inputs cannot be produced degrade to
/// their neutral result instead of surfacing an error.
pub trait DetectionBackend: Send + Sync {
    fn run(&self, frame: &Frame, state: &mut DetectionState) -> FrameAnalysis;
}
