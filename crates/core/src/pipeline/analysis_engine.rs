use std::sync::{Arc, PoisonError};

use crate::detection::domain::backend::DetectionBackend;
use crate::detection::domain::report::ViolationReport;
use crate::detection::infrastructure::backend_factory;
use crate::session::state_store::SessionStateStore;
use crate::shared::frame_decoder;

/// Process-wide analysis facade consumed by the session service.
///
/// Holds the backend chosen once at startup and the per-session state store;
/// shareable across request threads behind an `Arc`. Analysis never fails
/// outward: decode problems, disabled detection, and per-check failures all
/// come back as well-formed reports so the hosting service stays available.
pub struct AnalysisEngine {
    backend: Option<Arc<dyn DetectionBackend>>,
    sessions: SessionStateStore,
}

impl AnalysisEngine {
    /// Probe detection strategies once and fix the choice for the process
    /// lifetime.
    pub fn new() -> Self {
        Self::with_backend(backend_factory::create_backend().map(Arc::from))
    }

    pub fn with_backend(backend: Option<Arc<dyn DetectionBackend>>) -> Self {
        Self {
            backend,
            sessions: SessionStateStore::new(),
        }
    }

    pub fn detection_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Analyze one encoded frame for `session_id`.
    ///
    /// The session's state lock is held for the duration of the backend run,
    /// serializing same-session calls while leaving other sessions untouched.
    pub fn analyze(&self, session_id: &str, payload: &str) -> ViolationReport {
        let Some(backend) = &self.backend else {
            return ViolationReport::detection_disabled();
        };

        let frame = match frame_decoder::decode_frame(payload) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame decode failed for session {session_id}: {e}");
                return ViolationReport::failure(format!("Frame analysis failed: {e}"));
            }
        };

        let state = self.sessions.get_or_create(session_id);
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        let analysis = backend.run(&frame, &mut state);
        ViolationReport::from_analysis(analysis)
    }

    /// Re-arm a session's movement baseline.
    pub fn reset_session(&self, session_id: &str) {
        self.sessions.reset(session_id);
    }

    /// Drop a session's state when the interview ends. Returns whether state
    /// existed.
    pub fn end_session(&self, session_id: &str) -> bool {
        self.sessions.dispose(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
