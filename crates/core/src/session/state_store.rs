use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::detection::domain::state::DetectionState;

/// Keyed store of per-session detection state.
///
/// Each session's state sits behind its own mutex: concurrent calls for
/// different sessions never contend, while concurrent calls for the same
/// session serialize — interleaved frames would otherwise corrupt the
/// movement baseline. The outer map lock is held only for map operations,
/// never across an analysis run.
#[derive(Default)]
pub struct SessionStateStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<DetectionState>>>>,
}

impl SessionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing state for the session, or a freshly zeroed one.
    pub fn get_or_create(&self, session_id: &str) -> Arc<Mutex<DetectionState>> {
        self.lock_map()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Zero a session's state; its next frame becomes a fresh movement
    /// baseline. No-op for unknown sessions.
    pub fn reset(&self, session_id: &str) {
        let state = self.lock_map().get(session_id).cloned();
        if let Some(state) = state {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .reset();
        }
    }

    /// Remove a session's state when the owning session ends. Returns whether
    /// an entry existed.
    pub fn dispose(&self, session_id: &str) -> bool {
        self.lock_map().remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_map().is_empty()
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<DetectionState>>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
