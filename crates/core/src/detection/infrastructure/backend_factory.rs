use crate::detection::domain::backend::DetectionBackend;

use super::cascade_backend::CascadeBackend;
use super::landmark_backend::LandmarkBackend;

/// Creates the best available detection backend, preferring the rich
/// landmark strategy.
///
/// Probes once at process startup: landmark model resolution and session
/// construction first, then the sliding-window cascade (which itself may
/// degrade to basic analysis). Returns `None` when no strategy can run at
/// all; the engine then reports detection as disabled on every call. The
/// choice is fixed for the process lifetime — it is not re-probed per
/// request or per session.
pub fn create_backend() -> Option<Box<dyn DetectionBackend>> {
    match LandmarkBackend::new() {
        Ok(backend) => {
            log::info!("using landmark detection backend");
            return Some(Box::new(backend));
        }
        Err(e) => log::warn!("landmark backend unavailable: {e}"),
    }

    log::info!("using cascade detection backend");
    Some(Box::new(CascadeBackend::new()))
}
