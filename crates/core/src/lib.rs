//! Frame-based suspicious-activity detection for live interview sessions.
//!
//! The entry point is [`pipeline::analysis_engine::AnalysisEngine`], which
//! decodes an encoded frame payload, runs the process-wide detection backend
//! against the calling session's temporal state, and aggregates the per-check
//! results into a [`detection::domain::report::ViolationReport`].

pub mod detection;
pub mod pipeline;
pub mod session;
pub mod shared;
