use std::collections::BTreeMap;

use serde::Serialize;

use crate::detection::domain::backend::{AnalysisMethod, FrameAnalysis};
use crate::detection::domain::check::names;

/// Fixed confidence reported by the degraded basic analysis mode, which
/// cannot grade its own evidence.
pub const BASIC_ANALYSIS_CONFIDENCE: f64 = 0.6;

/// The structured result of analyzing one frame, consumed by the session
/// service's escalation policy.
#[derive(Clone, Debug, Serialize)]
pub struct ViolationReport {
    pub suspicious_activity: bool,
    pub confidence: f64,
    /// One entry per check of the active backend, always present.
    pub details: BTreeMap<&'static str, bool>,
    /// Human-readable messages, in check evaluation order.
    pub violations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_count: Option<usize>,
    pub analysis_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ViolationReport {
    /// Fold a backend's check results into the final report.
    ///
    /// Pure function of the analysis: `details` gets every check name,
    /// `violations` preserves evaluation order, `confidence` is the flagged
    /// share of all details (clamped to 1.0), and `suspicious_activity` is
    /// the OR over triggered blocking checks.
    pub fn from_analysis(analysis: FrameAnalysis) -> Self {
        let total = analysis.checks.len();
        let mut details = BTreeMap::new();
        let mut violations = Vec::new();
        let mut suspicious = false;
        let mut flagged = 0usize;

        for check in analysis.checks {
            if check.flagged {
                flagged += 1;
            }
            if check.contributes_blocking() {
                suspicious = true;
            }
            if check.triggered {
                if let Some(message) = check.message {
                    violations.push(message);
                }
            }
            details.insert(check.name, check.flagged);
        }

        let confidence = if analysis.method == AnalysisMethod::Basic {
            BASIC_ANALYSIS_CONFIDENCE
        } else if total == 0 {
            0.0
        } else {
            (flagged as f64 / total as f64).min(1.0)
        };

        Self {
            suspicious_activity: suspicious,
            confidence,
            details,
            violations,
            face_count: analysis.face_count,
            analysis_method: analysis.method.tag(),
            error: None,
        }
    }

    /// Report for a failed analysis call. The service stays available; one
    /// frame's evidence is simply missing.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            suspicious_activity: false,
            confidence: 0.0,
            details: BTreeMap::new(),
            violations: Vec::new(),
            face_count: None,
            analysis_method: "error",
            error: Some(message.into()),
        }
    }

    /// Report returned for every call when no detection backend could be
    /// constructed at startup.
    pub fn detection_disabled() -> Self {
        let mut details = BTreeMap::new();
        details.insert(names::CHEAT_DETECTION_DISABLED, true);
        Self {
            suspicious_activity: false,
            confidence: 0.0,
            details,
            violations: Vec::new(),
            face_count: None,
            analysis_method: "disabled",
            error: Some("Cheat detection not available".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::check::{CheckResult, Severity};
    use approx::assert_relative_eq;

    fn analysis(method: AnalysisMethod, checks: Vec<CheckResult>) -> FrameAnalysis {
        FrameAnalysis {
            method,
            checks,
            face_count: None,
        }
    }

    #[test]
    fn test_confidence_is_flagged_share_of_details() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Landmark,
            vec![
                CheckResult::observed(names::FACE_DETECTED),
                CheckResult::clear(names::MULTIPLE_FACES),
                CheckResult::clear(names::LOOKING_AWAY),
                CheckResult::clear(names::UNUSUAL_MOVEMENT),
            ],
        ));
        assert_relative_eq!(report.confidence, 0.25);
        assert!(!report.suspicious_activity);
    }

    #[test]
    fn test_confidence_clamped_to_unit_interval() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Cascade,
            vec![
                CheckResult::violation(names::FRAME_TOO_DARK, Severity::Blocking, "dark"),
                CheckResult::violation(names::POOR_LIGHTING, Severity::Blocking, "contrast"),
            ],
        ));
        assert!(report.confidence >= 0.0 && report.confidence <= 1.0);
        assert_relative_eq!(report.confidence, 1.0);
    }

    #[test]
    fn test_confidence_empty_suite_is_zero() {
        let report = ViolationReport::from_analysis(analysis(AnalysisMethod::Landmark, vec![]));
        assert_relative_eq!(report.confidence, 0.0);
    }

    #[test]
    fn test_basic_method_has_fixed_confidence() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Basic,
            vec![
                CheckResult::observed(names::FACE_DETECTED),
                CheckResult::clear(names::FRAME_TOO_DARK),
            ],
        ));
        assert_relative_eq!(report.confidence, BASIC_ANALYSIS_CONFIDENCE);
    }

    #[test]
    fn test_violations_preserve_evaluation_order() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Cascade,
            vec![
                CheckResult::absence_violation(names::FACE_DETECTED, Severity::Blocking, "first"),
                CheckResult::clear(names::MULTIPLE_FACES),
                CheckResult::violation(names::UNUSUAL_MOVEMENT, Severity::Blocking, "second"),
                CheckResult::violation(names::POOR_LIGHTING, Severity::Blocking, "third"),
            ],
        ));
        assert_eq!(report.violations, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_advisory_violation_never_sets_suspicious() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Landmark,
            vec![CheckResult::violation(
                names::POOR_LIGHTING,
                Severity::Advisory,
                "Poor lighting conditions",
            )],
        ));
        assert!(!report.suspicious_activity);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.details[names::POOR_LIGHTING], true);
    }

    #[test]
    fn test_blocking_violation_sets_suspicious() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Cascade,
            vec![CheckResult::violation(
                names::FRAME_TOO_DARK,
                Severity::Blocking,
                "Poor lighting - too dark",
            )],
        ));
        assert!(report.suspicious_activity);
    }

    #[test]
    fn test_every_check_present_in_details() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Landmark,
            vec![
                CheckResult::observed(names::FACE_DETECTED),
                CheckResult::clear(names::MULTIPLE_FACES),
                CheckResult::clear(names::LOOKING_AWAY),
                CheckResult::clear(names::HANDS_NEAR_FACE),
                CheckResult::clear(names::UNUSUAL_MOVEMENT),
                CheckResult::clear(names::POOR_LIGHTING),
            ],
        ));
        assert_eq!(report.details.len(), 6);
        assert_eq!(report.details[names::FACE_DETECTED], true);
        assert_eq!(report.details[names::LOOKING_AWAY], false);
    }

    #[test]
    fn test_absence_violation_keeps_detail_false() {
        let report = ViolationReport::from_analysis(analysis(
            AnalysisMethod::Cascade,
            vec![CheckResult::absence_violation(
                names::FACE_DETECTED,
                Severity::Blocking,
                "No face detected",
            )],
        ));
        assert_eq!(report.details[names::FACE_DETECTED], false);
        assert!(report.suspicious_activity);
        assert_eq!(report.violations, vec!["No face detected"]);
        // An absent face contributes nothing to confidence
        assert_relative_eq!(report.confidence, 0.0);
    }

    #[test]
    fn test_failure_report_shape() {
        let report = ViolationReport::failure("Frame analysis failed: bad payload");
        assert!(!report.suspicious_activity);
        assert_relative_eq!(report.confidence, 0.0);
        assert!(report.details.is_empty());
        assert!(report.violations.is_empty());
        assert_eq!(report.analysis_method, "error");
        assert_eq!(
            report.error.as_deref(),
            Some("Frame analysis failed: bad payload")
        );
    }

    #[test]
    fn test_disabled_report_shape() {
        let report = ViolationReport::detection_disabled();
        assert!(!report.suspicious_activity);
        assert_relative_eq!(report.confidence, 0.0);
        assert_eq!(report.details[names::CHEAT_DETECTION_DISABLED], true);
        assert_eq!(report.analysis_method, "disabled");
        assert_eq!(report.error.as_deref(), Some("Cheat detection not available"));
    }

    #[test]
    fn test_serializes_expected_fields() {
        let report = ViolationReport::from_analysis(FrameAnalysis {
            method: AnalysisMethod::Cascade,
            checks: vec![CheckResult::observed(names::FACE_DETECTED)],
            face_count: Some(1),
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["suspicious_activity"], false);
        assert_eq!(json["details"]["face_detected"], true);
        assert_eq!(json["face_count"], 1);
        assert_eq!(json["analysis_method"], "cascade");
        // `error` is omitted entirely when absent
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_serialize_omits_face_count_when_absent() {
        let report = ViolationReport::failure("x");
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("face_count").is_none());
    }
}
