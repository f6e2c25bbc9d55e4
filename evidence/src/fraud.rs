//! Fraud-heuristic evaluator.
//!
//! Accumulates an additive risk score from independent indicators of
//! fabricated or duplicated evidence. The score is open-ended upward; the
//! bands are configured, not derived.

use crate::bundle::{EvidenceBundle, SubmissionRecord};
use serde::{Deserialize, Serialize};
use tidemark_types::{ScoringParams, Timestamp};

/// Qualitative banding of the accumulated risk score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn from_score(score: u32, params: &ScoringParams) -> Self {
        if score >= params.risk_high_threshold {
            RiskLevel::High
        } else if score >= params.risk_medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Outcome of the fraud heuristic for one submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    /// Triggered indicators, in evaluation order.
    pub indicators: Vec<String>,
    pub requires_review: bool,
}

/// Evaluate the fraud indicators for a submission against the submitter's
/// recent history.
///
/// `history` is the submitter's prior submissions only; the caller filters
/// by submitter before invoking. Each indicator is independent and only
/// ever adds risk, so growing the history can never lower the score.
pub fn evaluate_fraud(
    bundle: &EvidenceBundle,
    history: &[SubmissionRecord],
    params: &ScoringParams,
    now: Timestamp,
) -> FraudAssessment {
    let mut risk_score = 0u32;
    let mut indicators = Vec::new();

    // Reused GPS position: any prior submission within the duplicate radius.
    if let Some(fix) = &bundle.location {
        let duplicate = history
            .iter()
            .any(|h| h.point.distance_m(&fix.point) < params.duplicate_gps_radius_m);
        if duplicate {
            indicators.push(format!(
                "gps position within {:.0} m of a prior submission",
                params.duplicate_gps_radius_m
            ));
            risk_score += params.duplicate_gps_points;
        }
    }

    // Submission frequency inside the window.
    let recent = history
        .iter()
        .filter(|h| h.submitted_at.elapsed_since(now) < params.frequency_window_secs)
        .count();
    if recent > params.frequency_max_submissions {
        indicators.push(format!(
            "{recent} submissions within {} h",
            params.frequency_window_secs / 3600
        ));
        risk_score += params.frequency_points;
    }

    // Reported GPS accuracy.
    if let Some(fix) = &bundle.location {
        if fix.accuracy_m > params.poor_accuracy_threshold_m {
            indicators.push(format!("gps accuracy {:.0} m is poor", fix.accuracy_m));
            risk_score += params.poor_accuracy_points;
        }
    }

    // Missing capture-time metadata, per image.
    for (index, image) in bundle.images.iter().enumerate() {
        if image.metadata.capture_time.is_none() {
            indicators.push(format!("image {index}: capture-time metadata missing"));
            risk_score += params.missing_metadata_points;
        }
    }

    FraudAssessment {
        risk_score,
        risk_level: RiskLevel::from_score(risk_score, params),
        indicators,
        requires_review: risk_score >= params.review_risk_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{FieldImage, ImageFeatures, ImageMetadata};
    use tidemark_types::{GeoPoint, GpsFix, SubmitterId};

    fn image(capture_time: Option<Timestamp>) -> FieldImage {
        FieldImage {
            content_id: None,
            metadata: ImageMetadata {
                gps: None,
                capture_time,
            },
            features: ImageFeatures {
                vegetation_detected: true,
                health_score: 0.8,
                species_confidence: 0.9,
                quality: 0.8,
            },
        }
    }

    fn bundle(lat: f64, lon: f64, accuracy_m: f64) -> EvidenceBundle {
        EvidenceBundle {
            submitter: SubmitterId::new("agent-1"),
            location: Some(GpsFix::new(
                GeoPoint::new(lat, lon).unwrap(),
                accuracy_m,
                Timestamp::new(10_000),
            )),
            claimed_capture_time: Some(Timestamp::new(10_000)),
            images: vec![image(Some(Timestamp::new(10_000)))],
            satellite: None,
        }
    }

    fn record(lat: f64, lon: f64, at: u64) -> SubmissionRecord {
        SubmissionRecord {
            submitter: SubmitterId::new("agent-1"),
            point: GeoPoint::new(lat, lon).unwrap(),
            submitted_at: Timestamp::new(at),
        }
    }

    #[test]
    fn clean_submission_scores_zero() {
        let params = ScoringParams::restoration_defaults();
        let assessment = evaluate_fraud(&bundle(12.0, 77.0, 5.0), &[], &params, Timestamp::new(10_000));
        assert_eq!(assessment.risk_score, 0);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(!assessment.requires_review);
        assert!(assessment.indicators.is_empty());
    }

    #[test]
    fn duplicate_gps_within_radius_flags_medium_risk() {
        let params = ScoringParams::restoration_defaults();
        // ~5 m away from the prior submission.
        let history = vec![record(12.00004, 77.0, 9_000)];
        let assessment =
            evaluate_fraud(&bundle(12.0, 77.0, 5.0), &history, &params, Timestamp::new(10_000));
        assert_eq!(assessment.risk_score, 30);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert!(assessment.requires_review);
    }

    #[test]
    fn nearby_but_outside_radius_is_clean() {
        let params = ScoringParams::restoration_defaults();
        // ~110 m away.
        let history = vec![record(12.001, 77.0, 9_000)];
        let assessment =
            evaluate_fraud(&bundle(12.0, 77.0, 5.0), &history, &params, Timestamp::new(10_000));
        assert_eq!(assessment.risk_score, 0);
    }

    #[test]
    fn high_frequency_adds_risk() {
        let params = ScoringParams::restoration_defaults();
        // Six prior submissions inside the last 24 h, all far away.
        let history: Vec<_> = (0..6).map(|i| record(13.0 + i as f64 * 0.01, 78.0, 9_000)).collect();
        let assessment =
            evaluate_fraud(&bundle(12.0, 77.0, 5.0), &history, &params, Timestamp::new(10_000));
        assert_eq!(assessment.risk_score, 25);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn old_submissions_do_not_count_toward_frequency() {
        let params = ScoringParams::restoration_defaults();
        let old = 10_000 - params.frequency_window_secs - 1;
        let history: Vec<_> = (0..6).map(|i| record(13.0 + i as f64 * 0.01, 78.0, old)).collect();
        let assessment =
            evaluate_fraud(&bundle(12.0, 77.0, 5.0), &history, &params, Timestamp::new(10_000));
        assert_eq!(assessment.risk_score, 0);
    }

    #[test]
    fn poor_accuracy_adds_risk() {
        let params = ScoringParams::restoration_defaults();
        let assessment =
            evaluate_fraud(&bundle(12.0, 77.0, 80.0), &[], &params, Timestamp::new(10_000));
        assert_eq!(assessment.risk_score, 15);
    }

    #[test]
    fn missing_metadata_scores_per_image() {
        let params = ScoringParams::restoration_defaults();
        let mut b = bundle(12.0, 77.0, 5.0);
        b.images = vec![image(None), image(None), image(Some(Timestamp::new(10_000)))];
        let assessment = evaluate_fraud(&b, &[], &params, Timestamp::new(10_000));
        assert_eq!(assessment.risk_score, 20);
        assert_eq!(assessment.indicators.len(), 2);
    }

    #[test]
    fn stacked_indicators_reach_high_and_require_review() {
        let params = ScoringParams::restoration_defaults();
        let mut b = bundle(12.0, 77.0, 80.0);
        b.images = vec![image(None)];
        let history = vec![record(12.00001, 77.0, 9_500)];
        let assessment = evaluate_fraud(&b, &history, &params, Timestamp::new(10_000));
        // duplicate 30 + accuracy 15 + metadata 10 = 55
        assert_eq!(assessment.risk_score, 55);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert!(assessment.requires_review);
    }
}
