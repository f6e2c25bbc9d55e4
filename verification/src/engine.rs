//! Consensus scoring and recommendation banding.

use crate::result::{ConsensusBreakdown, Recommendation, VerificationResult};
use tidemark_evidence::{
    assess_images, check_gps_accuracy, check_satellite, evaluate_fraud, EvidenceBundle,
    SubmissionRecord,
};
use tidemark_types::{ScoringParams, Timestamp};

/// Pure verification engine.
///
/// Holds the scoring parameters and nothing else; every evaluation is a
/// function of `(evidence, history, now)`, so identical inputs yield
/// identical results.
#[derive(Clone, Debug)]
pub struct VerificationEngine {
    params: ScoringParams,
}

impl VerificationEngine {
    pub fn new(params: ScoringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Run the full evaluation: fraud heuristic, cross-source consensus,
    /// final score, recommendation.
    pub fn evaluate(
        &self,
        bundle: &EvidenceBundle,
        history: &[SubmissionRecord],
        now: Timestamp,
    ) -> VerificationResult {
        let params = &self.params;

        let fraud = evaluate_fraud(bundle, history, params, now);

        let image = assess_images(&bundle.images, params);
        let satellite = check_satellite(bundle.satellite.as_ref(), params);
        let gps = check_gps_accuracy(bundle.location.as_ref(), params);
        let freshness = bundle
            .claimed_capture_time
            .map(|claimed| claimed.abs_diff(now) <= params.freshness_window_secs);

        let breakdown = ConsensusBreakdown {
            image_verified: image.as_ref().map(|a| a.verified),
            satellite_verified: satellite.as_ref().map(|c| c.verified),
            gps_verified: gps.as_ref().map(|c| c.within_accuracy),
            freshness_verified: freshness,
        };

        let consensus_score = Self::consensus_score(&breakdown, params);

        let mut anomalies = Vec::new();
        if let Some(assessment) = &image {
            anomalies.extend(assessment.anomalies.iter().cloned());
        }
        anomalies.extend(fraud.indicators.iter().cloned());

        // Weighted blend of consensus minus fraud, rescaled by the consensus
        // weight so a perfect fraud-free submission scores 100 and the
        // recommendation bands keep their meaning on the 0-100 scale.
        let final_score = ((consensus_score * params.consensus_weight
            - f64::from(fraud.risk_score) * params.fraud_weight)
            / params.consensus_weight)
            .max(0.0);

        let recommendation = Self::recommend(final_score, params);

        VerificationResult {
            consensus_score,
            fraud_risk: fraud.risk_score,
            risk_level: fraud.risk_level,
            anomalies,
            final_score,
            recommendation,
            requires_review: fraud.requires_review,
            breakdown,
        }
    }

    /// Weighted consensus over the checks whose data source is present.
    ///
    /// The earned weight is divided by the weight actually available, so a
    /// missing source narrows the evidence base instead of dragging the
    /// score toward zero.
    fn consensus_score(breakdown: &ConsensusBreakdown, params: &ScoringParams) -> f64 {
        let checks = [
            (breakdown.image_verified, params.image_weight),
            (breakdown.satellite_verified, params.satellite_weight),
            (breakdown.gps_verified, params.gps_weight),
            (breakdown.freshness_verified, params.freshness_weight),
        ];

        let mut earned = 0.0;
        let mut available = 0.0;
        for (outcome, weight) in checks {
            if let Some(passed) = outcome {
                available += weight;
                if passed {
                    earned += weight;
                }
            }
        }

        if available == 0.0 {
            0.0
        } else {
            earned / available * 100.0
        }
    }

    fn recommend(final_score: f64, params: &ScoringParams) -> Recommendation {
        if final_score >= params.approve_threshold {
            Recommendation::Approve
        } else if final_score >= params.community_review_threshold {
            Recommendation::CommunityReview
        } else if final_score >= params.manual_review_threshold {
            Recommendation::ManualReview
        } else {
            Recommendation::Reject
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_evidence::{FieldImage, ImageFeatures, ImageMetadata, SatelliteObservation};
    use tidemark_types::{GeoPoint, GpsFix, SubmitterId};

    fn engine() -> VerificationEngine {
        VerificationEngine::new(ScoringParams::restoration_defaults())
    }

    fn now() -> Timestamp {
        Timestamp::new(100_000)
    }

    fn full_bundle() -> EvidenceBundle {
        let point = GeoPoint::new(12.97, 77.59).unwrap();
        EvidenceBundle {
            submitter: SubmitterId::new("agent-1"),
            location: Some(GpsFix::new(point, 5.0, now())),
            claimed_capture_time: Some(now()),
            images: vec![FieldImage {
                content_id: None,
                metadata: ImageMetadata {
                    gps: Some(GpsFix::new(point, 5.0, now())),
                    capture_time: Some(now()),
                },
                features: ImageFeatures {
                    vegetation_detected: true,
                    health_score: 0.85,
                    species_confidence: 0.9,
                    quality: 0.9,
                },
            }],
            satellite: Some(SatelliteObservation {
                location: point,
                ndvi: 0.72,
                cloud_cover: 0.1,
                land_cover: "mangrove".to_string(),
                source: "Sentinel-2".to_string(),
                captured_at: now(),
            }),
        }
    }

    #[test]
    fn happy_path_approves_with_full_consensus() {
        let result = engine().evaluate(&full_bundle(), &[], now());
        assert_eq!(result.consensus_score, 100.0);
        assert_eq!(result.fraud_risk, 0);
        assert!((result.final_score - 100.0).abs() < 1e-9);
        assert_eq!(result.recommendation, Recommendation::Approve);
        assert_eq!(result.breakdown.available_checks(), 4);
    }

    #[test]
    fn missing_satellite_narrows_the_evidence_base() {
        let mut bundle = full_bundle();
        bundle.satellite = None;
        let result = engine().evaluate(&bundle, &[], now());
        assert_eq!(result.breakdown.available_checks(), 3);
        assert!(result.breakdown.satellite_verified.is_none());
        // Remaining three checks all pass, so consensus stays at 100.
        assert_eq!(result.consensus_score, 100.0);
    }

    #[test]
    fn failed_satellite_lowers_consensus_proportionally() {
        let mut bundle = full_bundle();
        bundle.satellite.as_mut().unwrap().ndvi = 0.1;
        let result = engine().evaluate(&bundle, &[], now());
        // 0.7 of 1.0 weight earned.
        assert!((result.consensus_score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn no_evidence_scores_zero_and_rejects() {
        let bundle = EvidenceBundle {
            submitter: SubmitterId::new("agent-1"),
            location: None,
            claimed_capture_time: None,
            images: Vec::new(),
            satellite: None,
        };
        let result = engine().evaluate(&bundle, &[], now());
        assert_eq!(result.consensus_score, 0.0);
        assert_eq!(result.breakdown.available_checks(), 0);
        assert_eq!(result.recommendation, Recommendation::Reject);
    }

    #[test]
    fn stale_evidence_fails_the_freshness_check() {
        let mut bundle = full_bundle();
        bundle.claimed_capture_time = Some(Timestamp::new(1_000)); // ~27 h before `now`
        let result = engine().evaluate(&bundle, &[], now());
        assert_eq!(result.breakdown.freshness_verified, Some(false));
        assert!((result.consensus_score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn fraud_risk_drags_the_final_score_down() {
        let bundle = full_bundle();
        let dup = SubmissionRecord {
            submitter: SubmitterId::new("agent-1"),
            point: bundle.location.unwrap().point,
            submitted_at: Timestamp::new(99_000),
        };
        let result = engine().evaluate(&bundle, &[dup], now());
        assert_eq!(result.fraud_risk, 30);
        // (100 * 0.7 - 30 * 0.3) / 0.7
        let expected = (100.0 * 0.7 - 30.0 * 0.3) / 0.7;
        assert!((result.final_score - expected).abs() < 1e-9);
        assert!(result.final_score < 100.0);
    }

    #[test]
    fn final_score_floors_at_zero() {
        let bundle = EvidenceBundle {
            submitter: SubmitterId::new("agent-1"),
            location: Some(GpsFix::new(
                GeoPoint::new(12.0, 77.0).unwrap(),
                200.0,
                now(),
            )),
            claimed_capture_time: None,
            images: Vec::new(),
            satellite: None,
        };
        let history: Vec<SubmissionRecord> = (0..8)
            .map(|i| SubmissionRecord {
                submitter: SubmitterId::new("agent-1"),
                point: GeoPoint::new(12.0, 77.0).unwrap(),
                submitted_at: Timestamp::new(99_000 - i),
            })
            .collect();
        let result = engine().evaluate(&bundle, &history, now());
        assert_eq!(result.final_score, 0.0);
        assert_eq!(result.recommendation, Recommendation::Reject);
    }

    #[test]
    fn anomalies_preserve_evaluation_order() {
        let mut bundle = full_bundle();
        bundle.images[0].features.quality = 0.2;
        bundle.images[0].metadata.capture_time = None;
        let result = engine().evaluate(&bundle, &[], now());
        // Image anomalies first, fraud indicators after.
        assert!(result.anomalies[0].contains("quality"));
        assert!(result.anomalies[1].contains("capture-time"));
    }

    #[test]
    fn identical_inputs_produce_identical_results() {
        let bundle = full_bundle();
        let history = vec![SubmissionRecord {
            submitter: SubmitterId::new("agent-1"),
            point: GeoPoint::new(12.97001, 77.59).unwrap(),
            submitted_at: Timestamp::new(98_000),
        }];
        let a = engine().evaluate(&bundle, &history, now());
        let b = engine().evaluate(&bundle, &history, now());
        assert_eq!(a, b);
    }
}
