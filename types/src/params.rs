//! Tunable parameters for scoring and orchestration.
//!
//! The scoring weights, fraud points, and recommendation bands were carried
//! over from the pilot deployment and have not been empirically calibrated;
//! they are parameters rather than literals so a domain expert can revise
//! them without touching the engines.

use serde::{Deserialize, Serialize};

/// Parameters of the verification-scoring engine.
///
/// All weights and thresholds consumed by the evidence analyzers and the
/// consensus combination live here. Handlers thread one immutable copy
/// through every evaluation, so two evaluations with the same parameters
/// and inputs produce identical results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringParams {
    // ── Fraud heuristic ─────────────────────────────────────────────────
    /// Radius (meters) within which a prior submission's GPS position
    /// counts as a duplicate.
    pub duplicate_gps_radius_m: f64,

    /// Risk points added for a duplicate GPS position.
    pub duplicate_gps_points: u32,

    /// Window (seconds) for the submission-frequency check.
    pub frequency_window_secs: u64,

    /// Submissions inside the window above which frequency risk applies.
    pub frequency_max_submissions: usize,

    /// Risk points added for excessive submission frequency.
    pub frequency_points: u32,

    /// Reported GPS accuracy (meters) above which accuracy risk applies.
    pub poor_accuracy_threshold_m: f64,

    /// Risk points added for poor GPS accuracy.
    pub poor_accuracy_points: u32,

    /// Risk points added per evidence image missing capture-time metadata.
    pub missing_metadata_points: u32,

    /// Risk at or above which the level is HIGH.
    pub risk_high_threshold: u32,

    /// Risk at or above which the level is MEDIUM.
    pub risk_medium_threshold: u32,

    /// Risk at or above which human review is required.
    pub review_risk_threshold: u32,

    // ── Cross-source consensus ──────────────────────────────────────────
    /// Weight of the image-analysis check.
    pub image_weight: f64,

    /// Weight of the satellite-consistency check.
    pub satellite_weight: f64,

    /// Weight of the GPS-accuracy check.
    pub gps_weight: f64,

    /// Weight of the evidence-freshness check.
    pub freshness_weight: f64,

    /// Minimum image quality for the image check to pass.
    pub image_quality_threshold: f64,

    /// Vegetation health score below which an image is flagged anomalous.
    pub vegetation_health_threshold: f64,

    /// Minimum NDVI for a satellite read to count as healthy vegetation.
    pub ndvi_healthy_threshold: f64,

    /// Maximum cloud-cover fraction for a usable satellite read.
    pub cloud_cover_max: f64,

    /// Maximum GPS accuracy (meters) for the GPS check to pass.
    pub gps_accuracy_max_m: f64,

    /// Maximum age (seconds) of evidence relative to its claimed capture
    /// time for the freshness check to pass.
    pub freshness_window_secs: u64,

    // ── Final score and recommendation bands ────────────────────────────
    /// Weight of the consensus score in the final score.
    pub consensus_weight: f64,

    /// Weight of the fraud risk subtracted from the final score.
    pub fraud_weight: f64,

    /// Final score at or above which the recommendation is APPROVE.
    pub approve_threshold: f64,

    /// Final score at or above which the recommendation is COMMUNITY_REVIEW.
    pub community_review_threshold: f64,

    /// Final score at or above which the recommendation is MANUAL_REVIEW.
    pub manual_review_threshold: f64,

    /// Duration (seconds) of the community voting window opened for a
    /// COMMUNITY_REVIEW recommendation.
    pub voting_window_secs: u64,
}

impl ScoringParams {
    /// Defaults carried over from the pilot deployment.
    pub fn restoration_defaults() -> Self {
        Self {
            duplicate_gps_radius_m: 10.0,
            duplicate_gps_points: 30,
            frequency_window_secs: 24 * 3600,
            frequency_max_submissions: 5,
            frequency_points: 25,
            poor_accuracy_threshold_m: 50.0,
            poor_accuracy_points: 15,
            missing_metadata_points: 10,
            risk_high_threshold: 50,
            risk_medium_threshold: 25,
            review_risk_threshold: 30,

            image_weight: 0.4,
            satellite_weight: 0.3,
            gps_weight: 0.2,
            freshness_weight: 0.1,
            image_quality_threshold: 0.7,
            vegetation_health_threshold: 0.4,
            ndvi_healthy_threshold: 0.4,
            cloud_cover_max: 0.5,
            gps_accuracy_max_m: 10.0,
            freshness_window_secs: 24 * 3600,

            consensus_weight: 0.7,
            fraud_weight: 0.3,
            approve_threshold: 80.0,
            community_review_threshold: 60.0,
            manual_review_threshold: 40.0,
            voting_window_secs: 7 * 24 * 3600,
        }
    }
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self::restoration_defaults()
    }
}

/// Parameters of the workflow orchestrator: collaborator timeouts, the
/// retry policy, payment splits, and marketplace listing attributes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorParams {
    /// Upper bound (seconds) on a ledger call, including confirmation.
    pub ledger_timeout_secs: u64,

    /// Upper bound (seconds) on a content-store put or pin.
    pub content_timeout_secs: u64,

    /// Upper bound (seconds) on a persistence-store call.
    pub store_timeout_secs: u64,

    /// Initial retry delay (milliseconds) after a transient failure.
    pub retry_base_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub retry_factor: u32,

    /// Total attempts before a transient failure is escalated to permanent.
    pub retry_max_attempts: u32,

    /// Sale proceeds share paid to the project operator (basis points).
    pub operator_share_bps: u32,

    /// Sale proceeds share paid to the verifier (basis points).
    pub verifier_share_bps: u32,

    /// Sale proceeds share retained by the platform (basis points).
    pub platform_share_bps: u32,

    /// Listing price per credit when tokenized credits enter the market.
    pub marketplace_price_per_credit: f64,

    /// Certification label attached to marketplace listings.
    pub marketplace_certification: String,

    /// Payment-rails account receiving the verifier share.
    pub verifier_account: String,

    /// Payment-rails account receiving the platform share.
    pub platform_account: String,
}

impl OrchestratorParams {
    pub fn restoration_defaults() -> Self {
        Self {
            ledger_timeout_secs: 30,
            content_timeout_secs: 10,
            store_timeout_secs: 10,
            retry_base_delay_ms: 1_000,
            retry_factor: 2,
            retry_max_attempts: 5,
            operator_share_bps: 7_000,
            verifier_share_bps: 2_000,
            platform_share_bps: 1_000,
            marketplace_price_per_credit: 15.0,
            marketplace_certification: "Gold Standard".to_string(),
            verifier_account: "tidemark-verifier".to_string(),
            platform_account: "tidemark-platform".to_string(),
        }
    }
}

impl Default for OrchestratorParams {
    fn default() -> Self {
        Self::restoration_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_bands_are_ordered() {
        let p = ScoringParams::restoration_defaults();
        assert!(p.approve_threshold > p.community_review_threshold);
        assert!(p.community_review_threshold > p.manual_review_threshold);
    }

    #[test]
    fn consensus_weights_sum_to_one() {
        let p = ScoringParams::restoration_defaults();
        let sum = p.image_weight + p.satellite_weight + p.gps_weight + p.freshness_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn payment_shares_sum_to_whole() {
        let p = OrchestratorParams::restoration_defaults();
        assert_eq!(
            p.operator_share_bps + p.verifier_share_bps + p.platform_share_bps,
            10_000
        );
    }
}
