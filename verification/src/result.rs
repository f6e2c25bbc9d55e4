//! Verification result types.

use serde::{Deserialize, Serialize};
use tidemark_evidence::RiskLevel;

/// The engine's recommendation for a verified submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    /// Evidence is strong; advance to tokenization.
    Approve,
    /// Borderline; open a community voting window.
    CommunityReview,
    /// Weak or suspicious; route to a human reviewer.
    ManualReview,
    /// Evidence fails; terminate the instance.
    Reject,
}

impl Recommendation {
    /// Whether this recommendation suspends the workflow pending an
    /// externally supplied override decision.
    pub fn suspends(&self) -> bool {
        matches!(
            self,
            Recommendation::CommunityReview | Recommendation::ManualReview
        )
    }
}

/// Per-check outcome of the cross-source consensus. `None` means the data
/// source was absent and the check did not participate in the score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusBreakdown {
    pub image_verified: Option<bool>,
    pub satellite_verified: Option<bool>,
    pub gps_verified: Option<bool>,
    pub freshness_verified: Option<bool>,
}

impl ConsensusBreakdown {
    /// Number of checks whose data source was present.
    pub fn available_checks(&self) -> usize {
        [
            self.image_verified,
            self.satellite_verified,
            self.gps_verified,
            self.freshness_verified,
        ]
        .iter()
        .filter(|c| c.is_some())
        .count()
    }
}

/// The complete, immutable outcome of one verification attempt.
///
/// Computed fresh on every attempt; once attached to a step record it is
/// never rewritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Cross-source agreement in [0, 100].
    pub consensus_score: f64,
    /// Additive fraud risk; 0 upward, unbounded.
    pub fraud_risk: u32,
    pub risk_level: RiskLevel,
    /// Anomalies and fraud indicators in evaluation order.
    pub anomalies: Vec<String>,
    /// `consensus * w_c - fraud * w_f`, floored at zero.
    pub final_score: f64,
    pub recommendation: Recommendation,
    pub requires_review: bool,
    pub breakdown: ConsensusBreakdown,
}
