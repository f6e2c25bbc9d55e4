//! Payment split for marketplace sale proceeds.

use serde::{Deserialize, Serialize};
use tidemark_types::OrchestratorParams;

/// Sale proceeds divided among stakeholders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentSplit {
    /// Majority share for the project operator / community.
    pub operator: f64,
    /// Share for the verifier.
    pub verifier: f64,
    /// Share retained by the platform.
    pub platform: f64,
}

impl PaymentSplit {
    pub fn total(&self) -> f64 {
        self.operator + self.verifier + self.platform
    }
}

/// Split a sale total by the configured basis-point shares.
///
/// The operator receives the residual after the verifier and platform
/// shares are taken, so the three parts always sum exactly to the total.
pub fn compute_split(total_paid: f64, params: &OrchestratorParams) -> PaymentSplit {
    let verifier = total_paid * f64::from(params.verifier_share_bps) / 10_000.0;
    let platform = total_paid * f64::from(params.platform_share_bps) / 10_000.0;
    let operator = total_paid - verifier - platform;
    PaymentSplit {
        operator,
        verifier,
        platform,
    }
}
