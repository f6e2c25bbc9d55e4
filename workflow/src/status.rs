//! Workflow status: the single source of truth for which stage is active.

use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tidemark_verification::Recommendation;

/// Status of a workflow instance.
///
/// Transient statuses expect exactly one subsequent event; terminal
/// statuses forbid any further mutation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Project registered and stored; awaiting admin review.
    Uploaded,
    /// Admin approved; awaiting MRV field data.
    AdminApproved,
    /// Admin rejected. Terminal.
    Rejected,
    /// MRV evidence collected; awaiting verification.
    MrvCollected,
    /// Verification suspended pending an external override decision.
    AwaitingReview {
        recommendation: Recommendation,
    },
    /// Verification passed; awaiting tokenization.
    Verified,
    /// Verification rejected. Terminal.
    VerificationFailed,
    /// Credits minted and listed; awaiting purchase.
    Tokenized,
    /// Credits sold; awaiting payment distribution.
    Purchased,
    /// Stakeholders paid; awaiting the final impact report.
    PaymentsDistributed,
    /// Impact reporting finalized. Terminal.
    Completed,
    /// Administratively cancelled. Terminal.
    Cancelled,
}

impl WorkflowStatus {
    /// Whether any further stage transition is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Rejected
                | WorkflowStatus::VerificationFailed
                | WorkflowStatus::Completed
                | WorkflowStatus::Cancelled
        )
    }

    /// The stage whose event this status is waiting for, if any.
    ///
    /// `AwaitingReview` returns `None`: it advances only through the
    /// review-override command, never through an ordinary stage event.
    pub fn expected_stage(&self) -> Option<Stage> {
        match self {
            WorkflowStatus::Uploaded => Some(Stage::AdminReview),
            WorkflowStatus::AdminApproved => Some(Stage::MrvCollection),
            WorkflowStatus::MrvCollected => Some(Stage::Verification),
            WorkflowStatus::Verified => Some(Stage::Tokenization),
            WorkflowStatus::Tokenized => Some(Stage::Purchase),
            WorkflowStatus::Purchased => Some(Stage::PaymentDistribution),
            WorkflowStatus::PaymentsDistributed => Some(Stage::Reporting),
            WorkflowStatus::AwaitingReview { .. } => None,
            _ => None,
        }
    }

    /// Whether a stage event for `stage` is valid from this status.
    pub fn permits(&self, stage: Stage) -> bool {
        self.expected_stage() == Some(stage)
    }

    /// Whether an administrative cancel may interrupt this status.
    /// Terminal states cannot be cancelled; everything else can.
    pub fn is_cancellable(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Uploaded => "uploaded",
            WorkflowStatus::AdminApproved => "admin_approved",
            WorkflowStatus::Rejected => "rejected",
            WorkflowStatus::MrvCollected => "mrv_collected",
            WorkflowStatus::AwaitingReview { .. } => "awaiting_review",
            WorkflowStatus::Verified => "verified",
            WorkflowStatus::VerificationFailed => "verification_failed",
            WorkflowStatus::Tokenized => "tokenized",
            WorkflowStatus::Purchased => "purchased",
            WorkflowStatus::PaymentsDistributed => "payments_distributed",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_transient_status_expects_exactly_one_stage() {
        let transient = [
            WorkflowStatus::Uploaded,
            WorkflowStatus::AdminApproved,
            WorkflowStatus::MrvCollected,
            WorkflowStatus::Verified,
            WorkflowStatus::Tokenized,
            WorkflowStatus::Purchased,
            WorkflowStatus::PaymentsDistributed,
        ];
        for status in transient {
            assert!(!status.is_terminal());
            assert!(status.expected_stage().is_some(), "{status} expects a stage");
        }
    }

    #[test]
    fn terminal_statuses_permit_nothing() {
        for status in [
            WorkflowStatus::Rejected,
            WorkflowStatus::VerificationFailed,
            WorkflowStatus::Completed,
            WorkflowStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            for stage in Stage::ALL {
                assert!(!status.permits(stage));
            }
        }
    }

    #[test]
    fn awaiting_review_blocks_ordinary_stage_events() {
        let status = WorkflowStatus::AwaitingReview {
            recommendation: Recommendation::ManualReview,
        };
        assert!(!status.is_terminal());
        for stage in Stage::ALL {
            assert!(!status.permits(stage));
        }
    }

    #[test]
    fn cancellable_tracks_terminality() {
        assert!(WorkflowStatus::Verified.is_cancellable());
        assert!(!WorkflowStatus::Completed.is_cancellable());
    }
}
