//! Typed stage commands.
//!
//! Every public operation arrives as a discrete command, whether from an
//! external actor or emitted internally by a prior stage's completion.
//! Internal emission always goes through the node's mpsc channel and is
//! consumed by the dedicated handler task, never invoked as a synchronous
//! callback from inside another handler's critical section.

use serde::{Deserialize, Serialize};
use tidemark_evidence::EvidenceBundle;
use tidemark_types::ProjectId;
use tidemark_workflow::{ImpactMetrics, PaymentSplit, ProjectData, PurchaseRecord, Stage};

/// One inbound command per public operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum StageCommand {
    Upload {
        project_id: ProjectId,
        data: ProjectData,
    },
    AdminReview {
        project_id: ProjectId,
        approve: bool,
        comments: String,
        reviewer_id: String,
    },
    MrvCollection {
        project_id: ProjectId,
        evidence: EvidenceBundle,
    },
    Verification {
        project_id: ProjectId,
        evidence: EvidenceBundle,
    },
    Tokenization {
        project_id: ProjectId,
        credit_amount: f64,
    },
    Purchase {
        project_id: ProjectId,
        purchase: PurchaseRecord,
    },
    PaymentDistribution {
        project_id: ProjectId,
        /// Explicit distribution override; computed from the recorded
        /// purchase when absent.
        distributions: Option<PaymentSplit>,
    },
    Reporting {
        project_id: ProjectId,
        metrics: ImpactMetrics,
    },
    /// Externally supplied decision resuming a suspended verification.
    ReviewOverride {
        project_id: ProjectId,
        approve: bool,
        reviewer_id: String,
    },
    /// Administrative cancel of an in-flight workflow.
    Cancel {
        project_id: ProjectId,
        reason: String,
    },
    /// Manual retry of a permanently failed step.
    Retry {
        project_id: ProjectId,
    },
}

impl StageCommand {
    pub fn project_id(&self) -> &ProjectId {
        match self {
            StageCommand::Upload { project_id, .. }
            | StageCommand::AdminReview { project_id, .. }
            | StageCommand::MrvCollection { project_id, .. }
            | StageCommand::Verification { project_id, .. }
            | StageCommand::Tokenization { project_id, .. }
            | StageCommand::Purchase { project_id, .. }
            | StageCommand::PaymentDistribution { project_id, .. }
            | StageCommand::Reporting { project_id, .. }
            | StageCommand::ReviewOverride { project_id, .. }
            | StageCommand::Cancel { project_id, .. }
            | StageCommand::Retry { project_id } => project_id,
        }
    }

    /// The stage this command drives, for ordinary stage events.
    /// Administrative commands return `None`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            StageCommand::Upload { .. } => Some(Stage::Upload),
            StageCommand::AdminReview { .. } => Some(Stage::AdminReview),
            StageCommand::MrvCollection { .. } => Some(Stage::MrvCollection),
            StageCommand::Verification { .. } => Some(Stage::Verification),
            StageCommand::Tokenization { .. } => Some(Stage::Tokenization),
            StageCommand::Purchase { .. } => Some(Stage::Purchase),
            StageCommand::PaymentDistribution { .. } => Some(Stage::PaymentDistribution),
            StageCommand::Reporting { .. } => Some(Stage::Reporting),
            StageCommand::ReviewOverride { .. }
            | StageCommand::Cancel { .. }
            | StageCommand::Retry { .. } => None,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            StageCommand::Upload { .. } => "upload",
            StageCommand::AdminReview { .. } => "admin_review",
            StageCommand::MrvCollection { .. } => "mrv_collection",
            StageCommand::Verification { .. } => "verification",
            StageCommand::Tokenization { .. } => "tokenization",
            StageCommand::Purchase { .. } => "purchase",
            StageCommand::PaymentDistribution { .. } => "payment_distribution",
            StageCommand::Reporting { .. } => "reporting",
            StageCommand::ReviewOverride { .. } => "review_override",
            StageCommand::Cancel { .. } => "cancel",
            StageCommand::Retry { .. } => "retry",
        }
    }
}
