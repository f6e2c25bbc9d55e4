//! Notification bus: typed events emitted toward the dashboards.
//!
//! Delivery is at-least-once; consumers must be idempotent on the
//! project id plus event kind.

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tidemark_types::{BatchId, ProjectId, Timestamp, TxId};

/// Which dashboard or downstream consumer an event targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Admin dashboard: reviews, escalations.
    Admin,
    /// The originating client's dashboard.
    Client,
    /// The public marketplace feed.
    Marketplace,
}

/// A typed event published by the orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    ProjectUploaded {
        project_id: ProjectId,
        name: String,
        registration_tx: TxId,
    },
    AdminReviewed {
        project_id: ProjectId,
        approved: bool,
        reviewer: String,
    },
    MrvCollected {
        project_id: ProjectId,
        evidence_count: usize,
    },
    VerificationComplete {
        project_id: ProjectId,
        recommendation: String,
        final_score: f64,
        requires_review: bool,
    },
    ReviewRequired {
        project_id: ProjectId,
        recommendation: String,
        voting_closes_at: Option<Timestamp>,
    },
    CreditsTokenized {
        project_id: ProjectId,
        credit_amount: f64,
        batch_id: BatchId,
    },
    MarketplaceListed {
        project_id: ProjectId,
        credit_amount: f64,
        price_per_credit: f64,
        certification: String,
    },
    CreditsPurchased {
        project_id: ProjectId,
        buyer: String,
        quantity: f64,
        total_paid: f64,
    },
    PaymentsDistributed {
        project_id: ProjectId,
        operator_amount: f64,
        verifier_amount: f64,
        platform_amount: f64,
    },
    ReportingUpdated {
        project_id: ProjectId,
        co2_sequestered_t: f64,
    },
    /// A stage exhausted its retries or was rejected outright; an
    /// administrator must intervene.
    StepFailed {
        project_id: ProjectId,
        stage: String,
        attempts: u32,
        message: String,
    },
}

impl NotificationEvent {
    pub fn project_id(&self) -> &ProjectId {
        match self {
            NotificationEvent::ProjectUploaded { project_id, .. }
            | NotificationEvent::AdminReviewed { project_id, .. }
            | NotificationEvent::MrvCollected { project_id, .. }
            | NotificationEvent::VerificationComplete { project_id, .. }
            | NotificationEvent::ReviewRequired { project_id, .. }
            | NotificationEvent::CreditsTokenized { project_id, .. }
            | NotificationEvent::MarketplaceListed { project_id, .. }
            | NotificationEvent::CreditsPurchased { project_id, .. }
            | NotificationEvent::PaymentsDistributed { project_id, .. }
            | NotificationEvent::ReportingUpdated { project_id, .. }
            | NotificationEvent::StepFailed { project_id, .. } => project_id,
        }
    }

    /// Stable event-kind name; consumers deduplicate on this plus the
    /// project id.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::ProjectUploaded { .. } => "project_uploaded",
            NotificationEvent::AdminReviewed { .. } => "admin_reviewed",
            NotificationEvent::MrvCollected { .. } => "mrv_collected",
            NotificationEvent::VerificationComplete { .. } => "verification_complete",
            NotificationEvent::ReviewRequired { .. } => "review_required",
            NotificationEvent::CreditsTokenized { .. } => "credits_tokenized",
            NotificationEvent::MarketplaceListed { .. } => "marketplace_listed",
            NotificationEvent::CreditsPurchased { .. } => "credits_purchased",
            NotificationEvent::PaymentsDistributed { .. } => "payments_distributed",
            NotificationEvent::ReportingUpdated { .. } => "reporting_updated",
            NotificationEvent::StepFailed { .. } => "step_failed",
        }
    }

    /// The channel this event is delivered on.
    pub fn channel(&self) -> Channel {
        match self {
            NotificationEvent::ProjectUploaded { .. }
            | NotificationEvent::ReviewRequired { .. }
            | NotificationEvent::StepFailed { .. } => Channel::Admin,
            NotificationEvent::MarketplaceListed { .. }
            | NotificationEvent::CreditsPurchased { .. } => Channel::Marketplace,
            _ => Channel::Client,
        }
    }

    /// Human-readable summary included alongside the typed fields.
    pub fn message(&self) -> String {
        match self {
            NotificationEvent::ProjectUploaded { name, .. } => {
                format!("project '{name}' uploaded and pending review")
            }
            NotificationEvent::AdminReviewed { approved, .. } => {
                if *approved {
                    "project approved; ready for MRV collection".to_string()
                } else {
                    "project rejected by admin review".to_string()
                }
            }
            NotificationEvent::MrvCollected { evidence_count, .. } => {
                format!("{evidence_count} evidence items collected")
            }
            NotificationEvent::VerificationComplete {
                recommendation,
                final_score,
                ..
            } => format!("verification scored {final_score:.1}: {recommendation}"),
            NotificationEvent::ReviewRequired { recommendation, .. } => {
                format!("verification suspended pending {recommendation}")
            }
            NotificationEvent::CreditsTokenized { credit_amount, .. } => {
                format!("{credit_amount:.2} credits tokenized")
            }
            NotificationEvent::MarketplaceListed {
                credit_amount,
                price_per_credit,
                ..
            } => format!("{credit_amount:.2} credits listed at {price_per_credit:.2} each"),
            NotificationEvent::CreditsPurchased {
                buyer, quantity, ..
            } => format!("{quantity:.2} credits purchased by {buyer}"),
            NotificationEvent::PaymentsDistributed {
                operator_amount, ..
            } => format!("payments distributed; operator received {operator_amount:.2}"),
            NotificationEvent::ReportingUpdated {
                co2_sequestered_t, ..
            } => format!("impact report finalized: {co2_sequestered_t:.2} tCO2e sequestered"),
            NotificationEvent::StepFailed {
                stage, attempts, ..
            } => format!("stage {stage} failed permanently after {attempts} attempts"),
        }
    }
}

#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Publish an event. At-least-once delivery; the orchestrator treats
    /// publish failures as non-fatal and logs them.
    async fn publish(&self, event: NotificationEvent) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalations_go_to_the_admin_channel() {
        let event = NotificationEvent::StepFailed {
            project_id: ProjectId::new("p1"),
            stage: "tokenization".to_string(),
            attempts: 5,
            message: "mint timed out".to_string(),
        };
        assert_eq!(event.channel(), Channel::Admin);
        assert_eq!(event.kind(), "step_failed");
    }

    #[test]
    fn listings_go_to_the_marketplace_channel() {
        let event = NotificationEvent::MarketplaceListed {
            project_id: ProjectId::new("p1"),
            credit_amount: 15.0,
            price_per_credit: 15.0,
            certification: "Gold Standard".to_string(),
        };
        assert_eq!(event.channel(), Channel::Marketplace);
    }

    #[test]
    fn kinds_are_unique() {
        let project_id = ProjectId::new("p");
        let events = [
            NotificationEvent::ProjectUploaded {
                project_id: project_id.clone(),
                name: String::new(),
                registration_tx: TxId::new("t"),
            },
            NotificationEvent::MrvCollected {
                project_id: project_id.clone(),
                evidence_count: 0,
            },
            NotificationEvent::ReportingUpdated {
                project_id,
                co2_sequestered_t: 0.0,
            },
        ];
        let mut kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), events.len());
    }
}
