//! Workflow instances and their append-only step records.

use crate::error::WorkflowError;
use crate::payload::{ImpactMetrics, ProjectPayload, PurchaseRecord};
use crate::payment::PaymentSplit;
use crate::stage::Stage;
use crate::status::WorkflowStatus;
use serde::{Deserialize, Serialize};
use tidemark_types::{BatchId, ContentId, ProjectId, RegistryProjectId, Timestamp, TxId};
use tidemark_verification::{Recommendation, VerificationResult};

/// Whether a step failure may be retried automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Timeout or connection failure; retried with backoff.
    Transient,
    /// Rejected by the collaborator; held for manual intervention.
    Permanent,
}

/// The last failure recorded on a step, kept with enough detail to
/// reconstruct what happened without replaying the call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
    pub failed_at: Timestamp,
}

/// Stage-specific outcome attached to a completed step record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StageResult {
    Upload {
        media_refs: Vec<ContentId>,
        /// The pinned project manifest the registry record points at.
        manifest_ref: ContentId,
        registration_tx: TxId,
        registry_id: RegistryProjectId,
    },
    AdminReview {
        approved: bool,
        reviewer: String,
        comments: String,
        status_tx: TxId,
    },
    MrvCollection {
        evidence_refs: Vec<ContentId>,
    },
    Verification {
        result: VerificationResult,
        /// Credits earned; present only when the recommendation approved.
        credit_amount: Option<f64>,
    },
    Tokenization {
        mint_tx: TxId,
        batch_id: BatchId,
        credit_amount: f64,
    },
    Purchase {
        purchase: PurchaseRecord,
        split: PaymentSplit,
    },
    PaymentDistribution {
        payout_refs: Vec<String>,
    },
    Reporting {
        metrics: ImpactMetrics,
    },
}

impl StageResult {
    /// The stage this result belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            StageResult::Upload { .. } => Stage::Upload,
            StageResult::AdminReview { .. } => Stage::AdminReview,
            StageResult::MrvCollection { .. } => Stage::MrvCollection,
            StageResult::Verification { .. } => Stage::Verification,
            StageResult::Tokenization { .. } => Stage::Tokenization,
            StageResult::Purchase { .. } => Stage::Purchase,
            StageResult::PaymentDistribution { .. } => Stage::PaymentDistribution,
            StageResult::Reporting { .. } => Stage::Reporting,
        }
    }
}

/// Execution record of one stage for one project.
///
/// Created when the stage handler begins; closed on success or permanent
/// failure; retried in place on transient failure, never duplicated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub completed: bool,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub attempts: u32,
    pub result: Option<StageResult>,
    pub failure: Option<StepFailure>,
}

impl StepRecord {
    fn begin(now: Timestamp) -> Self {
        Self {
            completed: false,
            started_at: now,
            completed_at: None,
            attempts: 1,
            result: None,
            failure: None,
        }
    }

    /// A record is closed once it succeeded or failed permanently; a
    /// closed record is never rewritten.
    pub fn is_closed(&self) -> bool {
        self.completed
            || self
                .failure
                .as_ref()
                .is_some_and(|f| f.kind == FailureKind::Permanent)
    }
}

/// The workflow state for one project.
///
/// Owned exclusively by the orchestrator for the instance's lifetime;
/// collaborators only ever receive copies of the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub project_id: ProjectId,
    pub status: WorkflowStatus,
    /// Insertion order is stage order.
    steps: Vec<(Stage, StepRecord)>,
    pub payload: ProjectPayload,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub cancel_reason: Option<String>,
}

impl WorkflowInstance {
    /// Create a fresh instance with the upload step in flight.
    pub fn create(project_id: ProjectId, payload: ProjectPayload, now: Timestamp) -> Self {
        Self {
            project_id,
            status: WorkflowStatus::Uploaded,
            steps: vec![(Stage::Upload, StepRecord::begin(now))],
            payload,
            created_at: now,
            updated_at: now,
            cancel_reason: None,
        }
    }

    /// All step records in stage order.
    pub fn steps(&self) -> impl Iterator<Item = (Stage, &StepRecord)> {
        self.steps.iter().map(|(stage, record)| (*stage, record))
    }

    /// The record for a stage, if one was ever started.
    pub fn step(&self, stage: Stage) -> Option<&StepRecord> {
        self.steps
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, record)| record)
    }

    pub fn has_completed(&self, stage: Stage) -> bool {
        self.step(stage).is_some_and(|record| record.completed)
    }

    /// The open (started, not yet closed) step, if any. At most one
    /// exists at any time.
    pub fn open_step(&self) -> Option<(Stage, &StepRecord)> {
        self.steps
            .iter()
            .find(|(_, record)| !record.is_closed())
            .map(|(stage, record)| (*stage, record))
    }

    /// The step held by a permanent failure, if any.
    pub fn permanently_failed_step(&self) -> Option<(Stage, &StepRecord)> {
        self.steps
            .iter()
            .find(|(_, record)| {
                !record.completed
                    && record
                        .failure
                        .as_ref()
                        .is_some_and(|f| f.kind == FailureKind::Permanent)
            })
            .map(|(stage, record)| (*stage, record))
    }

    fn err_invalid(&self, requested: Stage) -> WorkflowError {
        WorkflowError::InvalidTransition {
            project: self.project_id.to_string(),
            status: self.status.to_string(),
            requested,
        }
    }

    /// Begin a stage: validate the transition and open its step record.
    ///
    /// Any violation leaves the instance unchanged:
    /// - a terminal status, a duplicate event, or an out-of-order event
    ///   yields [`WorkflowError::InvalidTransition`];
    /// - an open predecessor step yields [`WorkflowError::StepInFlight`]
    ///   (the caller parks the event and replays it later);
    /// - a predecessor held by permanent failure yields
    ///   [`WorkflowError::OutOfOrderEvent`].
    pub fn begin_stage(&mut self, stage: Stage, now: Timestamp) -> Result<(), WorkflowError> {
        if self.status.is_terminal() {
            return Err(self.err_invalid(stage));
        }

        if let Some(record) = self.step(stage) {
            if record.completed {
                return Err(self.err_invalid(stage));
            }
        }

        if let Some((open_stage, _)) = self.open_step() {
            return Err(WorkflowError::StepInFlight {
                project: self.project_id.to_string(),
                stage: open_stage,
            });
        }

        if let Some((failed_stage, _)) = self.permanently_failed_step() {
            if failed_stage != stage {
                return Err(WorkflowError::OutOfOrderEvent {
                    project: self.project_id.to_string(),
                    stage,
                });
            }
            // Re-entry into a permanently failed stage goes through
            // `reopen_failed_step`, not here.
            return Err(self.err_invalid(stage));
        }

        if !self.status.permits(stage) {
            return Err(self.err_invalid(stage));
        }

        self.steps.push((stage, StepRecord::begin(now)));
        self.updated_at = now;
        Ok(())
    }

    /// Increment the attempt counter of the open step after a transient
    /// failure, returning the new count.
    pub fn bump_attempt(&mut self, stage: Stage, now: Timestamp) -> Result<u32, WorkflowError> {
        let record = self.open_step_mut(stage)?;
        record.attempts += 1;
        let attempts = record.attempts;
        self.updated_at = now;
        Ok(attempts)
    }

    /// Record the attempt count observed by the retry loop on the open
    /// step for `stage`.
    pub fn set_attempts(
        &mut self,
        stage: Stage,
        attempts: u32,
        now: Timestamp,
    ) -> Result<(), WorkflowError> {
        let record = self.open_step_mut(stage)?;
        record.attempts = attempts.max(record.attempts);
        self.updated_at = now;
        Ok(())
    }

    /// Close the open step for `stage` with its result and advance the
    /// status derived from that result.
    pub fn complete_stage(
        &mut self,
        result: StageResult,
        now: Timestamp,
    ) -> Result<WorkflowStatus, WorkflowError> {
        let stage = result.stage();
        let new_status = Self::status_after(&result);

        {
            let record = self.open_step_mut(stage)?;
            record.completed = true;
            record.completed_at = Some(now);
            record.result = Some(result);
            record.failure = None;
        }

        self.status = new_status;
        self.updated_at = now;
        Ok(new_status)
    }

    /// Record a failure on the open step for `stage`. A permanent failure
    /// closes the record and holds the instance; a transient failure
    /// leaves it open for retry.
    pub fn fail_stage(
        &mut self,
        stage: Stage,
        kind: FailureKind,
        message: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), WorkflowError> {
        let record = self.open_step_mut(stage)?;
        record.failure = Some(StepFailure {
            kind,
            message: message.into(),
            failed_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Reopen a permanently failed step for a manual retry with a fresh
    /// attempt counter.
    pub fn reopen_failed_step(&mut self, now: Timestamp) -> Result<Stage, WorkflowError> {
        let project = self.project_id.to_string();
        let entry = self
            .steps
            .iter_mut()
            .find(|(_, record)| {
                !record.completed
                    && record
                        .failure
                        .as_ref()
                        .is_some_and(|f| f.kind == FailureKind::Permanent)
            })
            .ok_or(WorkflowError::NothingToRetry { project })?;

        let (stage, record) = (entry.0, &mut entry.1);
        record.failure = None;
        record.attempts = 1;
        record.started_at = now;
        self.updated_at = now;
        Ok(stage)
    }

    /// Resolve an `AwaitingReview` suspension with an external decision.
    /// Approval advances to `Verified`; rejection terminates at
    /// `VerificationFailed`.
    pub fn apply_review_override(
        &mut self,
        approve: bool,
        now: Timestamp,
    ) -> Result<WorkflowStatus, WorkflowError> {
        match self.status {
            WorkflowStatus::AwaitingReview { .. } => {}
            _ => {
                return Err(WorkflowError::NotAwaitingReview {
                    project: self.project_id.to_string(),
                })
            }
        }
        self.status = if approve {
            WorkflowStatus::Verified
        } else {
            WorkflowStatus::VerificationFailed
        };
        self.updated_at = now;
        Ok(self.status)
    }

    /// Administratively cancel the instance.
    ///
    /// Refused for terminal instances and while a step is mid-commit (an
    /// open step with no recorded failure); committed external effects are
    /// never rolled back, the cancel only stops forward progress.
    pub fn cancel(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), WorkflowError> {
        if !self.status.is_cancellable() {
            return Err(WorkflowError::NotCancellable {
                project: self.project_id.to_string(),
                status: self.status.to_string(),
            });
        }
        if let Some((_, record)) = self.open_step() {
            if record.failure.is_none() {
                return Err(WorkflowError::NotCancellable {
                    project: self.project_id.to_string(),
                    status: self.status.to_string(),
                });
            }
        }
        self.status = WorkflowStatus::Cancelled;
        self.cancel_reason = Some(reason.into());
        self.updated_at = now;
        Ok(())
    }

    fn open_step_mut(&mut self, stage: Stage) -> Result<&mut StepRecord, WorkflowError> {
        let project = self.project_id.to_string();
        self.steps
            .iter_mut()
            .find(|(s, record)| *s == stage && !record.is_closed())
            .map(|(_, record)| record)
            .ok_or(WorkflowError::StepAlreadyComplete { project, stage })
    }

    /// The status reached by completing a stage with the given result.
    fn status_after(result: &StageResult) -> WorkflowStatus {
        match result {
            StageResult::Upload { .. } => WorkflowStatus::Uploaded,
            StageResult::AdminReview { approved, .. } => {
                if *approved {
                    WorkflowStatus::AdminApproved
                } else {
                    WorkflowStatus::Rejected
                }
            }
            StageResult::MrvCollection { .. } => WorkflowStatus::MrvCollected,
            StageResult::Verification { result, .. } => match result.recommendation {
                Recommendation::Approve => WorkflowStatus::Verified,
                Recommendation::Reject => WorkflowStatus::VerificationFailed,
                recommendation => WorkflowStatus::AwaitingReview { recommendation },
            },
            StageResult::Tokenization { .. } => WorkflowStatus::Tokenized,
            StageResult::Purchase { .. } => WorkflowStatus::Purchased,
            StageResult::PaymentDistribution { .. } => WorkflowStatus::PaymentsDistributed,
            StageResult::Reporting { .. } => WorkflowStatus::Completed,
        }
    }
}
