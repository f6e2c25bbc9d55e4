//! The workflow orchestrator: one stage handler per public operation.
//!
//! Handler discipline, applied uniformly:
//! 1. acquire the per-project lock, validate the transition, open the
//!    step record, persist the in-flight snapshot, release the lock;
//! 2. run collaborator side effects outside the lock, bounded by timeout
//!    and the retry policy;
//! 3. re-acquire the lock, commit the result (or the failure), persist;
//! 4. publish notifications and emit the next stage's event outside the
//!    lock, through the event channel, so downstream handlers can never
//!    deadlock against the same instance.

use crate::error::NodeError;
use crate::events::StageCommand;
use crate::locks::ProjectLocks;
use crate::metrics::NodeMetrics;
use crate::pending::PendingEvents;
use crate::retry::{call_with_retry, RetryFailure, RetryPolicy};
use crate::submission_log::SubmissionLog;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tidemark_evidence::{EvidenceBundle, SubmissionRecord};
use tidemark_gateways::{
    Clock, ContentStore, LedgerGateway, NotificationBus, NotificationEvent, PaymentRails,
    ProjectStore,
};
use tidemark_types::{
    BatchId, ContentId, OrchestratorParams, ProjectId, RegistryProjectId, ScoringParams,
};
use tidemark_verification::{
    credit_quantity, Recommendation, VerificationEngine, VotingWindow,
};
use tidemark_workflow::{
    compute_split, FailureKind, ImpactMetrics, PaymentSplit, ProjectData, ProjectPayload,
    PurchaseRecord, Stage, StageResult, WorkflowError, WorkflowInstance, WorkflowStatus,
};
use tokio::sync::mpsc;

/// The collaborator set the orchestrator runs against.
pub struct Gateways {
    pub ledger: Arc<dyn LedgerGateway>,
    pub content: Arc<dyn ContentStore>,
    pub store: Arc<dyn ProjectStore>,
    pub bus: Arc<dyn NotificationBus>,
    pub rails: Arc<dyn PaymentRails>,
    pub clock: Arc<dyn Clock>,
}

/// What happened to a dispatched command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// The command ran; the instance is now in this status.
    Completed(WorkflowStatus),
    /// A predecessor step is still in flight; the command was parked and
    /// will replay once the predecessor resolves.
    Parked,
}

pub struct Orchestrator {
    engine: VerificationEngine,
    params: OrchestratorParams,
    retry: RetryPolicy,

    ledger: Arc<dyn LedgerGateway>,
    content: Arc<dyn ContentStore>,
    store: Arc<dyn ProjectStore>,
    bus: Arc<dyn NotificationBus>,
    rails: Arc<dyn PaymentRails>,
    clock: Arc<dyn Clock>,

    instances: Mutex<HashMap<ProjectId, WorkflowInstance>>,
    locks: ProjectLocks,
    submissions: Mutex<SubmissionLog>,
    voting: Mutex<HashMap<ProjectId, VotingWindow>>,
    /// Commands whose stage failed permanently, retained for manual retry.
    held_commands: Mutex<HashMap<ProjectId, StageCommand>>,
    pending: Mutex<PendingEvents>,

    metrics: Arc<NodeMetrics>,
    events_tx: mpsc::Sender<StageCommand>,
}

impl Orchestrator {
    pub fn new(
        scoring: ScoringParams,
        params: OrchestratorParams,
        history_limit: usize,
        gateways: Gateways,
        metrics: Arc<NodeMetrics>,
        events_tx: mpsc::Sender<StageCommand>,
    ) -> Self {
        let retry = RetryPolicy::from_params(&params);
        Self {
            engine: VerificationEngine::new(scoring),
            params,
            retry,
            ledger: gateways.ledger,
            content: gateways.content,
            store: gateways.store,
            bus: gateways.bus,
            rails: gateways.rails,
            clock: gateways.clock,
            instances: Mutex::new(HashMap::new()),
            locks: ProjectLocks::new(),
            submissions: Mutex::new(SubmissionLog::new(history_limit)),
            voting: Mutex::new(HashMap::new()),
            held_commands: Mutex::new(HashMap::new()),
            pending: Mutex::new(PendingEvents::new()),
            metrics,
            events_tx,
        }
    }

    // ── Public API ──────────────────────────────────────────────────────

    /// Dispatch one command. Returns immediately with a structured reason
    /// when the command cannot proceed; success is only reported once the
    /// stage result is committed.
    pub async fn dispatch(&self, command: StageCommand) -> Result<DispatchOutcome, NodeError> {
        let project = command.project_id().clone();
        self.metrics.commands_dispatched.inc();
        let started = std::time::Instant::now();

        let result = self.dispatch_inner(command.clone()).await;
        self.metrics
            .stage_duration_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);

        match result {
            Ok(status) => {
                self.replay_parked(&project).await;
                Ok(DispatchOutcome::Completed(status))
            }
            Err(NodeError::Workflow(WorkflowError::StepInFlight { .. })) => {
                tracing::info!(
                    project = %project,
                    command = command.name(),
                    "predecessor in flight, parking event"
                );
                self.pending.lock().unwrap().park(command);
                self.metrics.parked_events.inc();
                Ok(DispatchOutcome::Parked)
            }
            Err(err) => Err(err),
        }
    }

    /// Snapshot of one instance.
    pub fn instance(&self, project: &ProjectId) -> Option<WorkflowInstance> {
        self.instances.lock().unwrap().get(project).cloned()
    }

    /// Current status of one instance.
    pub fn status_of(&self, project: &ProjectId) -> Option<WorkflowStatus> {
        self.instances.lock().unwrap().get(project).map(|i| i.status)
    }

    /// Snapshots of every instance, in project-id order.
    pub fn all_instances(&self) -> Vec<WorkflowInstance> {
        let map = self.instances.lock().unwrap();
        let mut all: Vec<WorkflowInstance> = map.values().cloned().collect();
        all.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        all
    }

    /// Snapshots of the instances currently in `status`.
    pub fn instances_with_status(&self, status: WorkflowStatus) -> Vec<WorkflowInstance> {
        let mut matching: Vec<WorkflowInstance> = self
            .instances
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        matching
    }

    /// The open community-voting window for a project, if any.
    pub fn voting_window(&self, project: &ProjectId) -> Option<VotingWindow> {
        self.voting.lock().unwrap().get(project).cloned()
    }

    /// Reload every persisted instance into memory after a restart.
    pub async fn recover(&self) -> Result<usize, NodeError> {
        let projects = self
            .store
            .list()
            .await
            .map_err(|e| NodeError::Recovery(e.to_string()))?;

        let mut recovered = 0;
        for project in projects {
            let Some(bytes) = self
                .store
                .load(&project)
                .await
                .map_err(|e| NodeError::Recovery(e.to_string()))?
            else {
                continue;
            };
            let instance: WorkflowInstance = bincode::deserialize(&bytes)
                .map_err(|e| NodeError::Recovery(format!("corrupt record for {project}: {e}")))?;
            self.instances.lock().unwrap().insert(project, instance);
            recovered += 1;
        }
        self.update_instance_gauge();
        tracing::info!(instances = recovered, "workflow instances recovered from store");
        Ok(recovered)
    }

    // ── Dispatch plumbing ───────────────────────────────────────────────

    async fn dispatch_inner(&self, command: StageCommand) -> Result<WorkflowStatus, NodeError> {
        tracing::debug!(
            project = %command.project_id(),
            command = command.name(),
            "dispatching stage command"
        );
        match command.clone() {
            StageCommand::Upload { project_id, data } => {
                self.handle_upload(&project_id, data).await
            }
            StageCommand::AdminReview {
                project_id,
                approve,
                comments,
                reviewer_id,
            } => {
                self.handle_admin_review(&project_id, approve, comments, reviewer_id, &command, false)
                    .await
            }
            StageCommand::MrvCollection {
                project_id,
                evidence,
            } => {
                self.handle_mrv_collection(&project_id, evidence, &command, false)
                    .await
            }
            StageCommand::Verification {
                project_id,
                evidence,
            } => self.handle_verification(&project_id, evidence, false).await,
            StageCommand::Tokenization {
                project_id,
                credit_amount,
            } => {
                self.handle_tokenization(&project_id, credit_amount, &command, false)
                    .await
            }
            StageCommand::Purchase {
                project_id,
                purchase,
            } => self.handle_purchase(&project_id, purchase, false).await,
            StageCommand::PaymentDistribution {
                project_id,
                distributions,
            } => {
                self.handle_payment_distribution(&project_id, distributions, &command, false)
                    .await
            }
            StageCommand::Reporting {
                project_id,
                metrics,
            } => self.handle_reporting(&project_id, metrics, false).await,
            StageCommand::ReviewOverride {
                project_id,
                approve,
                reviewer_id,
            } => {
                self.handle_review_override(&project_id, approve, reviewer_id)
                    .await
            }
            StageCommand::Cancel { project_id, reason } => {
                self.handle_cancel(&project_id, reason).await
            }
            StageCommand::Retry { project_id } => self.handle_retry(&project_id).await,
        }
    }

    /// Replay commands parked behind the step that just resolved. Stops
    /// at the first command that parks again.
    async fn replay_parked(&self, project: &ProjectId) {
        loop {
            let next = self.pending.lock().unwrap().take_next(project);
            let Some(command) = next else { return };
            self.metrics.parked_events.dec();

            match self.dispatch_inner(command.clone()).await {
                Ok(_) => continue,
                Err(NodeError::Workflow(WorkflowError::StepInFlight { .. })) => {
                    self.pending.lock().unwrap().park(command);
                    self.metrics.parked_events.inc();
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        project = %project,
                        command = command.name(),
                        error = %err,
                        "replayed event could not proceed"
                    );
                }
            }
        }
    }

    // ── Stage handlers ──────────────────────────────────────────────────

    async fn handle_upload(
        &self,
        project_id: &ProjectId,
        data: ProjectData,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;

        {
            let mut map = self.instances.lock().unwrap();
            if let Some(existing) = map.get(project_id) {
                // A terminally rejected project may be resubmitted fresh.
                if existing.status == WorkflowStatus::Rejected {
                    map.remove(project_id);
                } else {
                    return Err(WorkflowError::DuplicateProject(project_id.to_string()).into());
                }
            }
            let payload = ProjectPayload::from_upload(&data, Vec::new());
            map.insert(
                project_id.clone(),
                WorkflowInstance::create(project_id.clone(), payload, now),
            );
        }
        self.update_instance_gauge();
        self.persist(project_id, Stage::Upload).await;
        drop(guard);

        let effects = self.upload_effects(&data).await;
        match effects {
            Ok((media_refs, manifest_ref, registration_tx, registry_id, attempts)) => {
                let guard = self.locks.acquire(project_id).await;
                let status = self.with_instance(project_id, |instance| {
                    instance.payload.media_refs = media_refs.clone();
                    let now = self.clock.now();
                    instance.set_attempts(Stage::Upload, attempts, now)?;
                    Ok(instance.complete_stage(
                        StageResult::Upload {
                            media_refs,
                            manifest_ref,
                            registration_tx: registration_tx.clone(),
                            registry_id,
                        },
                        now,
                    )?)
                })?;
                self.persist(project_id, Stage::Upload).await;
                drop(guard);

                self.note_step_success(attempts);
                self.publish(NotificationEvent::ProjectUploaded {
                    project_id: project_id.clone(),
                    name: data.name.clone(),
                    registration_tx,
                })
                .await;
                tracing::info!(project = %project_id, "project uploaded, pending admin review");
                self.after_commit(project_id, status);
                Ok(status)
            }
            Err(failure) => {
                let command = StageCommand::Upload {
                    project_id: project_id.clone(),
                    data,
                };
                self.fail_step(project_id, Stage::Upload, failure, &command)
                    .await
            }
        }
    }

    /// Upload side effects: store media, store and pin the manifest,
    /// register the project with the ledger.
    async fn upload_effects(
        &self,
        data: &ProjectData,
    ) -> Result<(Vec<ContentId>, ContentId, tidemark_types::TxId, RegistryProjectId, u32), RetryFailure>
    {
        let mut media_refs = Vec::with_capacity(data.media.len());
        for media in &data.media {
            let (content_id, _) = call_with_retry(
                "content.put",
                self.content_timeout(),
                &self.retry,
                || self.content.put(&media.bytes),
            )
            .await?;
            media_refs.push(content_id);
        }

        let manifest = serde_json::json!({
            "name": data.name,
            "location": data.location_label,
            "area_sq_m": data.area_sq_m,
            "ecosystem": data.ecosystem.as_str(),
            "media": media_refs.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        });
        let manifest_bytes = manifest.to_string().into_bytes();
        let (manifest_ref, _) = call_with_retry(
            "content.put",
            self.content_timeout(),
            &self.retry,
            || self.content.put(&manifest_bytes),
        )
        .await?;
        call_with_retry("content.pin", self.content_timeout(), &self.retry, || {
            self.content.pin(&manifest_ref)
        })
        .await?;

        let ((registration_tx, registry_id), attempts) = call_with_retry(
            "ledger.register",
            self.ledger_timeout(),
            &self.retry,
            || {
                self.ledger.register(
                    &data.name,
                    &data.location_label,
                    data.area_sq_m,
                    &manifest_ref,
                )
            },
        )
        .await?;

        Ok((media_refs, manifest_ref, registration_tx, registry_id, attempts))
    }

    async fn handle_admin_review(
        &self,
        project_id: &ProjectId,
        approve: bool,
        comments: String,
        reviewer_id: String,
        command: &StageCommand,
        resume: bool,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let registry_id = self.with_instance(project_id, |instance| {
            Self::ensure_open(instance, Stage::AdminReview, resume, now)?;
            Self::registry_id_of(instance)
        })?;
        self.persist(project_id, Stage::AdminReview).await;
        drop(guard);

        let ledger_status = if approve { "approved" } else { "rejected" };
        let outcome = call_with_retry(
            "ledger.update_status",
            self.ledger_timeout(),
            &self.retry,
            || self.ledger.update_status(&registry_id, ledger_status),
        )
        .await;

        match outcome {
            Ok((status_tx, attempts)) => {
                let guard = self.locks.acquire(project_id).await;
                let status = self.with_instance(project_id, |instance| {
                    let now = self.clock.now();
                    instance.set_attempts(Stage::AdminReview, attempts, now)?;
                    Ok(instance.complete_stage(
                        StageResult::AdminReview {
                            approved: approve,
                            reviewer: reviewer_id.clone(),
                            comments: comments.clone(),
                            status_tx,
                        },
                        now,
                    )?)
                })?;
                self.persist(project_id, Stage::AdminReview).await;
                drop(guard);

                self.note_step_success(attempts);
                self.publish(NotificationEvent::AdminReviewed {
                    project_id: project_id.clone(),
                    approved: approve,
                    reviewer: reviewer_id,
                })
                .await;
                if approve {
                    tracing::info!(project = %project_id, "project approved, ready for MRV collection");
                } else {
                    tracing::info!(project = %project_id, "project rejected at admin review");
                }
                self.after_commit(project_id, status);
                Ok(status)
            }
            Err(failure) => {
                self.fail_step(project_id, Stage::AdminReview, failure, command)
                    .await
            }
        }
    }

    async fn handle_mrv_collection(
        &self,
        project_id: &ProjectId,
        evidence: EvidenceBundle,
        command: &StageCommand,
        resume: bool,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        self.with_instance(project_id, |instance| {
            Self::ensure_open(instance, Stage::MrvCollection, resume, now)?;
            Ok(())
        })?;
        self.persist(project_id, Stage::MrvCollection).await;
        drop(guard);

        let evidence_bytes = match bincode::serialize(&evidence) {
            Ok(bytes) => bytes,
            Err(e) => return Err(NodeError::Serialization(e.to_string())),
        };
        let effects = async {
            let (evidence_ref, attempts) = call_with_retry(
                "content.put",
                self.content_timeout(),
                &self.retry,
                || self.content.put(&evidence_bytes),
            )
            .await?;
            call_with_retry("content.pin", self.content_timeout(), &self.retry, || {
                self.content.pin(&evidence_ref)
            })
            .await?;
            Ok::<_, RetryFailure>((evidence_ref, attempts))
        }
        .await;

        match effects {
            Ok((evidence_ref, attempts)) => {
                let guard = self.locks.acquire(project_id).await;
                let status = self.with_instance(project_id, |instance| {
                    let now = self.clock.now();
                    instance.set_attempts(Stage::MrvCollection, attempts, now)?;
                    Ok(instance.complete_stage(
                        StageResult::MrvCollection {
                            evidence_refs: vec![evidence_ref],
                        },
                        now,
                    )?)
                })?;
                self.persist(project_id, Stage::MrvCollection).await;
                drop(guard);

                self.note_step_success(attempts);
                self.publish(NotificationEvent::MrvCollected {
                    project_id: project_id.clone(),
                    evidence_count: evidence.images.len(),
                })
                .await;
                self.emit(StageCommand::Verification {
                    project_id: project_id.clone(),
                    evidence,
                })
                .await;
                Ok(status)
            }
            Err(failure) => {
                self.fail_step(project_id, Stage::MrvCollection, failure, command)
                    .await
            }
        }
    }

    async fn handle_verification(
        &self,
        project_id: &ProjectId,
        evidence: EvidenceBundle,
        resume: bool,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let (area_sq_m, ecosystem) = self.with_instance(project_id, |instance| {
            Self::ensure_open(instance, Stage::Verification, resume, now)?;
            Ok((instance.payload.area_sq_m, instance.payload.ecosystem))
        })?;

        // Pure computation; no collaborator calls, so the lock stays held
        // through the commit.
        let history = self
            .submissions
            .lock()
            .unwrap()
            .history(&evidence.submitter);
        let result = self.engine.evaluate(&evidence, &history, now);
        let credit_amount = match result.recommendation {
            Recommendation::Approve => Some(credit_quantity(area_sq_m, ecosystem)),
            _ => None,
        };

        let status = self.with_instance(project_id, |instance| {
            Ok(instance.complete_stage(
                StageResult::Verification {
                    result: result.clone(),
                    credit_amount,
                },
                now,
            )?)
        })?;
        if let Some(fix) = &evidence.location {
            self.submissions.lock().unwrap().record(SubmissionRecord {
                submitter: evidence.submitter.clone(),
                point: fix.point,
                submitted_at: now,
            });
        }
        self.persist(project_id, Stage::Verification).await;
        drop(guard);

        self.metrics.steps_completed.inc();
        match result.recommendation {
            Recommendation::Approve => self.metrics.verifications_approved.inc(),
            Recommendation::Reject => self.metrics.verifications_rejected.inc(),
            _ => self.metrics.verifications_suspended.inc(),
        }
        tracing::info!(
            project = %project_id,
            consensus = result.consensus_score,
            fraud_risk = result.fraud_risk,
            final_score = result.final_score,
            recommendation = ?result.recommendation,
            "verification evaluated"
        );

        self.publish(NotificationEvent::VerificationComplete {
            project_id: project_id.clone(),
            recommendation: format!("{:?}", result.recommendation),
            final_score: result.final_score,
            requires_review: result.requires_review,
        })
        .await;

        match status {
            WorkflowStatus::Verified => {
                let amount = credit_amount.unwrap_or_default();
                self.emit(StageCommand::Tokenization {
                    project_id: project_id.clone(),
                    credit_amount: amount,
                })
                .await;
            }
            WorkflowStatus::AwaitingReview { recommendation } => {
                let closes_at = if recommendation == Recommendation::CommunityReview {
                    let window = VotingWindow::open(
                        project_id.clone(),
                        now,
                        self.engine.params().voting_window_secs,
                    );
                    let closes_at = window.closes_at();
                    self.voting
                        .lock()
                        .unwrap()
                        .insert(project_id.clone(), window);
                    Some(closes_at)
                } else {
                    None
                };
                self.publish(NotificationEvent::ReviewRequired {
                    project_id: project_id.clone(),
                    recommendation: format!("{recommendation:?}"),
                    voting_closes_at: closes_at,
                })
                .await;
            }
            _ => {}
        }

        self.after_commit(project_id, status);
        Ok(status)
    }

    async fn handle_tokenization(
        &self,
        project_id: &ProjectId,
        credit_amount: f64,
        command: &StageCommand,
        resume: bool,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let (registry_id, operator) = self.with_instance(project_id, |instance| {
            Self::ensure_open(instance, Stage::Tokenization, resume, now)?;
            let registry_id = Self::registry_id_of(instance)?;
            Ok((registry_id, instance.payload.submitter.clone()))
        })?;
        self.persist(project_id, Stage::Tokenization).await;
        drop(guard);

        let batch_id = BatchId::new(format!("batch-{}-{}", project_id, now.as_secs()));
        let outcome = call_with_retry("ledger.mint", self.ledger_timeout(), &self.retry, || {
            self.ledger
                .mint(operator.as_str(), credit_amount, &registry_id, &batch_id)
        })
        .await;

        match outcome {
            Ok((mint_tx, attempts)) => {
                let guard = self.locks.acquire(project_id).await;
                let status = self.with_instance(project_id, |instance| {
                    let now = self.clock.now();
                    instance.set_attempts(Stage::Tokenization, attempts, now)?;
                    Ok(instance.complete_stage(
                        StageResult::Tokenization {
                            mint_tx,
                            batch_id: batch_id.clone(),
                            credit_amount,
                        },
                        now,
                    )?)
                })?;
                self.persist(project_id, Stage::Tokenization).await;
                drop(guard);

                self.note_step_success(attempts);
                self.publish(NotificationEvent::CreditsTokenized {
                    project_id: project_id.clone(),
                    credit_amount,
                    batch_id,
                })
                .await;
                self.publish(NotificationEvent::MarketplaceListed {
                    project_id: project_id.clone(),
                    credit_amount,
                    price_per_credit: self.params.marketplace_price_per_credit,
                    certification: self.params.marketplace_certification.clone(),
                })
                .await;
                tracing::info!(
                    project = %project_id,
                    credits = credit_amount,
                    "credits tokenized and listed"
                );
                Ok(status)
            }
            Err(failure) => {
                self.fail_step(project_id, Stage::Tokenization, failure, command)
                    .await
            }
        }
    }

    async fn handle_purchase(
        &self,
        project_id: &ProjectId,
        purchase: PurchaseRecord,
        resume: bool,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;

        // Recording the sale needs no collaborator call; begin and commit
        // under one lock hold.
        let split = compute_split(purchase.total_paid, &self.params);
        let status = self.with_instance(project_id, |instance| {
            Self::ensure_open(instance, Stage::Purchase, resume, now)?;
            Ok(instance.complete_stage(
                StageResult::Purchase {
                    purchase: purchase.clone(),
                    split: split.clone(),
                },
                now,
            )?)
        })?;
        self.persist(project_id, Stage::Purchase).await;
        drop(guard);

        self.metrics.steps_completed.inc();
        self.publish(NotificationEvent::CreditsPurchased {
            project_id: project_id.clone(),
            buyer: purchase.buyer.clone(),
            quantity: purchase.quantity,
            total_paid: purchase.total_paid,
        })
        .await;
        self.emit(StageCommand::PaymentDistribution {
            project_id: project_id.clone(),
            distributions: Some(split),
        })
        .await;
        Ok(status)
    }

    async fn handle_payment_distribution(
        &self,
        project_id: &ProjectId,
        distributions: Option<PaymentSplit>,
        command: &StageCommand,
        resume: bool,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let (split, operator) = self.with_instance(project_id, |instance| {
            Self::ensure_open(instance, Stage::PaymentDistribution, resume, now)?;
            let split = match &distributions {
                Some(split) => split.clone(),
                None => Self::split_of(instance)?,
            };
            Ok((split, instance.payload.submitter.clone()))
        })?;
        self.persist(project_id, Stage::PaymentDistribution).await;
        drop(guard);

        let transfers = [
            (operator.as_str().to_string(), split.operator),
            (self.params.verifier_account.clone(), split.verifier),
            (self.params.platform_account.clone(), split.platform),
        ];
        let effects = async {
            let mut payout_refs = Vec::with_capacity(transfers.len());
            let mut attempts = 1;
            for (recipient, amount) in &transfers {
                let (reference, call_attempts) = call_with_retry(
                    "rails.transfer",
                    self.ledger_timeout(),
                    &self.retry,
                    || self.rails.transfer(recipient, *amount),
                )
                .await?;
                payout_refs.push(reference);
                attempts = attempts.max(call_attempts);
            }
            Ok::<_, RetryFailure>((payout_refs, attempts))
        }
        .await;

        match effects {
            Ok((payout_refs, attempts)) => {
                let guard = self.locks.acquire(project_id).await;
                let (status, co2, area_ha) = self.with_instance(project_id, |instance| {
                    let now = self.clock.now();
                    instance.set_attempts(Stage::PaymentDistribution, attempts, now)?;
                    let status = instance.complete_stage(
                        StageResult::PaymentDistribution { payout_refs },
                        now,
                    )?;
                    let co2 = Self::credit_amount_of(instance).unwrap_or_default();
                    let area_ha = instance.payload.area_sq_m / 10_000.0;
                    Ok((status, co2, area_ha))
                })?;
                self.persist(project_id, Stage::PaymentDistribution).await;
                drop(guard);

                self.note_step_success(attempts);
                self.publish(NotificationEvent::PaymentsDistributed {
                    project_id: project_id.clone(),
                    operator_amount: split.operator,
                    verifier_amount: split.verifier,
                    platform_amount: split.platform,
                })
                .await;
                self.emit(StageCommand::Reporting {
                    project_id: project_id.clone(),
                    metrics: ImpactMetrics {
                        co2_sequestered_t: co2,
                        area_restored_ha: area_ha,
                        community_beneficiaries: 0,
                    },
                })
                .await;
                Ok(status)
            }
            Err(failure) => {
                self.fail_step(project_id, Stage::PaymentDistribution, failure, command)
                    .await
            }
        }
    }

    async fn handle_reporting(
        &self,
        project_id: &ProjectId,
        metrics: ImpactMetrics,
        resume: bool,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let status = self.with_instance(project_id, |instance| {
            Self::ensure_open(instance, Stage::Reporting, resume, now)?;
            Ok(instance.complete_stage(
                StageResult::Reporting {
                    metrics: metrics.clone(),
                },
                now,
            )?)
        })?;
        self.persist(project_id, Stage::Reporting).await;
        drop(guard);

        self.metrics.steps_completed.inc();
        self.publish(NotificationEvent::ReportingUpdated {
            project_id: project_id.clone(),
            co2_sequestered_t: metrics.co2_sequestered_t,
        })
        .await;
        tracing::info!(project = %project_id, "workflow completed");
        self.after_commit(project_id, status);
        Ok(status)
    }

    async fn handle_review_override(
        &self,
        project_id: &ProjectId,
        approve: bool,
        reviewer_id: String,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let (status, credit_amount) = self.with_instance(project_id, |instance| {
            let status = instance.apply_review_override(approve, now)?;
            let credit_amount =
                credit_quantity(instance.payload.area_sq_m, instance.payload.ecosystem);
            Ok((status, credit_amount))
        })?;
        self.persist(project_id, Stage::Verification).await;
        drop(guard);

        self.voting.lock().unwrap().remove(project_id);
        tracing::info!(
            project = %project_id,
            approve,
            reviewer = %reviewer_id,
            "review override applied"
        );
        self.publish(NotificationEvent::VerificationComplete {
            project_id: project_id.clone(),
            recommendation: if approve {
                "OverrideApproved".to_string()
            } else {
                "OverrideRejected".to_string()
            },
            final_score: 0.0,
            requires_review: false,
        })
        .await;

        if status == WorkflowStatus::Verified {
            self.emit(StageCommand::Tokenization {
                project_id: project_id.clone(),
                credit_amount,
            })
            .await;
        }
        self.after_commit(project_id, status);
        Ok(status)
    }

    async fn handle_cancel(
        &self,
        project_id: &ProjectId,
        reason: String,
    ) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let status = self.with_instance(project_id, |instance| {
            instance.cancel(reason.clone(), now)?;
            Ok(instance.status)
        })?;
        self.persist_with_key(project_id, "cancel").await;
        drop(guard);

        tracing::warn!(project = %project_id, reason = %reason, "workflow cancelled");
        self.after_commit(project_id, status);
        Ok(status)
    }

    async fn handle_retry(&self, project_id: &ProjectId) -> Result<WorkflowStatus, NodeError> {
        let now = self.clock.now();
        let guard = self.locks.acquire(project_id).await;
        let stage = self.with_instance(project_id, |instance| {
            Ok(instance.reopen_failed_step(now)?)
        })?;
        self.persist(project_id, stage).await;
        drop(guard);

        tracing::info!(project = %project_id, stage = %stage, "manual retry of failed stage");

        let held = self.held_commands.lock().unwrap().remove(project_id);
        let command = match held {
            Some(command) => command,
            None => self.reconstruct_command(project_id, stage)?,
        };

        match command {
            StageCommand::Upload { data, .. } => {
                // The step record is already open; run the effects and
                // commit exactly as a fresh upload would.
                let effects = self.upload_effects(&data).await;
                match effects {
                    Ok((media_refs, manifest_ref, registration_tx, registry_id, attempts)) => {
                        let guard = self.locks.acquire(project_id).await;
                        let status = self.with_instance(project_id, |instance| {
                            instance.payload.media_refs = media_refs.clone();
                            let now = self.clock.now();
                            instance.set_attempts(Stage::Upload, attempts, now)?;
                            Ok(instance.complete_stage(
                                StageResult::Upload {
                                    media_refs,
                                    manifest_ref,
                                    registration_tx: registration_tx.clone(),
                                    registry_id,
                                },
                                now,
                            )?)
                        })?;
                        self.persist(project_id, Stage::Upload).await;
                        drop(guard);
                        self.note_step_success(attempts);
                        self.publish(NotificationEvent::ProjectUploaded {
                            project_id: project_id.clone(),
                            name: data.name.clone(),
                            registration_tx,
                        })
                        .await;
                        Ok(status)
                    }
                    Err(failure) => {
                        let command = StageCommand::Upload {
                            project_id: project_id.clone(),
                            data,
                        };
                        self.fail_step(project_id, Stage::Upload, failure, &command)
                            .await
                    }
                }
            }
            StageCommand::AdminReview {
                approve,
                comments,
                reviewer_id,
                ..
            } => {
                let command = StageCommand::AdminReview {
                    project_id: project_id.clone(),
                    approve,
                    comments: comments.clone(),
                    reviewer_id: reviewer_id.clone(),
                };
                self.handle_admin_review(project_id, approve, comments, reviewer_id, &command, true)
                    .await
            }
            StageCommand::MrvCollection { evidence, .. } => {
                let command = StageCommand::MrvCollection {
                    project_id: project_id.clone(),
                    evidence: evidence.clone(),
                };
                self.handle_mrv_collection(project_id, evidence, &command, true)
                    .await
            }
            StageCommand::Verification { evidence, .. } => {
                self.handle_verification(project_id, evidence, true).await
            }
            StageCommand::Tokenization { credit_amount, .. } => {
                let command = StageCommand::Tokenization {
                    project_id: project_id.clone(),
                    credit_amount,
                };
                self.handle_tokenization(project_id, credit_amount, &command, true)
                    .await
            }
            StageCommand::Purchase { purchase, .. } => {
                self.handle_purchase(project_id, purchase, true).await
            }
            StageCommand::PaymentDistribution { distributions, .. } => {
                let command = StageCommand::PaymentDistribution {
                    project_id: project_id.clone(),
                    distributions: distributions.clone(),
                };
                self.handle_payment_distribution(project_id, distributions, &command, true)
                    .await
            }
            StageCommand::Reporting { metrics, .. } => {
                self.handle_reporting(project_id, metrics, true).await
            }
            StageCommand::ReviewOverride { .. }
            | StageCommand::Cancel { .. }
            | StageCommand::Retry { .. } => Err(NodeError::CommandUnavailable),
        }
    }

    /// Rebuild a retryable command from recorded state when the original
    /// command was lost (e.g. after a restart).
    fn reconstruct_command(
        &self,
        project_id: &ProjectId,
        stage: Stage,
    ) -> Result<StageCommand, NodeError> {
        let map = self.instances.lock().unwrap();
        let instance = map
            .get(project_id)
            .ok_or_else(|| WorkflowError::UnknownProject(project_id.to_string()))
            .map_err(NodeError::from)?;

        match stage {
            Stage::Tokenization => {
                let credit_amount =
                    Self::credit_amount_of(instance).ok_or(NodeError::CommandUnavailable)?;
                Ok(StageCommand::Tokenization {
                    project_id: project_id.clone(),
                    credit_amount,
                })
            }
            Stage::PaymentDistribution => Ok(StageCommand::PaymentDistribution {
                project_id: project_id.clone(),
                distributions: None,
            }),
            _ => Err(NodeError::CommandUnavailable),
        }
    }

    // ── Failure path ────────────────────────────────────────────────────

    /// Record a permanent stage failure, hold the command for manual
    /// retry, and escalate to the admin channel. The instance status is
    /// left unchanged; the workflow never advances past a failed step.
    async fn fail_step(
        &self,
        project_id: &ProjectId,
        stage: Stage,
        failure: RetryFailure,
        command: &StageCommand,
    ) -> Result<WorkflowStatus, NodeError> {
        let attempts = failure.attempts();
        let message = failure.message();

        let guard = self.locks.acquire(project_id).await;
        self.with_instance(project_id, |instance| {
            let now = self.clock.now();
            instance.set_attempts(stage, attempts, now)?;
            instance.fail_stage(stage, FailureKind::Permanent, message.clone(), now)?;
            Ok(())
        })?;
        self.persist(project_id, stage).await;
        drop(guard);

        self.held_commands
            .lock()
            .unwrap()
            .insert(project_id.clone(), command.clone());
        self.metrics.steps_failed.inc();
        if attempts > 1 {
            self.metrics.retries.inc_by(u64::from(attempts - 1));
        }

        tracing::error!(
            project = %project_id,
            stage = %stage,
            attempts,
            error = %message,
            "stage failed permanently, held for manual intervention"
        );
        self.publish(NotificationEvent::StepFailed {
            project_id: project_id.clone(),
            stage: stage.to_string(),
            attempts,
            message: message.clone(),
        })
        .await;

        Err(NodeError::StagePermanentlyFailed {
            stage,
            attempts,
            message,
        })
    }

    // ── Shared plumbing ─────────────────────────────────────────────────

    fn with_instance<T>(
        &self,
        project: &ProjectId,
        f: impl FnOnce(&mut WorkflowInstance) -> Result<T, NodeError>,
    ) -> Result<T, NodeError> {
        let mut map = self.instances.lock().unwrap();
        let instance = map
            .get_mut(project)
            .ok_or_else(|| WorkflowError::UnknownProject(project.to_string()))
            .map_err(NodeError::from)?;
        f(instance)
    }

    /// Validate that the step for `stage` may run: open it fresh, or (on
    /// a manual retry) confirm the reopened record is the one expected.
    fn ensure_open(
        instance: &mut WorkflowInstance,
        stage: Stage,
        resume: bool,
        now: tidemark_types::Timestamp,
    ) -> Result<(), NodeError> {
        if resume {
            match instance.open_step() {
                Some((open_stage, _)) if open_stage == stage => Ok(()),
                _ => Err(WorkflowError::InvalidTransition {
                    project: instance.project_id.to_string(),
                    status: instance.status.to_string(),
                    requested: stage,
                }
                .into()),
            }
        } else {
            instance.begin_stage(stage, now).map_err(NodeError::from)
        }
    }

    fn registry_id_of(instance: &WorkflowInstance) -> Result<RegistryProjectId, NodeError> {
        instance
            .step(Stage::Upload)
            .and_then(|record| record.result.as_ref())
            .and_then(|result| match result {
                StageResult::Upload { registry_id, .. } => Some(registry_id.clone()),
                _ => None,
            })
            .ok_or(NodeError::MissingStageResult(Stage::Upload))
    }

    fn split_of(instance: &WorkflowInstance) -> Result<PaymentSplit, NodeError> {
        instance
            .step(Stage::Purchase)
            .and_then(|record| record.result.as_ref())
            .and_then(|result| match result {
                StageResult::Purchase { split, .. } => Some(split.clone()),
                _ => None,
            })
            .ok_or(NodeError::MissingStageResult(Stage::Purchase))
    }

    fn credit_amount_of(instance: &WorkflowInstance) -> Option<f64> {
        instance
            .step(Stage::Tokenization)
            .and_then(|record| record.result.as_ref())
            .and_then(|result| match result {
                StageResult::Tokenization { credit_amount, .. } => Some(*credit_amount),
                _ => None,
            })
            .or_else(|| {
                instance
                    .step(Stage::Verification)
                    .and_then(|record| record.result.as_ref())
                    .and_then(|result| match result {
                        StageResult::Verification { credit_amount, .. } => *credit_amount,
                        _ => None,
                    })
            })
    }

    /// Mirror the instance to the persistence store. The in-memory copy is
    /// authoritative; a persist failure is logged and does not fail the
    /// stage.
    async fn persist(&self, project: &ProjectId, stage: Stage) {
        self.persist_with_key(project, stage.as_str()).await;
    }

    async fn persist_with_key(&self, project: &ProjectId, stage_key: &str) {
        let bytes = {
            let map = self.instances.lock().unwrap();
            let Some(instance) = map.get(project) else { return };
            match bincode::serialize(instance) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(project = %project, error = %e, "instance serialization failed");
                    return;
                }
            }
        };

        let outcome = call_with_retry("store.upsert", self.store_timeout(), &self.retry, || {
            self.store.upsert(project, stage_key, &bytes)
        })
        .await;
        if let Err(failure) = outcome {
            tracing::warn!(
                project = %project,
                stage = stage_key,
                error = %failure.message(),
                "persistence mirror write failed; in-memory copy remains authoritative"
            );
        }
    }

    async fn publish(&self, event: NotificationEvent) {
        match self.bus.publish(event).await {
            Ok(()) => self.metrics.notifications_published.inc(),
            Err(e) => tracing::warn!(error = %e, "notification publish failed"),
        }
    }

    /// Emit the next stage's event through the channel, never as a
    /// synchronous call into another handler.
    async fn emit(&self, command: StageCommand) {
        if self.events_tx.send(command).await.is_err() {
            tracing::error!("event channel closed; next-stage event dropped");
        }
    }

    fn note_step_success(&self, attempts: u32) {
        self.metrics.steps_completed.inc();
        if attempts > 1 {
            self.metrics.retries.inc_by(u64::from(attempts - 1));
        }
    }

    /// Terminal-state housekeeping: drop parked events, the lock entry,
    /// and any held command or voting window.
    fn after_commit(&self, project: &ProjectId, status: WorkflowStatus) {
        if !status.is_terminal() {
            return;
        }
        let discarded = self.pending.lock().unwrap().discard(project);
        if discarded > 0 {
            self.metrics.parked_events.sub(discarded as i64);
            tracing::info!(
                project = %project,
                discarded,
                "discarded parked events for terminal workflow"
            );
        }
        self.held_commands.lock().unwrap().remove(project);
        self.voting.lock().unwrap().remove(project);
        self.locks.release(project);
    }

    fn update_instance_gauge(&self) {
        let count = self.instances.lock().unwrap().len();
        self.metrics.active_instances.set(count as i64);
    }

    fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.params.ledger_timeout_secs)
    }

    fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.params.content_timeout_secs)
    }

    fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.params.store_timeout_secs)
    }
}
