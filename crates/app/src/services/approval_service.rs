//! Approval service — the workflow gating every automation change.
//!
//! Submissions are conflict-checked and risk-classified; decisions are
//! idempotent and drive the lifecycle engine under the same per-automation
//! lock, so an approval and an emergency stop on one automation can never
//! interleave mid-transition. Whether a risk level needs a human is an
//! injected policy table, not hard-coded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use govhub_domain::approval::{ApprovalRequest, ApprovalStatus, RiskLevel, WorkflowKind};
use govhub_domain::automation::{Automation, ExecutionMetrics, LifecycleState};
use govhub_domain::backup::BackupKind;
use govhub_domain::error::{
    AlreadyProcessingError, AuthorizationError, ConflictError, GovError, NotFoundError,
    ValidationError,
};
use govhub_domain::event::{Event, EventKind};
use govhub_domain::id::{AutomationId, RequestId};
use govhub_domain::suggestion::OptimizationSuggestion;
use govhub_domain::time::now;

use crate::locks::AutomationLocks;
use crate::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    TransitionLog,
};
use crate::services::backup_service::BackupService;
use crate::services::lifecycle_service::LifecycleService;

/// Actor recorded on auto-approved decisions.
pub const POLICY_ACTOR: &str = "policy";

/// Which risk levels need a human decision. Injected configuration,
/// defaulting to hands-off for LOW only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalPolicy {
    pub low: bool,
    pub medium: bool,
    pub high: bool,
    pub critical: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            low: false,
            medium: true,
            high: true,
            critical: true,
        }
    }
}

impl ApprovalPolicy {
    /// Whether a request at this risk level waits for a human.
    #[must_use]
    pub fn requires_manual_approval(&self, risk: RiskLevel) -> bool {
        match risk {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
            RiskLevel::Critical => self.critical,
        }
    }
}

/// A change proposal entering the workflow.
#[derive(Debug, Clone)]
pub struct Submission {
    pub workflow: WorkflowKind,
    /// Required for MODIFICATION and RETIREMENT; ignored for CREATION,
    /// which always allocates a fresh internal id.
    pub automation_id: Option<AutomationId>,
    pub requester: String,
    pub payload: serde_json::Value,
}

/// Risk classification from payload heuristics: how much configuration the
/// change touches, how many entities it affects, and how unreliable the
/// automation has been so far.
#[must_use]
pub fn classify_risk(
    workflow: WorkflowKind,
    payload: &serde_json::Value,
    metrics: Option<&ExecutionMetrics>,
) -> RiskLevel {
    let mut score = match workflow {
        WorkflowKind::Creation => 0,
        WorkflowKind::Modification => 1,
        WorkflowKind::Retirement => 2,
    };

    let config_keys = payload
        .get("config")
        .and_then(serde_json::Value::as_object)
        .map_or(0, serde_json::Map::len);
    score += match config_keys {
        0..=3 => 0,
        4..=10 => 1,
        _ => 2,
    };

    let affected_entities = payload
        .get("affected_entities")
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len);
    score += match affected_entities {
        0..=1 => 0,
        2..=5 => 1,
        _ => 2,
    };

    if let Some(metrics) = metrics {
        let failure_rate = 1.0 - metrics.success_rate();
        if failure_rate > 0.5 {
            score += 3;
        } else if failure_rate > 0.2 {
            score += 2;
        } else if failure_rate > 0.05 {
            score += 1;
        }
    }

    match score {
        0..=1 => RiskLevel::Low,
        2..=3 => RiskLevel::Medium,
        4..=5 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

/// Application service owning the approval workflow.
pub struct ApprovalService<PR, AR, TL, EP, PG, BS> {
    repo: PR,
    lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
    backups: Arc<BackupService<BS, AR, TL, EP, PG>>,
    publisher: EP,
    policy: ApprovalPolicy,
    locks: Arc<AutomationLocks>,
}

impl<PR, AR, TL, EP, PG, BS> ApprovalService<PR, AR, TL, EP, PG, BS>
where
    PR: ApprovalRepository,
    AR: AutomationRepository,
    TL: TransitionLog,
    EP: EventPublisher,
    PG: PlatformGateway,
    BS: BackupStore,
{
    /// Create a new service backed by the given ports.
    pub fn new(
        repo: PR,
        lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
        backups: Arc<BackupService<BS, AR, TL, EP, PG>>,
        publisher: EP,
        policy: ApprovalPolicy,
        locks: Arc<AutomationLocks>,
    ) -> Self {
        Self {
            repo,
            lifecycle,
            backups,
            publisher,
            policy,
            locks,
        }
    }

    /// Submit a change proposal.
    ///
    /// Conflicting open requests are rejected, risk is classified from the
    /// payload, and requests the policy table marks hands-off are approved
    /// immediately under the `"policy"` actor.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Conflict`] when a competing PENDING request
    /// exists, [`GovError::NotFound`] when MODIFICATION/RETIREMENT names an
    /// unknown automation, [`GovError::Validation`] on malformed payloads,
    /// or any error from a failed auto-approval (the request then stays
    /// PENDING for a manual decision).
    #[tracing::instrument(skip(self, submission), fields(workflow = ?submission.workflow, requester = %submission.requester))]
    pub async fn submit(&self, submission: Submission) -> Result<ApprovalRequest, GovError> {
        let request = match submission.workflow {
            WorkflowKind::Creation => {
                let request = self.submit_creation(&submission)?;
                self.repo.create(request).await?
            }
            WorkflowKind::Modification | WorkflowKind::Retirement => {
                self.submit_change(&submission).await?
            }
        };

        let _ = self
            .publisher
            .publish(Event::new(
                EventKind::ApprovalSubmitted,
                Some(request.automation_id),
                serde_json::json!({
                    "request_id": request.id,
                    "workflow": request.workflow,
                    "risk": request.risk,
                    "requester": request.requester,
                }),
            ))
            .await;

        if self.policy.requires_manual_approval(request.risk) {
            return Ok(request);
        }
        let auto_note = format!("auto-approved (risk: {:?})", request.risk);
        self.approve(request.id, POLICY_ACTOR, Some(auto_note)).await
    }

    /// Submit an [`OptimizationSuggestion`] from the AI collaborator as a
    /// MODIFICATION request. The suggestion engine is just another
    /// requester identity to the workflow.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Validation`] for an out-of-range suggestion,
    /// plus everything [`Self::submit`] can return.
    pub async fn submit_suggestion(
        &self,
        automation_id: AutomationId,
        suggestion: &OptimizationSuggestion,
        requester: &str,
    ) -> Result<ApprovalRequest, GovError> {
        suggestion.validate()?;
        self.submit(Submission {
            workflow: WorkflowKind::Modification,
            automation_id: Some(automation_id),
            requester: requester.to_string(),
            payload: suggestion.to_submission_payload(),
        })
        .await
    }

    /// Approve a PENDING request and apply its change.
    ///
    /// Idempotent: a request that already reached a terminal status is
    /// returned as-is, and no second lifecycle transition is produced. On
    /// any failure applying the change the request stays PENDING and the
    /// error is surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown request, or any error
    /// from the backup or lifecycle step.
    #[tracing::instrument(skip(self, notes))]
    pub async fn approve(
        &self,
        request_id: RequestId,
        approver: &str,
        notes: Option<String>,
    ) -> Result<ApprovalRequest, GovError> {
        let request = self.load(request_id).await?;
        if request.status.is_terminal() {
            return Ok(request);
        }

        let _guard = self.locks.acquire(request.automation_id).await;
        // Re-read under the lock: a concurrent decision may have landed
        // while we waited.
        let mut request = self.load(request_id).await?;
        if request.status.is_terminal() {
            return Ok(request);
        }

        let metadata = serde_json::json!({"request_id": request.id});
        match request.workflow {
            WorkflowKind::Creation => {
                let automation = automation_from_payload(
                    request.automation_id,
                    &request.payload,
                    &request.requester,
                )?;
                self.lifecycle
                    .activate_new_locked(automation, "creation-approved", approver, metadata)
                    .await?;
            }
            WorkflowKind::Modification => {
                self.backups
                    .snapshot_locked(
                        request.automation_id,
                        BackupKind::BeforeModification,
                        approver,
                    )
                    .await?;
                let config = request
                    .payload
                    .get("config")
                    .cloned()
                    .ok_or(ValidationError::MissingConfig)?;
                self.lifecycle
                    .modify_locked(
                        request.automation_id,
                        config,
                        "modification-approved",
                        approver,
                        metadata,
                    )
                    .await?;
            }
            WorkflowKind::Retirement => {
                self.backups
                    .snapshot_locked(
                        request.automation_id,
                        BackupKind::BeforeModification,
                        approver,
                    )
                    .await?;
                self.lifecycle
                    .transition_locked(
                        request.automation_id,
                        LifecycleState::Retired,
                        "retirement-approved",
                        approver,
                        metadata,
                    )
                    .await?;
            }
        }

        request.approve(approver, notes, now());
        let request = self.repo.update(request).await?;
        self.publish_decision(&request).await;
        Ok(request)
    }

    /// Reject a PENDING request.
    ///
    /// Idempotent like [`Self::approve`].
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown request or
    /// [`GovError::Validation`] for an empty reason.
    #[tracing::instrument(skip(self, reason))]
    pub async fn reject(
        &self,
        request_id: RequestId,
        rejecter: &str,
        reason: String,
    ) -> Result<ApprovalRequest, GovError> {
        if reason.is_empty() {
            return Err(ValidationError::EmptyReason.into());
        }

        let request = self.load(request_id).await?;
        if request.status.is_terminal() {
            return Ok(request);
        }

        let _guard = self.locks.acquire(request.automation_id).await;
        let mut request = self.load(request_id).await?;
        if request.status.is_terminal() {
            return Ok(request);
        }

        request.reject(rejecter, reason, now());
        let request = self.repo.update(request).await?;
        self.publish_decision(&request).await;
        Ok(request)
    }

    /// Cancel a PENDING request. Only the original requester may cancel.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Authorization`] for anyone but the requester,
    /// [`GovError::AlreadyProcessing`] when a decision already landed, or
    /// [`GovError::NotFound`] for an unknown request. Cancelling an
    /// already-cancelled request is idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        request_id: RequestId,
        caller: &str,
    ) -> Result<ApprovalRequest, GovError> {
        let request = self.load(request_id).await?;
        check_cancellable(&request, caller)?;

        let _guard = self.locks.acquire(request.automation_id).await;
        let mut request = self.load(request_id).await?;
        check_cancellable(&request, caller)?;
        if request.status == ApprovalStatus::Cancelled {
            return Ok(request);
        }

        request.cancel(now());
        let request = self.repo.update(request).await?;
        self.publish_decision(&request).await;
        Ok(request)
    }

    /// Look up a request by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] when no request with `id` exists.
    pub async fn get_request(&self, id: RequestId) -> Result<ApprovalRequest, GovError> {
        self.load(id).await
    }

    /// All requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_requests(&self) -> Result<Vec<ApprovalRequest>, GovError> {
        self.repo.get_all().await
    }

    fn submit_creation(&self, submission: &Submission) -> Result<ApprovalRequest, GovError> {
        let name = submission
            .payload
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let platform_id = submission
            .payload
            .get("platform_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if platform_id.is_empty() {
            return Err(ValidationError::EmptyPlatformId.into());
        }
        if !submission.payload.get("config").is_some_and(serde_json::Value::is_object) {
            return Err(ValidationError::MissingConfig.into());
        }

        let risk = classify_risk(WorkflowKind::Creation, &submission.payload, None);
        // A retired automation reusing the same platform id is never
        // resurrected; every creation targets a fresh internal id.
        ApprovalRequest::new(
            AutomationId::new(),
            WorkflowKind::Creation,
            risk,
            submission.requester.clone(),
            submission.payload.clone(),
        )
    }

    async fn submit_change(&self, submission: &Submission) -> Result<ApprovalRequest, GovError> {
        let automation_id = submission
            .automation_id
            .ok_or(ValidationError::MissingAutomationId)?;
        if submission.workflow == WorkflowKind::Modification
            && !submission.payload.get("config").is_some_and(serde_json::Value::is_object)
        {
            return Err(ValidationError::MissingConfig.into());
        }

        // Conflict checks and the insert race against concurrent decisions;
        // serialize them with every other mutation of this automation.
        let _guard = self.locks.acquire(automation_id).await;

        let automation = self.lifecycle.get_automation(automation_id).await?;
        for open in self.repo.find_pending_for(automation_id).await? {
            if open.workflow.conflicts_with(submission.workflow) {
                return Err(ConflictError {
                    automation: automation_id.to_string(),
                    pending_request: open.id.to_string(),
                    pending_workflow: open.workflow,
                }
                .into());
            }
        }

        let risk = classify_risk(
            submission.workflow,
            &submission.payload,
            Some(&automation.metrics),
        );
        let request = ApprovalRequest::new(
            automation_id,
            submission.workflow,
            risk,
            submission.requester.clone(),
            submission.payload.clone(),
        )?;
        // Insert while still holding the lock so a concurrent conflicting
        // submission cannot slip past the check above.
        self.repo.create(request).await
    }

    async fn load(&self, id: RequestId) -> Result<ApprovalRequest, GovError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "ApprovalRequest",
                id: id.to_string(),
            }
            .into()
        })
    }

    async fn publish_decision(&self, request: &ApprovalRequest) {
        let _ = self
            .publisher
            .publish(Event::new(
                EventKind::ApprovalDecided,
                Some(request.automation_id),
                serde_json::json!({
                    "request_id": request.id,
                    "workflow": request.workflow,
                    "status": request.status,
                    "decided_by": request.decided_by,
                    "reason": request.decision_reason,
                    "emergency_stop": request.emergency_stop.is_some(),
                }),
            ))
            .await;
    }
}

/// Validate that `caller` may cancel `request` in its current status.
fn check_cancellable(request: &ApprovalRequest, caller: &str) -> Result<(), GovError> {
    match request.status {
        ApprovalStatus::Pending | ApprovalStatus::Cancelled => {
            if request.requester != caller {
                return Err(AuthorizationError {
                    action: "cancel approval request",
                    reason: "only the requester may cancel".to_string(),
                }
                .into());
            }
            Ok(())
        }
        status @ (ApprovalStatus::Approved | ApprovalStatus::Rejected) => {
            Err(AlreadyProcessingError {
                request: request.id.to_string(),
                status,
            }
            .into())
        }
    }
}

/// Build the automation a CREATION request describes.
fn automation_from_payload(
    id: AutomationId,
    payload: &serde_json::Value,
    requester: &str,
) -> Result<Automation, GovError> {
    Automation::builder()
        .id(id)
        .platform_id(
            payload
                .get("platform_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default(),
        )
        .name(
            payload
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default(),
        )
        .description(
            payload
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default(),
        )
        .config(payload.get("config").cloned().unwrap_or_else(|| serde_json::json!({})))
        .created_by(requester)
        .build()
}
