//! ApprovalRequest — the workflow record gating every automation change.
//!
//! A request is PENDING until exactly one decision lands. Decisions are
//! terminal; repeating one returns the existing outcome instead of erroring
//! so duplicate client retries stay harmless. A PENDING request can be
//! converted into an emergency-stop rejection instead of a normal decision.

use serde::{Deserialize, Serialize};

use crate::error::{GovError, ValidationError};
use crate::id::{AutomationId, RequestId};
use crate::time::Timestamp;

/// Which change the request proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Propose a brand-new automation.
    Creation,
    /// Replace the configuration of an existing automation.
    Modification,
    /// Permanently retire an existing automation.
    Retirement,
}

impl WorkflowKind {
    /// Whether two open requests for the same automation may not coexist.
    ///
    /// MODIFICATION and RETIREMENT both mutate an existing automation, so any
    /// pair of them (including two of the same kind) is conflicting. CREATION
    /// targets a fresh internal id and never conflicts.
    #[must_use]
    pub fn conflicts_with(self, other: Self) -> bool {
        !matches!(self, Self::Creation) && !matches!(other, Self::Creation)
    }
}

/// Decision state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    /// Whether the request has reached a decision and can never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Risk classification computed from the request payload at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Recorded when an emergency stop converts a PENDING request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyStopMark {
    pub at: Timestamp,
    pub reason: String,
}

/// A proposed change awaiting (or past) a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    /// The automation this request targets. For CREATION requests the id is
    /// allocated at submission; the automation row exists only once approved.
    pub automation_id: AutomationId,
    pub workflow: WorkflowKind,
    pub status: ApprovalStatus,
    pub risk: RiskLevel,
    pub requester: String,
    /// Workflow-specific payload: the proposed configuration for CREATION and
    /// MODIFICATION, free-form context for RETIREMENT.
    pub payload: serde_json::Value,
    pub submitted_at: Timestamp,
    pub decided_at: Option<Timestamp>,
    pub decided_by: Option<String>,
    pub decision_reason: Option<String>,
    /// Present when an emergency stop forced this request to REJECTED.
    pub emergency_stop: Option<EmergencyStopMark>,
}

impl ApprovalRequest {
    /// Build a new PENDING request.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Validation`] when `requester` is empty.
    pub fn new(
        automation_id: AutomationId,
        workflow: WorkflowKind,
        risk: RiskLevel,
        requester: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<Self, GovError> {
        let requester = requester.into();
        if requester.is_empty() {
            return Err(ValidationError::EmptyActor.into());
        }
        Ok(Self {
            id: RequestId::new(),
            automation_id,
            workflow,
            status: ApprovalStatus::Pending,
            risk,
            requester,
            payload,
            submitted_at: crate::time::now(),
            decided_at: None,
            decided_by: None,
            decision_reason: None,
            emergency_stop: None,
        })
    }

    /// Record an APPROVED decision.
    pub fn approve(&mut self, approver: &str, notes: Option<String>, at: Timestamp) {
        self.status = ApprovalStatus::Approved;
        self.decided_at = Some(at);
        self.decided_by = Some(approver.to_string());
        self.decision_reason = notes;
    }

    /// Record a REJECTED decision.
    pub fn reject(&mut self, rejecter: &str, reason: String, at: Timestamp) {
        self.status = ApprovalStatus::Rejected;
        self.decided_at = Some(at);
        self.decided_by = Some(rejecter.to_string());
        self.decision_reason = Some(reason);
    }

    /// Record a CANCELLED decision by the requester.
    pub fn cancel(&mut self, at: Timestamp) {
        self.status = ApprovalStatus::Cancelled;
        self.decided_at = Some(at);
        self.decided_by = Some(self.requester.clone());
    }

    /// Convert a PENDING request into an emergency-stop rejection.
    pub fn mark_emergency_stopped(&mut self, actor: &str, reason: &str, at: Timestamp) {
        self.emergency_stop = Some(EmergencyStopMark {
            at,
            reason: reason.to_string(),
        });
        self.reject(actor, format!("emergency stop: {reason}"), at);
    }
}
