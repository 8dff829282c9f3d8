//! Common error types used across the workspace.
//!
//! Every layer converts its own typed errors into [`GovError`] via `#[from]`.
//! Business-rule violations carry enough context to produce a human-readable
//! reason for the caller; they are surfaced verbatim, never silently recovered.

use crate::approval::{ApprovalStatus, WorkflowKind};
use crate::automation::LifecycleState;
use crate::stop::StopFailure;

/// Top-level error for the govhub workspace.
#[derive(Debug, thiserror::Error)]
pub enum GovError {
    /// A domain invariant was violated while constructing or mutating a record.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced automation, request, backup, or stop event does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A lifecycle edge that the state machine does not allow.
    #[error("invalid lifecycle transition")]
    InvalidTransition(#[from] InvalidTransitionError),

    /// An operation applied to a record in a state that cannot accept it.
    #[error("invalid state")]
    InvalidState(#[from] InvalidStateError),

    /// A competing PENDING approval request blocks this submission.
    #[error("conflicting approval request")]
    Conflict(#[from] ConflictError),

    /// Credentials could not be verified. The connection stays open for retry.
    #[error("authentication failed")]
    Authentication(#[from] AuthenticationError),

    /// The authenticated identity may not perform this action.
    #[error("not authorized")]
    Authorization(#[from] AuthorizationError),

    /// A message budget was exhausted. The message is dropped, the
    /// connection stays open.
    #[error("rate limit exceeded")]
    RateLimit(#[from] RateLimitError),

    /// A stored snapshot failed validation on read. Nothing was applied.
    #[error("integrity check failed")]
    Integrity(#[from] IntegrityError),

    /// A real-time delivery failure. The session is unregistered; automation
    /// state is unaffected.
    #[error("transport failure")]
    Transport(#[from] TransportError),

    /// The request already reached a terminal state and cannot be cancelled.
    #[error("request already processed")]
    AlreadyProcessing(#[from] AlreadyProcessingError),

    /// A bulk emergency stop where some automations failed. Per-automation
    /// failures are collected, never dropped.
    #[error("partial failure")]
    PartialFailure(#[from] PartialFailureError),

    /// The home-automation platform rejected or failed the requested change.
    /// The transition is rolled back, never partially applied.
    #[error("platform gateway failure")]
    Platform(#[from] PlatformGatewayError),

    /// An error propagated from the persistence adapter.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A name field was empty.
    #[error("name must not be empty")]
    EmptyName,
    /// A platform identifier was empty.
    #[error("platform id must not be empty")]
    EmptyPlatformId,
    /// An actor/requester field was empty.
    #[error("actor must not be empty")]
    EmptyActor,
    /// A reason field was empty where one is required.
    #[error("reason must not be empty")]
    EmptyReason,
    /// A suggestion confidence outside 0..=100.
    #[error("confidence must be between 0 and 100, got {0}")]
    ConfidenceOutOfRange(u8),
    /// A workflow submission that must name an existing automation did not.
    #[error("automation id is required for this workflow")]
    MissingAutomationId,
    /// A creation/modification payload without a `config` object.
    #[error("payload must carry a config object")]
    MissingConfig,
}

/// A referenced record does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Record kind, e.g. `"Automation"`.
    pub entity: &'static str,
    /// Stringified identifier.
    pub id: String,
}

/// An edge the lifecycle state machine does not allow.
#[derive(Debug, thiserror::Error)]
#[error("automation {automation}: illegal transition {from} -> {to}")]
pub struct InvalidTransitionError {
    pub automation: String,
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// An operation applied to a record whose current state cannot accept it.
#[derive(Debug, thiserror::Error)]
#[error("{subject} is {state}, cannot {operation}")]
pub struct InvalidStateError {
    /// Stringified identifier of the record.
    pub subject: String,
    /// Current state, rendered for the caller.
    pub state: String,
    /// The rejected operation.
    pub operation: &'static str,
}

/// A competing PENDING request for the same automation.
#[derive(Debug, thiserror::Error)]
#[error("automation {automation} already has a pending {pending_workflow:?} request ({pending_request})")]
pub struct ConflictError {
    pub automation: String,
    pub pending_request: String,
    pub pending_workflow: WorkflowKind,
}

/// Credential verification failure.
#[derive(Debug, thiserror::Error)]
#[error("authentication failed: {reason}")]
pub struct AuthenticationError {
    pub reason: String,
}

/// The identity is known but not allowed to perform the action.
#[derive(Debug, thiserror::Error)]
#[error("not authorized to {action}: {reason}")]
pub struct AuthorizationError {
    pub action: &'static str,
    pub reason: String,
}

/// Which budget a rate-limited sender exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    /// Per-session message budget.
    Session,
    /// Per-origin message budget.
    Origin,
    /// Per-origin concurrent connection cap.
    Connections,
}

/// A fixed-window budget was exhausted.
#[derive(Debug, thiserror::Error)]
#[error("rate limit exceeded ({scope:?} budget {limit}), retry in {retry_after_secs}s")]
pub struct RateLimitError {
    pub scope: RateLimitScope,
    pub limit: u32,
    pub retry_after_secs: u64,
}

/// A stored backup blob failed validation on read.
#[derive(Debug, thiserror::Error)]
#[error("backup {backup} failed integrity check: {reason}")]
pub struct IntegrityError {
    pub backup: String,
    pub reason: String,
}

/// A real-time delivery failure to one session.
#[derive(Debug, thiserror::Error)]
#[error("delivery to session {session} failed: {reason}")]
pub struct TransportError {
    pub session: String,
    pub reason: String,
}

/// A failure reported by the external home-automation platform.
#[derive(Debug, Clone, thiserror::Error)]
#[error("platform call failed: {message}")]
pub struct PlatformGatewayError {
    /// Transient failures are retried a small bounded number of times
    /// before surfacing; permanent ones surface immediately.
    pub transient: bool,
    pub message: String,
}

/// Cancellation raced against an already-applied decision.
#[derive(Debug, thiserror::Error)]
#[error("request {request} is already {status:?}")]
pub struct AlreadyProcessingError {
    pub request: String,
    pub status: ApprovalStatus,
}

/// Some automations in a bulk stop could not be processed.
#[derive(Debug, thiserror::Error)]
#[error("{} automation(s) failed", .failures.len())]
pub struct PartialFailureError {
    pub failures: Vec<StopFailure>,
}
