//! LifecycleTransition — an immutable audit record of one state change.
//!
//! Exactly one record exists per committed lifecycle transition, including
//! transitions forced by an emergency stop. Records are append-only and
//! strictly ordered per automation by `sequence`.

use serde::{Deserialize, Serialize};

use crate::automation::LifecycleState;
use crate::id::{AutomationId, TransitionId};
use crate::time::Timestamp;

/// One entry in an automation's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleTransition {
    pub id: TransitionId,
    pub automation_id: AutomationId,
    /// Monotonically increasing per automation, starting at 1.
    pub sequence: u64,
    pub previous: LifecycleState,
    pub next: LifecycleState,
    pub reason: String,
    pub actor: String,
    pub timestamp: Timestamp,
    /// Free-form context, e.g. the approval request id or stop event id.
    pub metadata: serde_json::Value,
}

impl LifecycleTransition {
    /// Build a new transition record stamped with the current time.
    #[must_use]
    pub fn new(
        automation_id: AutomationId,
        sequence: u64,
        previous: LifecycleState,
        next: LifecycleState,
        reason: impl Into<String>,
        actor: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: TransitionId::new(),
            automation_id,
            sequence,
            previous,
            next,
            reason: reason.into(),
            actor: actor.into(),
            timestamp: crate::time::now(),
            metadata,
        }
    }
}
