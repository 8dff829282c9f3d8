//! Event — an immutable record of a governance fact.
//!
//! Events are produced whenever lifecycle state changes, approvals move,
//! emergency stops fire, or backups are written. They flow over the
//! in-process bus and are turned into client-facing notifications by the
//! dispatcher.

use serde::{Deserialize, Serialize};

use crate::id::{AutomationId, EventId};
use crate::time::Timestamp;

/// Category of a governance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An automation committed a lifecycle transition.
    LifecycleChanged,
    /// An approval request was submitted.
    ApprovalSubmitted,
    /// An approval request reached a terminal status.
    ApprovalDecided,
    /// An emergency stop was issued.
    EmergencyStopIssued,
    /// A stop event's recovery status changed.
    RecoveryProgressed,
    /// A configuration snapshot was written.
    BackupCreated,
}

/// A governance fact published on the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    /// The automation the event concerns; `None` for global facts
    /// (e.g. a global emergency stop).
    pub automation_id: Option<AutomationId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, automation_id: Option<AutomationId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            kind,
            automation_id,
            data,
            timestamp: crate::time::now(),
        }
    }
}
