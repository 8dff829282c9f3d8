//! EmergencyStopEvent — the audit record of an out-of-band halt.
//!
//! Created synchronously when a stop is issued. The recovery status is the
//! only field that may ever change afterwards; a stop itself cannot be
//! cancelled, only its recovery retried.

use serde::{Deserialize, Serialize};

use crate::error::InvalidStateError;
use crate::id::{AutomationId, StopEventId};
use crate::time::Timestamp;

/// How the stop was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    /// A human hit the button.
    Manual,
    /// A watchdog or policy fired.
    Automatic,
    /// Internal subsystem decision (e.g. escalated approval).
    System,
}

/// Progress of the post-stop recovery process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One automation that could not be stopped or recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopFailure {
    pub automation_id: AutomationId,
    pub error: String,
}

/// The record of one emergency stop operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyStopEvent {
    pub id: StopEventId,
    /// `None` means a global stop across all automations.
    pub automation_id: Option<AutomationId>,
    pub kind: StopKind,
    pub triggered_by: String,
    pub reason: String,
    /// Automations actually forced to INACTIVE.
    pub affected: Vec<AutomationId>,
    /// Automations that could not be stopped, with the error per id.
    pub failures: Vec<StopFailure>,
    pub recovery: RecoveryStatus,
    /// Failures from the most recent recovery attempt, per automation.
    pub recovery_failures: Vec<StopFailure>,
    pub triggered_at: Timestamp,
    pub recovered_at: Option<Timestamp>,
}

impl EmergencyStopEvent {
    /// Record a freshly-issued stop.
    #[must_use]
    pub fn new(
        automation_id: Option<AutomationId>,
        kind: StopKind,
        triggered_by: impl Into<String>,
        reason: impl Into<String>,
        affected: Vec<AutomationId>,
        failures: Vec<StopFailure>,
    ) -> Self {
        Self {
            id: StopEventId::new(),
            automation_id,
            kind,
            triggered_by: triggered_by.into(),
            reason: reason.into(),
            affected,
            failures,
            recovery: RecoveryStatus::Pending,
            recovery_failures: Vec::new(),
            triggered_at: crate::time::now(),
            recovered_at: None,
        }
    }

    /// Move recovery to IN_PROGRESS.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] unless recovery is PENDING or FAILED
    /// (FAILED recoveries may be retried).
    pub fn begin_recovery(&mut self) -> Result<(), InvalidStateError> {
        match self.recovery {
            RecoveryStatus::Pending | RecoveryStatus::Failed => {
                self.recovery = RecoveryStatus::InProgress;
                self.recovery_failures.clear();
                Ok(())
            }
            state => Err(InvalidStateError {
                subject: self.id.to_string(),
                state: format!("{state:?}"),
                operation: "begin recovery",
            }),
        }
    }

    /// Record the outcome of a recovery pass.
    pub fn finish_recovery(&mut self, failures: Vec<StopFailure>, at: Timestamp) {
        self.recovery = if failures.is_empty() {
            RecoveryStatus::Completed
        } else {
            RecoveryStatus::Failed
        };
        self.recovery_failures = failures;
        self.recovered_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_event() -> EmergencyStopEvent {
        EmergencyStopEvent::new(
            None,
            StopKind::Manual,
            "user:alice",
            "user panic",
            vec![AutomationId::new(), AutomationId::new()],
            Vec::new(),
        )
    }

    #[test]
    fn should_start_with_pending_recovery() {
        let event = stop_event();
        assert_eq!(event.recovery, RecoveryStatus::Pending);
        assert!(event.recovered_at.is_none());
        assert_eq!(event.affected.len(), 2);
    }

    #[test]
    fn should_progress_recovery_to_completed_when_no_failures() {
        let mut event = stop_event();
        event.begin_recovery().unwrap();
        assert_eq!(event.recovery, RecoveryStatus::InProgress);

        event.finish_recovery(Vec::new(), crate::time::now());
        assert_eq!(event.recovery, RecoveryStatus::Completed);
        assert!(event.recovered_at.is_some());
    }

    #[test]
    fn should_mark_recovery_failed_and_allow_retry() {
        let mut event = stop_event();
        event.begin_recovery().unwrap();
        event.finish_recovery(
            vec![StopFailure {
                automation_id: event.affected[0],
                error: "platform unreachable".to_string(),
            }],
            crate::time::now(),
        );
        assert_eq!(event.recovery, RecoveryStatus::Failed);
        assert_eq!(event.recovery_failures.len(), 1);

        // A failed recovery may be retried.
        event.begin_recovery().unwrap();
        assert_eq!(event.recovery, RecoveryStatus::InProgress);
        assert!(event.recovery_failures.is_empty());
    }

    #[test]
    fn should_reject_recovery_on_completed_event() {
        let mut event = stop_event();
        event.begin_recovery().unwrap();
        event.finish_recovery(Vec::new(), crate::time::now());

        let result = event.begin_recovery();
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_double_begin() {
        let mut event = stop_event();
        event.begin_recovery().unwrap();
        assert!(event.begin_recovery().is_err());
    }
}
