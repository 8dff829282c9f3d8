//! Externally-shaped notification messages.
//!
//! The dispatcher is the only producer of these; every client-facing update
//! carries the same shape: topic, resource id, new status, a human-readable
//! summary, and the commit timestamp of the underlying event.

use serde::Serialize;

use govhub_domain::event::{Event, EventKind};
use govhub_domain::id::AutomationId;
use govhub_domain::time::Timestamp;

use super::broker::Topic;

/// One client-facing update message.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub topic: Topic,
    pub automation_id: Option<AutomationId>,
    pub status: String,
    pub summary: String,
    pub timestamp: Timestamp,
}

impl Notification {
    /// Translate a bus event into its client-facing shape.
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        let (topic, status, summary) = match event.kind {
            EventKind::LifecycleChanged => {
                let next = text(&event.data, "next");
                let name = text(&event.data, "name");
                let reason = text(&event.data, "reason");
                (
                    Topic::Lifecycle,
                    next.to_string(),
                    format!("Automation '{name}' is now {next} ({reason})"),
                )
            }
            EventKind::ApprovalSubmitted => {
                let workflow = text(&event.data, "workflow");
                let requester = text(&event.data, "requester");
                (
                    Topic::Approval,
                    "pending".to_string(),
                    format!("{requester} proposed a {workflow} change"),
                )
            }
            EventKind::ApprovalDecided => {
                let status = text(&event.data, "status");
                let decided_by = text(&event.data, "decided_by");
                (
                    Topic::Approval,
                    status.to_string(),
                    format!("Approval request {status} by {decided_by}"),
                )
            }
            EventKind::EmergencyStopIssued => {
                let reason = text(&event.data, "reason");
                (
                    Topic::Emergency,
                    "stopped".to_string(),
                    format!("Emergency stop issued: {reason}"),
                )
            }
            EventKind::RecoveryProgressed => {
                let recovery = text(&event.data, "recovery");
                (
                    Topic::Emergency,
                    recovery.to_string(),
                    format!("Emergency stop recovery is {recovery}"),
                )
            }
            EventKind::BackupCreated => (
                Topic::Backup,
                "created".to_string(),
                "Configuration snapshot written".to_string(),
            ),
        };

        Self {
            topic,
            automation_id: event.automation_id,
            status,
            summary,
            timestamp: event.timestamp,
        }
    }
}

fn text<'a>(data: &'a serde_json::Value, key: &str) -> &'a str {
    data.get(key).and_then(serde_json::Value::as_str).unwrap_or("unknown")
}
