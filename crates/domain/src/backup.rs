//! Backup — an immutable snapshot of an automation's configuration.
//!
//! A snapshot is written automatically before any MODIFICATION or RETIREMENT
//! is applied, and on demand. Retention prunes the oldest snapshots beyond
//! the configured count or age, always after a successful new write.

use serde::{Deserialize, Serialize};

use crate::id::{AutomationId, BackupId};
use crate::time::Timestamp;

/// Why the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Scheduled or policy-driven.
    Automatic,
    /// Requested explicitly by a user.
    Manual,
    /// Taken by the approval workflow immediately before applying a change.
    BeforeModification,
}

/// One stored configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub id: BackupId,
    pub automation_id: AutomationId,
    pub kind: BackupKind,
    /// Full configuration at snapshot time, opaque to govhub.
    pub config: serde_json::Value,
    /// Serialized size of `config`, for retention accounting.
    pub size_bytes: u64,
    pub created_by: String,
    pub created_at: Timestamp,
}

impl Backup {
    /// Snapshot the given configuration.
    #[must_use]
    pub fn capture(
        automation_id: AutomationId,
        kind: BackupKind,
        config: serde_json::Value,
        created_by: impl Into<String>,
    ) -> Self {
        let size_bytes = config.to_string().len() as u64;
        Self {
            id: BackupId::new(),
            automation_id,
            kind,
            config,
            size_bytes,
            created_by: created_by.into(),
            created_at: crate::time::now(),
        }
    }
}

/// Retention limits applied after each successful snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep at most this many snapshots per automation, `None` = unbounded.
    pub max_count: Option<usize>,
    /// Drop snapshots older than this many days, `None` = keep forever.
    pub max_age_days: Option<u32>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_count: Some(10),
            max_age_days: Some(90),
        }
    }
}
