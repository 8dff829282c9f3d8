//! Backup store port — persistence for configuration snapshots.

use std::future::Future;

use govhub_domain::backup::Backup;
use govhub_domain::error::GovError;
use govhub_domain::id::{AutomationId, BackupId};

/// Repository for persisting and querying [`Backup`]s.
pub trait BackupStore {
    /// Persist a new snapshot.
    fn insert(&self, backup: Backup) -> impl Future<Output = Result<Backup, GovError>> + Send;

    /// Get a snapshot by its unique identifier.
    fn get_by_id(
        &self,
        id: BackupId,
    ) -> impl Future<Output = Result<Option<Backup>, GovError>> + Send;

    /// All snapshots for one automation, newest first.
    fn list_for(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<Vec<Backup>, GovError>> + Send;

    /// Remove one snapshot (retention pruning).
    fn delete(&self, id: BackupId) -> impl Future<Output = Result<(), GovError>> + Send;
}
