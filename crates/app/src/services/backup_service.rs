//! Backup service — configuration snapshots and rollback.
//!
//! A snapshot is taken automatically by the approval workflow before any
//! modification or retirement is applied, and on demand. Retention never
//! deletes before the new snapshot is safely written, so there is no window
//! with zero backups.

use std::sync::Arc;

use govhub_domain::backup::{Backup, BackupKind, RetentionPolicy};
use govhub_domain::error::{GovError, IntegrityError, NotFoundError};
use govhub_domain::event::{Event, EventKind};
use govhub_domain::id::{AutomationId, BackupId};
use govhub_domain::time::now;

use crate::locks::AutomationLocks;
use crate::ports::{
    AutomationRepository, BackupStore, EventPublisher, PlatformGateway, TransitionLog,
};
use crate::services::lifecycle_service::LifecycleService;

/// Application service for snapshotting and restoring configurations.
pub struct BackupService<BS, AR, TL, EP, PG> {
    store: BS,
    lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
    publisher: EP,
    retention: RetentionPolicy,
    locks: Arc<AutomationLocks>,
}

impl<BS, AR, TL, EP, PG> BackupService<BS, AR, TL, EP, PG>
where
    BS: BackupStore,
    AR: AutomationRepository,
    TL: TransitionLog,
    EP: EventPublisher,
    PG: PlatformGateway,
{
    /// Create a new service backed by the given ports.
    pub fn new(
        store: BS,
        lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
        publisher: EP,
        retention: RetentionPolicy,
        locks: Arc<AutomationLocks>,
    ) -> Self {
        Self {
            store,
            lifecycle,
            publisher,
            retention,
            locks,
        }
    }

    /// Snapshot an automation's current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown automation, or a
    /// storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn snapshot(
        &self,
        id: AutomationId,
        kind: BackupKind,
        created_by: &str,
    ) -> Result<Backup, GovError> {
        let _guard = self.locks.acquire(id).await;
        self.snapshot_locked(id, kind, created_by).await
    }

    /// Snapshot body for callers that already hold the automation's lock
    /// (the approval workflow, just before it applies a change).
    pub(crate) async fn snapshot_locked(
        &self,
        id: AutomationId,
        kind: BackupKind,
        created_by: &str,
    ) -> Result<Backup, GovError> {
        let automation = self.lifecycle.get_automation(id).await?;
        let backup = Backup::capture(id, kind, automation.config.clone(), created_by);
        let stored = self.store.insert(backup).await?;

        let _ = self
            .publisher
            .publish(Event::new(
                EventKind::BackupCreated,
                Some(id),
                serde_json::json!({
                    "backup_id": stored.id,
                    "kind": stored.kind,
                    "size_bytes": stored.size_bytes,
                }),
            ))
            .await;

        // Retention runs only after the new snapshot is durable.
        if let Err(err) = self.enforce_retention(id).await {
            tracing::warn!(automation = %id, error = %err, "backup retention pruning failed");
        }

        Ok(stored)
    }

    /// Roll an automation back to a stored snapshot.
    ///
    /// The restore applies through the lifecycle engine as a modification
    /// transition with reason `"rollback"`; if anything fails the automation
    /// is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] when the backup does not exist or
    /// belongs to a different automation, [`GovError::Integrity`] when the
    /// stored blob fails validation, or any lifecycle transition error.
    #[tracing::instrument(skip(self))]
    pub async fn restore(
        &self,
        automation_id: AutomationId,
        backup_id: BackupId,
        actor: &str,
    ) -> Result<Backup, GovError> {
        let _guard = self.locks.acquire(automation_id).await;

        let backup = self.store.get_by_id(backup_id).await?.ok_or_else(|| {
            GovError::from(NotFoundError {
                entity: "Backup",
                id: backup_id.to_string(),
            })
        })?;
        if backup.automation_id != automation_id {
            return Err(NotFoundError {
                entity: "Backup",
                id: backup_id.to_string(),
            }
            .into());
        }
        if !backup.config.is_object() {
            return Err(IntegrityError {
                backup: backup_id.to_string(),
                reason: "stored configuration is not a JSON object".to_string(),
            }
            .into());
        }

        self.lifecycle
            .modify_locked(
                automation_id,
                backup.config.clone(),
                "rollback",
                actor,
                serde_json::json!({"backup_id": backup.id}),
            )
            .await?;

        Ok(backup)
    }

    /// All snapshots for one automation, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn list_backups(&self, automation_id: AutomationId) -> Result<Vec<Backup>, GovError> {
        self.store.list_for(automation_id).await
    }

    /// Delete everything the retention policy no longer wants: snapshots
    /// beyond the per-automation count cap and snapshots past the age cap.
    async fn enforce_retention(&self, automation_id: AutomationId) -> Result<(), GovError> {
        let backups = self.store.list_for(automation_id).await?;
        let cutoff = self
            .retention
            .max_age_days
            .map(|days| now() - chrono::Duration::days(i64::from(days)));

        for (index, backup) in backups.iter().enumerate() {
            let beyond_count = self.retention.max_count.is_some_and(|max| index >= max);
            let beyond_age = cutoff.is_some_and(|cutoff| backup.created_at < cutoff);
            if beyond_count || beyond_age {
                self.store.delete(backup.id).await?;
                tracing::debug!(automation = %automation_id, backup = %backup.id, "pruned backup");
            }
        }
        Ok(())
    }
}
