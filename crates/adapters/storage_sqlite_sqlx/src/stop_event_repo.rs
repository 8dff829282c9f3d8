//! `SQLite` implementation of [`StopEventRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use govhub_app::ports::StopEventRepository;
use govhub_domain::error::GovError;
use govhub_domain::id::StopEventId;
use govhub_domain::stop::EmergencyStopEvent;

use crate::codec;
use crate::error::StorageError;

struct Wrapper(EmergencyStopEvent);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<EmergencyStopEvent> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let automation_id: Option<String> = row.try_get("automation_id")?;
        let kind: String = row.try_get("kind")?;
        let affected: String = row.try_get("affected")?;
        let failures: String = row.try_get("failures")?;
        let recovery: String = row.try_get("recovery")?;
        let recovery_failures: String = row.try_get("recovery_failures")?;
        let triggered_at: String = row.try_get("triggered_at")?;
        let recovered_at: Option<String> = row.try_get("recovered_at")?;

        Ok(Self(EmergencyStopEvent {
            id: codec::parse_id(&id)?,
            automation_id: automation_id
                .as_deref()
                .map(codec::parse_id)
                .transpose()?,
            kind: codec::from_json(&kind)?,
            triggered_by: row.try_get("triggered_by")?,
            reason: row.try_get("reason")?,
            affected: codec::from_json(&affected)?,
            failures: codec::from_json(&failures)?,
            recovery: codec::from_json(&recovery)?,
            recovery_failures: codec::from_json(&recovery_failures)?,
            triggered_at: codec::parse_timestamp(&triggered_at)?,
            recovered_at: codec::parse_optional_timestamp(recovered_at)?,
        }))
    }
}

/// `SQLite`-backed emergency stop event repository.
pub struct SqliteStopEventRepository {
    pool: SqlitePool,
}

impl SqliteStopEventRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl StopEventRepository for SqliteStopEventRepository {
    async fn create(&self, event: EmergencyStopEvent) -> Result<EmergencyStopEvent, GovError> {
        let kind = codec::to_json(&event.kind)?;
        let affected = codec::to_json(&event.affected)?;
        let failures = codec::to_json(&event.failures)?;
        let recovery = codec::to_json(&event.recovery)?;
        let recovery_failures = codec::to_json(&event.recovery_failures)?;

        sqlx::query(
            "INSERT INTO emergency_stop_events (id, automation_id, kind, triggered_by, \
             reason, affected, failures, recovery, recovery_failures, triggered_at, \
             recovered_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(event.automation_id.map(|id| id.to_string()))
        .bind(&kind)
        .bind(&event.triggered_by)
        .bind(&event.reason)
        .bind(&affected)
        .bind(&failures)
        .bind(&recovery)
        .bind(&recovery_failures)
        .bind(event.triggered_at.to_rfc3339())
        .bind(event.recovered_at.map(|ts| ts.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(event)
    }

    async fn get_by_id(&self, id: StopEventId) -> Result<Option<EmergencyStopEvent>, GovError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT * FROM emergency_stop_events WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    #[allow(clippy::cast_possible_wrap)]
    async fn get_recent(&self, limit: usize) -> Result<Vec<EmergencyStopEvent>, GovError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM emergency_stop_events ORDER BY triggered_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, event: EmergencyStopEvent) -> Result<EmergencyStopEvent, GovError> {
        let recovery = codec::to_json(&event.recovery)?;
        let recovery_failures = codec::to_json(&event.recovery_failures)?;

        // Recovery progress is the only permitted mutation.
        sqlx::query(
            "UPDATE emergency_stop_events SET recovery = ?, recovery_failures = ?, \
             recovered_at = ? WHERE id = ?",
        )
        .bind(&recovery)
        .bind(&recovery_failures)
        .bind(event.recovered_at.map(|ts| ts.to_rfc3339()))
        .bind(event.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation_repo::tests::memory_pool;
    use govhub_domain::id::AutomationId;
    use govhub_domain::stop::{RecoveryStatus, StopFailure, StopKind};
    use govhub_domain::time::now;

    fn stop_event() -> EmergencyStopEvent {
        EmergencyStopEvent::new(
            None,
            StopKind::Manual,
            "user:alice",
            "burst pipe",
            vec![AutomationId::new(), AutomationId::new()],
            vec![StopFailure {
                automation_id: AutomationId::new(),
                error: "platform unreachable".to_string(),
            }],
        )
    }

    #[tokio::test]
    async fn should_create_and_retrieve_event_with_lists() {
        let repo = SqliteStopEventRepository::new(memory_pool().await);
        let event = stop_event();
        let id = event.id;

        repo.create(event).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert!(fetched.automation_id.is_none());
        assert_eq!(fetched.affected.len(), 2);
        assert_eq!(fetched.failures.len(), 1);
        assert_eq!(fetched.recovery, RecoveryStatus::Pending);
    }

    #[tokio::test]
    async fn should_return_none_when_event_not_found() {
        let repo = SqliteStopEventRepository::new(memory_pool().await);
        let result = repo.get_by_id(StopEventId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_persist_recovery_progress() {
        let repo = SqliteStopEventRepository::new(memory_pool().await);
        let mut event = stop_event();
        let id = event.id;
        repo.create(event.clone()).await.unwrap();

        event.begin_recovery().unwrap();
        event.finish_recovery(Vec::new(), now());
        repo.update(event).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.recovery, RecoveryStatus::Completed);
        assert!(fetched.recovered_at.is_some());
    }

    #[tokio::test]
    async fn should_list_recent_events_with_limit() {
        let repo = SqliteStopEventRepository::new(memory_pool().await);
        for _ in 0..3 {
            repo.create(stop_event()).await.unwrap();
        }

        let events = repo.get_recent(2).await.unwrap();
        assert_eq!(events.len(), 2);
    }
}
