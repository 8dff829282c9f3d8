//! `SQLite` implementation of [`TransitionLog`].
//!
//! Read-only: rows are appended exclusively through the automation
//! repository's transactional commits.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use govhub_app::ports::TransitionLog;
use govhub_domain::error::GovError;
use govhub_domain::id::AutomationId;
use govhub_domain::transition::LifecycleTransition;

use crate::codec;
use crate::error::StorageError;

struct Wrapper(LifecycleTransition);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let automation_id: String = row.try_get("automation_id")?;
        let sequence: i64 = row.try_get("sequence")?;
        let previous: String = row.try_get("previous")?;
        let next: String = row.try_get("next")?;
        let timestamp: String = row.try_get("timestamp")?;
        let metadata: String = row.try_get("metadata")?;

        #[allow(clippy::cast_sign_loss)]
        Ok(Self(LifecycleTransition {
            id: codec::parse_id(&id)?,
            automation_id: codec::parse_id(&automation_id)?,
            sequence: sequence as u64,
            previous: codec::from_json(&previous)?,
            next: codec::from_json(&next)?,
            reason: row.try_get("reason")?,
            actor: row.try_get("actor")?,
            timestamp: codec::parse_timestamp(&timestamp)?,
            metadata: codec::from_json(&metadata)?,
        }))
    }
}

/// `SQLite`-backed transition log.
pub struct SqliteTransitionLog {
    pool: SqlitePool,
}

impl SqliteTransitionLog {
    /// Create a new log backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TransitionLog for SqliteTransitionLog {
    async fn list_for(
        &self,
        automation_id: AutomationId,
    ) -> Result<Vec<LifecycleTransition>, GovError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM lifecycle_transitions WHERE automation_id = ? ORDER BY sequence",
        )
        .bind(automation_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    #[allow(clippy::cast_sign_loss)]
    async fn count_for(&self, automation_id: AutomationId) -> Result<u64, GovError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM lifecycle_transitions WHERE automation_id = ?",
        )
        .bind(automation_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(count as u64)
    }

    #[allow(clippy::cast_sign_loss)]
    async fn next_sequence(&self, automation_id: AutomationId) -> Result<u64, GovError> {
        let (max,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequence), 0) FROM lifecycle_transitions WHERE automation_id = ?",
        )
        .bind(automation_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(max as u64 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation_repo::tests::{memory_pool, valid_automation};
    use crate::automation_repo::{SqliteAutomationRepository, insert_transition};
    use govhub_app::ports::AutomationRepository;
    use govhub_domain::automation::LifecycleState;

    async fn seeded(pool: &SqlitePool) -> AutomationId {
        let repo = SqliteAutomationRepository::new(pool.clone());
        let mut automation = valid_automation();
        automation.state = LifecycleState::Active;
        let id = automation.id;
        let transition = LifecycleTransition::new(
            id,
            1,
            LifecycleState::PendingApproval,
            LifecycleState::Active,
            "creation-approved",
            "policy",
            serde_json::json!({}),
        );
        repo.create_with_transition(automation, transition)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn should_list_transitions_in_sequence_order() {
        let pool = memory_pool().await;
        let id = seeded(&pool).await;

        let second = LifecycleTransition::new(
            id,
            2,
            LifecycleState::Active,
            LifecycleState::Inactive,
            "user panic",
            "user:alice",
            serde_json::json!({"emergency_stop": true}),
        );
        let mut conn = pool.acquire().await.unwrap();
        insert_transition(&mut conn, &second).await.unwrap();

        let log = SqliteTransitionLog::new(pool);
        let transitions = log.list_for(id).await.unwrap();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].sequence, 1);
        assert_eq!(transitions[1].sequence, 2);
        assert_eq!(transitions[1].metadata["emergency_stop"], true);
    }

    #[tokio::test]
    async fn should_count_and_hand_out_next_sequence() {
        let pool = memory_pool().await;
        let id = seeded(&pool).await;
        let log = SqliteTransitionLog::new(pool);

        assert_eq!(log.count_for(id).await.unwrap(), 1);
        assert_eq!(log.next_sequence(id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn should_start_sequences_at_one_for_unknown_automation() {
        let pool = memory_pool().await;
        let log = SqliteTransitionLog::new(pool);
        assert_eq!(log.next_sequence(AutomationId::new()).await.unwrap(), 1);
        assert_eq!(log.count_for(AutomationId::new()).await.unwrap(), 0);
    }
}
