//! `SQLite` implementation of [`AutomationRepository`].
//!
//! The `*_with_transition` methods run the automation write and the audit
//! append inside one sqlx transaction — this is the atomic commit boundary
//! the lifecycle engine relies on.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use govhub_app::ports::AutomationRepository;
use govhub_domain::automation::{Automation, ExecutionMetrics};
use govhub_domain::error::GovError;
use govhub_domain::id::AutomationId;
use govhub_domain::transition::LifecycleTransition;

use crate::codec;
use crate::error::StorageError;

pub(crate) struct Wrapper(pub(crate) Automation);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Automation> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let state: String = row.try_get("state")?;
        let config: String = row.try_get("config")?;
        let execution_count: i64 = row.try_get("execution_count")?;
        let success_count: i64 = row.try_get("success_count")?;
        let average_duration_ms: f64 = row.try_get("average_duration_ms")?;
        let version: i64 = row.try_get("version")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        #[allow(clippy::cast_sign_loss)]
        Ok(Self(Automation {
            id: codec::parse_id(&id)?,
            platform_id: row.try_get("platform_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            state: codec::from_json(&state)?,
            config: codec::from_json(&config)?,
            metrics: ExecutionMetrics {
                execution_count: execution_count as u64,
                success_count: success_count as u64,
                average_duration_ms,
            },
            version: version as u64,
            enabled: row.try_get("enabled")?,
            created_at: codec::parse_timestamp(&created_at)?,
            created_by: row.try_get("created_by")?,
            updated_at: codec::parse_timestamp(&updated_at)?,
            updated_by: row.try_get("updated_by")?,
        }))
    }
}

/// `SQLite`-backed automation repository.
pub struct SqliteAutomationRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[allow(clippy::cast_possible_wrap)]
async fn insert_automation(
    conn: &mut SqliteConnection,
    automation: &Automation,
) -> Result<(), StorageError> {
    let state = codec::to_json(&automation.state)?;
    let config = codec::to_json(&automation.config)?;

    sqlx::query(
        "INSERT INTO automations (id, platform_id, name, description, state, config, \
         execution_count, success_count, average_duration_ms, version, enabled, \
         created_at, created_by, updated_at, updated_by) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(automation.id.to_string())
    .bind(&automation.platform_id)
    .bind(&automation.name)
    .bind(&automation.description)
    .bind(&state)
    .bind(&config)
    .bind(automation.metrics.execution_count as i64)
    .bind(automation.metrics.success_count as i64)
    .bind(automation.metrics.average_duration_ms)
    .bind(automation.version as i64)
    .bind(automation.enabled)
    .bind(automation.created_at.to_rfc3339())
    .bind(&automation.created_by)
    .bind(automation.updated_at.to_rfc3339())
    .bind(&automation.updated_by)
    .execute(conn)
    .await?;
    Ok(())
}

#[allow(clippy::cast_possible_wrap)]
async fn update_automation(
    conn: &mut SqliteConnection,
    automation: &Automation,
) -> Result<(), StorageError> {
    let state = codec::to_json(&automation.state)?;
    let config = codec::to_json(&automation.config)?;

    sqlx::query(
        "UPDATE automations SET platform_id = ?, name = ?, description = ?, state = ?, \
         config = ?, execution_count = ?, success_count = ?, average_duration_ms = ?, \
         version = ?, enabled = ?, updated_at = ?, updated_by = ? WHERE id = ?",
    )
    .bind(&automation.platform_id)
    .bind(&automation.name)
    .bind(&automation.description)
    .bind(&state)
    .bind(&config)
    .bind(automation.metrics.execution_count as i64)
    .bind(automation.metrics.success_count as i64)
    .bind(automation.metrics.average_duration_ms)
    .bind(automation.version as i64)
    .bind(automation.enabled)
    .bind(automation.updated_at.to_rfc3339())
    .bind(&automation.updated_by)
    .bind(automation.id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) async fn insert_transition(
    conn: &mut SqliteConnection,
    transition: &LifecycleTransition,
) -> Result<(), StorageError> {
    let previous = codec::to_json(&transition.previous)?;
    let next = codec::to_json(&transition.next)?;
    let metadata = codec::to_json(&transition.metadata)?;

    sqlx::query(
        "INSERT INTO lifecycle_transitions (id, automation_id, sequence, previous, next, \
         reason, actor, timestamp, metadata) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(transition.id.to_string())
    .bind(transition.automation_id.to_string())
    .bind(transition.sequence as i64)
    .bind(&previous)
    .bind(&next)
    .bind(&transition.reason)
    .bind(&transition.actor)
    .bind(transition.timestamp.to_rfc3339())
    .bind(&metadata)
    .execute(conn)
    .await?;
    Ok(())
}

impl AutomationRepository for SqliteAutomationRepository {
    async fn create_with_transition(
        &self,
        automation: Automation,
        transition: LifecycleTransition,
    ) -> Result<Automation, GovError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        insert_automation(&mut tx, &automation).await?;
        insert_transition(&mut tx, &transition).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(automation)
    }

    async fn update_with_transition(
        &self,
        automation: Automation,
        transition: LifecycleTransition,
    ) -> Result<Automation, GovError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        update_automation(&mut tx, &automation).await?;
        insert_transition(&mut tx, &transition).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(automation)
    }

    async fn update(&self, automation: Automation) -> Result<Automation, GovError> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        update_automation(&mut conn, &automation).await?;
        Ok(automation)
    }

    async fn get_by_id(&self, id: AutomationId) -> Result<Option<Automation>, GovError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM automations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Automation>, GovError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM automations ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::Config;
    use govhub_domain::automation::LifecycleState;

    pub(crate) async fn memory_pool() -> SqlitePool {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        db.pool().clone()
    }

    pub(crate) fn valid_automation() -> Automation {
        Automation::builder()
            .platform_id("automation.porch_light")
            .name("Porch light at dusk")
            .config(serde_json::json!({"trigger": "dusk"}))
            .created_by("user:alice")
            .build()
            .unwrap()
    }

    fn first_transition(automation: &Automation) -> LifecycleTransition {
        LifecycleTransition::new(
            automation.id,
            1,
            LifecycleState::PendingApproval,
            LifecycleState::Active,
            "creation-approved",
            "policy",
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn should_create_automation_and_transition_atomically() {
        let pool = memory_pool().await;
        let repo = SqliteAutomationRepository::new(pool.clone());
        let mut automation = valid_automation();
        automation.state = LifecycleState::Active;
        let id = automation.id;

        repo.create_with_transition(automation.clone(), first_transition(&automation))
            .await
            .unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Porch light at dusk");
        assert_eq!(fetched.state, LifecycleState::Active);

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM lifecycle_transitions WHERE automation_id = ?",
        )
        .bind(id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn should_roll_back_automation_write_when_transition_insert_fails() {
        let pool = memory_pool().await;
        let repo = SqliteAutomationRepository::new(pool.clone());
        let mut automation = valid_automation();
        automation.state = LifecycleState::Active;
        let id = automation.id;

        repo.create_with_transition(automation.clone(), first_transition(&automation))
            .await
            .unwrap();

        // A second transition reusing sequence 1 violates the unique
        // constraint; the automation update in the same transaction must
        // not survive.
        let mut changed = automation.clone();
        changed.name = "Should not persist".to_string();
        changed.version = 1;
        let duplicate = first_transition(&automation);
        let result = repo.update_with_transition(changed, duplicate).await;

        assert!(result.is_err());
        let unchanged = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(unchanged.name, "Porch light at dusk");
        assert_eq!(unchanged.version, 0);
    }

    #[tokio::test]
    async fn should_return_none_when_automation_not_found() {
        let pool = memory_pool().await;
        let repo = SqliteAutomationRepository::new(pool);
        let result = repo.get_by_id(AutomationId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_update_metrics_without_transition() {
        let pool = memory_pool().await;
        let repo = SqliteAutomationRepository::new(pool);
        let mut automation = valid_automation();
        automation.state = LifecycleState::Active;
        let id = automation.id;
        repo.create_with_transition(automation.clone(), first_transition(&automation))
            .await
            .unwrap();

        let mut fetched = repo.get_by_id(id).await.unwrap().unwrap();
        fetched.record_execution(true, 150, govhub_domain::time::now());
        repo.update(fetched).await.unwrap();

        let updated = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(updated.metrics.execution_count, 1);
        assert_eq!(updated.metrics.success_count, 1);
        assert!((updated.metrics.average_duration_ms - 150.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn should_preserve_config_through_roundtrip() {
        let pool = memory_pool().await;
        let repo = SqliteAutomationRepository::new(pool);
        let mut automation = valid_automation();
        automation.state = LifecycleState::Active;
        automation.config = serde_json::json!({
            "trigger": "dusk",
            "actions": [{"service": "light.turn_on", "brightness": 128}],
        });
        let id = automation.id;

        repo.create_with_transition(automation.clone(), first_transition(&automation))
            .await
            .unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.config["actions"][0]["brightness"], 128);
    }

    #[tokio::test]
    async fn should_list_all_automations() {
        let pool = memory_pool().await;
        let repo = SqliteAutomationRepository::new(pool);

        for name in ["First rule", "Second rule"] {
            let mut automation = valid_automation();
            automation.name = name.to_string();
            automation.state = LifecycleState::Active;
            repo.create_with_transition(automation.clone(), first_transition(&automation))
                .await
                .unwrap();
        }

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
