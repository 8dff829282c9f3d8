//! `SQLite` implementation of [`ApprovalRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use govhub_app::ports::ApprovalRepository;
use govhub_domain::approval::{ApprovalRequest, ApprovalStatus};
use govhub_domain::error::GovError;
use govhub_domain::id::{AutomationId, RequestId};

use crate::codec;
use crate::error::StorageError;

struct Wrapper(ApprovalRequest);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<ApprovalRequest> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let automation_id: String = row.try_get("automation_id")?;
        let workflow: String = row.try_get("workflow")?;
        let status: String = row.try_get("status")?;
        let risk: String = row.try_get("risk")?;
        let payload: String = row.try_get("payload")?;
        let submitted_at: String = row.try_get("submitted_at")?;
        let decided_at: Option<String> = row.try_get("decided_at")?;
        let emergency_stop: Option<String> = row.try_get("emergency_stop")?;

        Ok(Self(ApprovalRequest {
            id: codec::parse_id(&id)?,
            automation_id: codec::parse_id(&automation_id)?,
            workflow: codec::from_json(&workflow)?,
            status: codec::from_json(&status)?,
            risk: codec::from_json(&risk)?,
            requester: row.try_get("requester")?,
            payload: codec::from_json(&payload)?,
            submitted_at: codec::parse_timestamp(&submitted_at)?,
            decided_at: codec::parse_optional_timestamp(decided_at)?,
            decided_by: row.try_get("decided_by")?,
            decision_reason: row.try_get("decision_reason")?,
            emergency_stop: emergency_stop
                .as_deref()
                .map(codec::from_json)
                .transpose()?,
        }))
    }
}

/// `SQLite`-backed approval request repository.
pub struct SqliteApprovalRepository {
    pool: SqlitePool,
}

impl SqliteApprovalRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ApprovalRepository for SqliteApprovalRepository {
    async fn create(&self, request: ApprovalRequest) -> Result<ApprovalRequest, GovError> {
        let workflow = codec::to_json(&request.workflow)?;
        let status = codec::to_json(&request.status)?;
        let risk = codec::to_json(&request.risk)?;
        let payload = codec::to_json(&request.payload)?;
        let emergency_stop = request
            .emergency_stop
            .as_ref()
            .map(codec::to_json)
            .transpose()?;

        sqlx::query(
            "INSERT INTO approval_requests (id, automation_id, workflow, status, risk, \
             requester, payload, submitted_at, decided_at, decided_by, decision_reason, \
             emergency_stop) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.id.to_string())
        .bind(request.automation_id.to_string())
        .bind(&workflow)
        .bind(&status)
        .bind(&risk)
        .bind(&request.requester)
        .bind(&payload)
        .bind(request.submitted_at.to_rfc3339())
        .bind(request.decided_at.map(|ts| ts.to_rfc3339()))
        .bind(&request.decided_by)
        .bind(&request.decision_reason)
        .bind(&emergency_stop)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(request)
    }

    async fn get_by_id(&self, id: RequestId) -> Result<Option<ApprovalRequest>, GovError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM approval_requests WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<ApprovalRequest>, GovError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM approval_requests ORDER BY submitted_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, request: ApprovalRequest) -> Result<ApprovalRequest, GovError> {
        let status = codec::to_json(&request.status)?;
        let emergency_stop = request
            .emergency_stop
            .as_ref()
            .map(codec::to_json)
            .transpose()?;

        sqlx::query(
            "UPDATE approval_requests SET status = ?, decided_at = ?, decided_by = ?, \
             decision_reason = ?, emergency_stop = ? WHERE id = ?",
        )
        .bind(&status)
        .bind(request.decided_at.map(|ts| ts.to_rfc3339()))
        .bind(&request.decided_by)
        .bind(&request.decision_reason)
        .bind(&emergency_stop)
        .bind(request.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(request)
    }

    async fn find_pending_for(
        &self,
        automation_id: AutomationId,
    ) -> Result<Vec<ApprovalRequest>, GovError> {
        let pending = codec::to_json(&ApprovalStatus::Pending)?;
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM approval_requests WHERE automation_id = ? AND status = ?",
        )
        .bind(automation_id.to_string())
        .bind(&pending)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation_repo::tests::memory_pool;
    use govhub_domain::approval::{RiskLevel, WorkflowKind};
    use govhub_domain::time::now;

    fn pending_request(automation_id: AutomationId) -> ApprovalRequest {
        ApprovalRequest::new(
            automation_id,
            WorkflowKind::Modification,
            RiskLevel::High,
            "user:alice",
            serde_json::json!({"config": {"trigger": "sunrise"}}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_request() {
        let repo = SqliteApprovalRepository::new(memory_pool().await);
        let request = pending_request(AutomationId::new());
        let id = request.id;

        repo.create(request).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.workflow, WorkflowKind::Modification);
        assert_eq!(fetched.status, ApprovalStatus::Pending);
        assert_eq!(fetched.risk, RiskLevel::High);
        assert_eq!(fetched.payload["config"]["trigger"], "sunrise");
    }

    #[tokio::test]
    async fn should_return_none_when_request_not_found() {
        let repo = SqliteApprovalRepository::new(memory_pool().await);
        let result = repo.get_by_id(RequestId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_persist_decision_fields_on_update() {
        let repo = SqliteApprovalRepository::new(memory_pool().await);
        let mut request = pending_request(AutomationId::new());
        let id = request.id;
        repo.create(request.clone()).await.unwrap();

        request.approve("approver:bob", Some("fine".to_string()), now());
        repo.update(request).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ApprovalStatus::Approved);
        assert_eq!(fetched.decided_by.as_deref(), Some("approver:bob"));
        assert!(fetched.decided_at.is_some());
    }

    #[tokio::test]
    async fn should_persist_emergency_stop_mark() {
        let repo = SqliteApprovalRepository::new(memory_pool().await);
        let mut request = pending_request(AutomationId::new());
        let id = request.id;
        repo.create(request.clone()).await.unwrap();

        request.mark_emergency_stopped("user:alice", "user panic", now());
        repo.update(request).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ApprovalStatus::Rejected);
        let mark = fetched.emergency_stop.unwrap();
        assert_eq!(mark.reason, "user panic");
    }

    #[tokio::test]
    async fn should_find_only_pending_requests_for_automation() {
        let repo = SqliteApprovalRepository::new(memory_pool().await);
        let automation_id = AutomationId::new();

        let open = pending_request(automation_id);
        let open_id = open.id;
        repo.create(open).await.unwrap();

        let mut decided = pending_request(automation_id);
        decided.reject("approver:bob", "no".to_string(), now());
        repo.create(decided).await.unwrap();

        repo.create(pending_request(AutomationId::new())).await.unwrap();

        let pending = repo.find_pending_for(automation_id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open_id);
    }
}
