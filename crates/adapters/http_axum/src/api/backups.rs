//! JSON REST handlers for backups and rollback.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use govhub_domain::backup::{Backup, BackupKind};
use govhub_domain::id::{AutomationId, BackupId};

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for an on-demand snapshot.
#[derive(Deserialize)]
pub struct CreateBackupRequest {
    pub created_by: String,
}

/// Request body for a rollback.
#[derive(Deserialize)]
pub struct RestoreRequest {
    pub backup_id: BackupId,
    pub actor: String,
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Backup>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `GET /api/automations/{id}/backups` — list snapshots, newest first.
pub async fn list<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Backup>>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: AutomationId = parse_id(&id, "Automation")?;
    let backups = state.backups.list_backups(id).await?;
    Ok(Json(backups))
}

/// `POST /api/automations/{id}/backups` — take a manual snapshot.
pub async fn create<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<CreateBackupRequest>,
) -> Result<CreateResponse, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: AutomationId = parse_id(&id, "Automation")?;
    let backup = state
        .backups
        .snapshot(id, BackupKind::Manual, &req.created_by)
        .await?;
    Ok(CreateResponse::Created(Json(backup)))
}

/// `POST /api/automations/{id}/restore` — roll back to a stored snapshot.
pub async fn restore<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<Backup>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: AutomationId = parse_id(&id, "Automation")?;
    let backup = state.backups.restore(id, req.backup_id, &req.actor).await?;
    Ok(Json(backup))
}
