//! JSON REST handlers for emergency stop and recovery.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use govhub_domain::id::{AutomationId, StopEventId};
use govhub_domain::stop::EmergencyStopEvent;

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for a stop. With an automation id the stop targets that
/// automation; without one it halts everything.
#[derive(Deserialize)]
pub struct StopRequest {
    pub automation_id: Option<AutomationId>,
    pub actor: String,
    pub reason: String,
}

/// Request body for a recovery attempt.
#[derive(Deserialize)]
pub struct RecoverRequest {
    pub actor: String,
}

/// Query parameters for the list endpoint.
#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// `POST /api/emergency/stop` — halt one automation or all of them.
pub async fn stop<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Json(req): Json<StopRequest>,
) -> Result<Json<EmergencyStopEvent>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let event = match req.automation_id {
        Some(id) => state.emergency.stop_one(id, &req.actor, &req.reason).await?,
        None => state.emergency.stop_all(&req.actor, &req.reason).await?,
    };
    Ok(Json(event))
}

/// `GET /api/emergency` — recent stop events, newest first.
pub async fn list<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<EmergencyStopEvent>>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let events = state
        .emergency
        .list_events(params.limit.unwrap_or(50))
        .await?;
    Ok(Json(events))
}

/// `GET /api/emergency/{id}` — one stop event.
pub async fn get_one<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
) -> Result<Json<EmergencyStopEvent>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: StopEventId = parse_id(&id, "EmergencyStopEvent")?;
    let event = state.emergency.get_event(id).await?;
    Ok(Json(event))
}

/// `POST /api/emergency/{id}/recover` — restore affected automations.
pub async fn recover<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<RecoverRequest>,
) -> Result<Json<EmergencyStopEvent>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: StopEventId = parse_id(&id, "EmergencyStopEvent")?;
    let event = state.emergency.recover(id, &req.actor).await?;
    Ok(Json(event))
}
