//! JSON REST handlers for the approval workflow.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use govhub_app::services::approval_service::Submission;
use govhub_domain::approval::{ApprovalRequest, WorkflowKind};
use govhub_domain::id::{AutomationId, RequestId};
use govhub_domain::stop::EmergencyStopEvent;

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for submitting a change proposal.
#[derive(Deserialize)]
pub struct SubmitRequest {
    pub workflow: WorkflowKind,
    /// Required for MODIFICATION/RETIREMENT; ignored for CREATION.
    pub automation_id: Option<AutomationId>,
    pub requester: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Request body for an approve decision.
#[derive(Deserialize)]
pub struct ApproveRequest {
    pub approver: String,
    pub notes: Option<String>,
}

/// Request body for a reject decision.
#[derive(Deserialize)]
pub struct RejectRequest {
    pub rejecter: String,
    pub reason: String,
}

/// Request body for a requester cancellation.
#[derive(Deserialize)]
pub struct CancelRequest {
    pub requester: String,
}

/// Request body for an emergency-stop escalation.
#[derive(Deserialize)]
pub struct EscalateRequest {
    pub actor: String,
    pub reason: String,
}

/// Possible responses from the submit endpoint.
pub enum SubmitResponse {
    Created(Json<ApprovalRequest>),
}

impl IntoResponse for SubmitResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `POST /api/approvals` — submit a change proposal.
pub async fn submit<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Json(req): Json<SubmitRequest>,
) -> Result<SubmitResponse, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let request = state
        .approvals
        .submit(Submission {
            workflow: req.workflow,
            automation_id: req.automation_id,
            requester: req.requester,
            payload: req.payload,
        })
        .await?;
    Ok(SubmitResponse::Created(Json(request)))
}

/// `GET /api/approvals` — list all requests, newest first.
pub async fn list<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
) -> Result<Json<Vec<ApprovalRequest>>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let requests = state.approvals.list_requests().await?;
    Ok(Json(requests))
}

/// `GET /api/approvals/{id}` — get one request.
pub async fn get_one<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalRequest>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: RequestId = parse_id(&id, "ApprovalRequest")?;
    let request = state.approvals.get_request(id).await?;
    Ok(Json(request))
}

/// `POST /api/approvals/{id}/approve` — approve and apply the change.
/// Idempotent on already-decided requests.
pub async fn approve<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<ApprovalRequest>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: RequestId = parse_id(&id, "ApprovalRequest")?;
    let request = state.approvals.approve(id, &req.approver, req.notes).await?;
    Ok(Json(request))
}

/// `POST /api/approvals/{id}/reject` — reject with a reason.
pub async fn reject<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<ApprovalRequest>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: RequestId = parse_id(&id, "ApprovalRequest")?;
    let request = state.approvals.reject(id, &req.rejecter, req.reason).await?;
    Ok(Json(request))
}

/// `POST /api/approvals/{id}/cancel` — requester cancellation.
pub async fn cancel<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ApprovalRequest>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let id: RequestId = parse_id(&id, "ApprovalRequest")?;
    let request = state.approvals.cancel(id, &req.requester).await?;
    Ok(Json(request))
}

/// `POST /api/approvals/{id}/escalate` — convert a pending request into an
/// emergency stop of its automation.
pub async fn escalate<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<EscalateRequest>,
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
    let id: RequestId = parse_id(&id, "ApprovalRequest")?;
    let event = state
        .emergency
        .escalate_from_request(id, &req.actor, &req.reason)
        .await?;
    Ok(Json(event))
}
