//! JSON REST handlers for automations: read side, platform execution
//! reports, and AI suggestion intake.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use govhub_app::services::lifecycle_service::AutomationStats;
use govhub_domain::approval::ApprovalRequest;
use govhub_domain::automation::{Automation, LifecycleState};
use govhub_domain::id::AutomationId;
use govhub_domain::suggestion::OptimizationSuggestion;
use govhub_domain::transition::LifecycleTransition;

use crate::api::parse_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for a platform execution report.
#[derive(Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub duration_ms: u64,
}

/// Request body for a direct lifecycle transition (voluntary pause/resume).
#[derive(Deserialize)]
pub struct TransitionRequest {
    pub target: LifecycleState,
    pub reason: String,
    pub actor: String,
}

/// Request body for an AI-generated optimization candidate.
#[derive(Deserialize)]
pub struct SubmitSuggestionRequest {
    pub suggestion: OptimizationSuggestion,
    /// Identity recorded as requester; defaults to the suggestion engine.
    pub requester: Option<String>,
}

/// `GET /api/automations` — list all automations.
pub async fn list<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
) -> Result<Json<Vec<Automation>>, ApiError>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let automations = state.lifecycle.list_automations().await?;
    Ok(Json(automations))
}

/// `GET /api/automations/{id}` — get automation by id.
pub async fn get_one<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
) -> Result<Json<Automation>, ApiError>
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
    let automation = state.lifecycle.get_automation(id).await?;
    Ok(Json(automation))
}

/// `GET /api/automations/{id}/stats` — state, transition count, metrics.
pub async fn stats<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
) -> Result<Json<AutomationStats>, ApiError>
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
    let stats = state.lifecycle.get_stats(id).await?;
    Ok(Json(stats))
}

/// `GET /api/automations/{id}/transitions` — the audit trail, oldest first.
pub async fn transitions<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LifecycleTransition>>, ApiError>
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
    let transitions = state.lifecycle.list_transitions(id).await?;
    Ok(Json(transitions))
}

/// `POST /api/automations/{id}/transitions` — commit a lifecycle transition
/// directly: a voluntary pause (`inactive`) or resume (`active`).
/// Retirement is not accepted here — it goes through the approval workflow,
/// which snapshots the configuration first. Illegal edges answer with a
/// conflict; `retired` never leaves.
pub async fn transition<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Automation>, ApiError>
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
    if !matches!(
        req.target,
        LifecycleState::Active | LifecycleState::Inactive
    ) {
        return Err(ApiError::from(govhub_domain::error::GovError::from(
            govhub_domain::error::InvalidStateError {
                subject: id.to_string(),
                state: req.target.to_string(),
                operation: "transition to directly; use the approval workflow",
            },
        )));
    }
    let automation = state
        .lifecycle
        .transition(id, req.target, &req.reason, &req.actor, serde_json::json!({}))
        .await?;
    Ok(Json(automation))
}

/// `POST /api/automations/{id}/executions` — fold one platform execution
/// report into the automation's metrics.
pub async fn record_execution<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(report): Json<ExecutionReport>,
) -> Result<Json<Automation>, ApiError>
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
    let automation = state
        .lifecycle
        .record_execution(id, report.success, report.duration_ms)
        .await?;
    Ok(Json(automation))
}

/// `POST /api/automations/{id}/suggestions` — submit an AI optimization
/// candidate into the approval workflow as a MODIFICATION request.
pub async fn submit_suggestion<AR, TL, PR, BS, SR, EP, PG>(
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
    Path(id): Path<String>,
    Json(req): Json<SubmitSuggestionRequest>,
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
    let id: AutomationId = parse_id(&id, "Automation")?;
    let requester = req.requester.unwrap_or_else(|| "ai:optimizer".to_string());
    let request = state
        .approvals
        .submit_suggestion(id, &req.suggestion, &requester)
        .await?;
    Ok(Json(request))
}
