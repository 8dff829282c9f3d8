//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Mounts the JSON API under `/api` and the real-time WebSocket endpoint at
/// `/ws`. Includes a [`TraceLayer`] that logs each HTTP request/response at
/// the `DEBUG` level using the `tracing` ecosystem.
pub fn build<AR, TL, PR, BS, SR, EP, PG>(
    state: AppState<AR, TL, PR, BS, SR, EP, PG>,
) -> Router
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/ws",
            get(crate::ws::handler::ws_handler::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
