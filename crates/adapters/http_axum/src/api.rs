//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod approvals;
#[allow(clippy::missing_errors_doc)]
pub mod automations;
#[allow(clippy::missing_errors_doc)]
pub mod backups;
#[allow(clippy::missing_errors_doc)]
pub mod emergency;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, post};

use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use govhub_domain::error::NotFoundError;

use crate::error::ApiError;
use crate::state::AppState;

/// Parse a path segment into a typed id; malformed ids read as "no such
/// resource".
pub(crate) fn parse_id<T: FromStr>(raw: &str, entity: &'static str) -> Result<T, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::from(govhub_domain::error::GovError::from(NotFoundError {
            entity,
            id: raw.to_string(),
        }))
    })
}

/// Build the `/api` sub-router.
pub fn routes<AR, TL, PR, BS, SR, EP, PG>() -> Router<AppState<AR, TL, PR, BS, SR, EP, PG>>
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
        // Automations (read side + platform reports + AI suggestions)
        .route(
            "/automations",
            get(automations::list::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/automations/{id}",
            get(automations::get_one::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/automations/{id}/stats",
            get(automations::stats::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/automations/{id}/transitions",
            get(automations::transitions::<AR, TL, PR, BS, SR, EP, PG>)
                .post(automations::transition::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/automations/{id}/executions",
            post(automations::record_execution::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/automations/{id}/suggestions",
            post(automations::submit_suggestion::<AR, TL, PR, BS, SR, EP, PG>),
        )
        // Backups
        .route(
            "/automations/{id}/backups",
            get(backups::list::<AR, TL, PR, BS, SR, EP, PG>)
                .post(backups::create::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/automations/{id}/restore",
            post(backups::restore::<AR, TL, PR, BS, SR, EP, PG>),
        )
        // Approval workflow
        .route(
            "/approvals",
            get(approvals::list::<AR, TL, PR, BS, SR, EP, PG>)
                .post(approvals::submit::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/approvals/{id}",
            get(approvals::get_one::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/approvals/{id}/approve",
            post(approvals::approve::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/approvals/{id}/reject",
            post(approvals::reject::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/approvals/{id}/cancel",
            post(approvals::cancel::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/approvals/{id}/escalate",
            post(approvals::escalate::<AR, TL, PR, BS, SR, EP, PG>),
        )
        // Emergency stop
        .route(
            "/emergency",
            get(emergency::list::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/emergency/stop",
            post(emergency::stop::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/emergency/{id}",
            get(emergency::get_one::<AR, TL, PR, BS, SR, EP, PG>),
        )
        .route(
            "/emergency/{id}/recover",
            post(emergency::recover::<AR, TL, PR, BS, SR, EP, PG>),
        )
}
