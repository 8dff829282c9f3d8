//! Shared application state for axum handlers.

use std::sync::Arc;

use govhub_app::auth::TokenVerifier;
use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use govhub_app::realtime::{FixedWindowRateLimiter, SessionRegistry, SubscriptionBroker};
use govhub_app::services::approval_service::ApprovalService;
use govhub_app::services::backup_service::BackupService;
use govhub_app::services::emergency_service::EmergencyStopService;
use govhub_app::services::lifecycle_service::LifecycleService;

/// Application state shared across all axum handlers.
///
/// Generic over the repository, publisher, and platform gateway types to
/// avoid dynamic dispatch on the hot paths. `Clone` is implemented manually
/// so the underlying types themselves do not need to be `Clone` — only the
/// `Arc` wrappers are cloned.
pub struct AppState<AR, TL, PR, BS, SR, EP, PG> {
    /// The automation state machine and audit trail.
    pub lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
    /// The approval workflow engine.
    pub approvals: Arc<ApprovalService<PR, AR, TL, EP, PG, BS>>,
    /// Snapshot and rollback manager.
    pub backups: Arc<BackupService<BS, AR, TL, EP, PG>>,
    /// Emergency stop coordinator.
    pub emergency: Arc<EmergencyStopService<SR, PR, AR, TL, EP, PG>>,
    /// Live real-time sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Topic/scope fan-out for notifications.
    pub broker: Arc<SubscriptionBroker>,
    /// Per-session and per-origin budgets.
    pub rate_limiter: Arc<FixedWindowRateLimiter>,
    /// Token verification for session authentication.
    pub verifier: Arc<dyn TokenVerifier>,
}

impl<AR, TL, PR, BS, SR, EP, PG> Clone for AppState<AR, TL, PR, BS, SR, EP, PG> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            approvals: Arc::clone(&self.approvals),
            backups: Arc::clone(&self.backups),
            emergency: Arc::clone(&self.emergency),
            sessions: Arc::clone(&self.sessions),
            broker: Arc::clone(&self.broker),
            rate_limiter: Arc::clone(&self.rate_limiter),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

impl<AR, TL, PR, BS, SR, EP, PG> AppState<AR, TL, PR, BS, SR, EP, PG>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    /// Create a new application state from pre-wrapped `Arc` services.
    ///
    /// The services are built in the composition root, which also shares
    /// them with background tasks (dispatcher, heartbeat sweeper) before
    /// constructing the HTTP state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
        approvals: Arc<ApprovalService<PR, AR, TL, EP, PG, BS>>,
        backups: Arc<BackupService<BS, AR, TL, EP, PG>>,
        emergency: Arc<EmergencyStopService<SR, PR, AR, TL, EP, PG>>,
        sessions: Arc<SessionRegistry>,
        broker: Arc<SubscriptionBroker>,
        rate_limiter: Arc<FixedWindowRateLimiter>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            lifecycle,
            approvals,
            backups,
            emergency,
            sessions,
            broker,
            rate_limiter,
            verifier,
        }
    }
}
