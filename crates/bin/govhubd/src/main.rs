//! # govhubd — govhub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Spawn the notification dispatcher and heartbeat sweeper
//! - Build the axum router, injecting application services
//! - Bind to a TCP port and serve with graceful shutdown
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use govhub_adapter_http_axum::router;
use govhub_adapter_http_axum::state::AppState;
use govhub_adapter_platform_virtual::VirtualPlatformGateway;
use govhub_adapter_storage_sqlite_sqlx::{
    Config as DbConfig, SqliteApprovalRepository, SqliteAutomationRepository, SqliteBackupStore,
    SqliteStopEventRepository, SqliteTransitionLog,
};
use govhub_app::auth::{StaticTokenVerifier, TokenVerifier};
use govhub_app::event_bus::InProcessEventBus;
use govhub_app::locks::AutomationLocks;
use govhub_app::realtime::session::spawn_heartbeat_sweeper;
use govhub_app::realtime::{
    FixedWindowRateLimiter, NotificationDispatcher, SessionRegistry, SubscriptionBroker,
};
use govhub_app::services::approval_service::ApprovalService;
use govhub_app::services::backup_service::BackupService;
use govhub_app::services::emergency_service::EmergencyStopService;
use govhub_app::services::lifecycle_service::LifecycleService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = DbConfig {
        database_url: config.database.url.clone(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let automation_repo = SqliteAutomationRepository::new(pool.clone());
    let transition_log = SqliteTransitionLog::new(pool.clone());
    let approval_repo = SqliteApprovalRepository::new(pool.clone());
    let emergency_approval_repo = SqliteApprovalRepository::new(pool.clone());
    let backup_store = SqliteBackupStore::new(pool.clone());
    let stop_repo = SqliteStopEventRepository::new(pool);

    // In-process infrastructure
    let bus = Arc::new(InProcessEventBus::new(config.realtime.event_bus_capacity));
    let locks = Arc::new(AutomationLocks::new());

    // Platform gateway
    let platform = Arc::new(VirtualPlatformGateway::new());
    for platform_id in &config.platform.fail_platform_ids {
        tracing::warn!(platform_id, "virtual platform scripted to fail");
        platform.set_failing(platform_id, true);
    }

    // Services
    let lifecycle = Arc::new(LifecycleService::new(
        automation_repo,
        transition_log,
        Arc::clone(&bus),
        Arc::clone(&platform),
        Arc::clone(&locks),
    ));
    let backups = Arc::new(BackupService::new(
        backup_store,
        Arc::clone(&lifecycle),
        Arc::clone(&bus),
        config.retention(),
        Arc::clone(&locks),
    ));
    let approvals = Arc::new(ApprovalService::new(
        approval_repo,
        Arc::clone(&lifecycle),
        Arc::clone(&backups),
        Arc::clone(&bus),
        config.approval,
        Arc::clone(&locks),
    ));
    let emergency = Arc::new(EmergencyStopService::new(
        stop_repo,
        emergency_approval_repo,
        Arc::clone(&lifecycle),
        Arc::clone(&bus),
        Arc::clone(&locks),
    ));

    // Real-time layer
    let sessions = Arc::new(SessionRegistry::new());
    let broker = Arc::new(SubscriptionBroker::new(
        Arc::clone(&sessions),
        Duration::from_millis(config.realtime.send_timeout_ms),
    ));
    let rate_limiter = Arc::new(FixedWindowRateLimiter::new(config.rate_limits()));
    let verifier: Arc<dyn TokenVerifier> =
        Arc::new(StaticTokenVerifier::new(config.auth_tokens()));

    // Background tasks; both run until the process exits.
    let _dispatcher = NotificationDispatcher::spawn(&bus, Arc::clone(&broker));
    let _sweeper = spawn_heartbeat_sweeper(
        Arc::clone(&sessions),
        Arc::clone(&broker),
        Duration::from_secs(config.realtime.heartbeat_timeout_secs),
        Duration::from_secs(config.realtime.heartbeat_interval_secs),
    );

    // HTTP
    let state = AppState::new(
        lifecycle,
        approvals,
        backups,
        emergency,
        sessions,
        broker,
        rate_limiter,
        verifier,
    );
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    tracing::info!(%bind_addr, "govhubd listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
    tracing::info!("shutdown signal received");
}
