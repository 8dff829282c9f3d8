//! # govhub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AutomationRepository` — automations + atomic transition commits
//!   - `TransitionLog` — audit trail queries
//!   - `ApprovalRepository` — approval request persistence
//!   - `BackupStore` — configuration snapshots
//!   - `StopEventRepository` — emergency stop records
//!   - `PlatformGateway` — the external home-automation platform
//! - Define **driving/inbound ports** as use-case structs:
//!   - `LifecycleService` — the automation state machine and audit trail
//!   - `ApprovalService` — the approval workflow and risk policy
//!   - `BackupService` — snapshot and rollback
//!   - `EmergencyStopService` — out-of-band halt and recovery
//! - Provide **in-process infrastructure** that doesn't need IO:
//!   the event bus, per-automation locks, session registry, rate limiter,
//!   subscription broker, and notification dispatcher
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `govhub-domain` only (plus `tokio::sync` for channels and locks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod auth;
pub mod event_bus;
pub mod locks;
pub mod ports;
pub mod realtime;
pub mod services;
