//! # govhub-domain
//!
//! Pure domain model for the govhub automation governance subsystem.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Automations** (governed rule instances with a lifecycle state)
//! - Define **LifecycleTransitions** (the append-only audit trail)
//! - Define **ApprovalRequests** (the workflow gating every change)
//! - Define **Backups** (configuration snapshots for rollback)
//! - Define **EmergencyStopEvents** (out-of-band halt records)
//! - Define **Events** (governance facts published on the in-process bus)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod approval;
pub mod automation;
pub mod backup;
pub mod event;
pub mod stop;
pub mod suggestion;
pub mod transition;
