//! # govhub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **governance REST API** (`/api/automations`, `/api/approvals`,
//!   `/api/emergency`, …) for programmatic access
//! - Serve the **real-time WebSocket endpoint** (`/ws`) that authenticated
//!   clients use for subscriptions and live updates
//! - Map HTTP/WebSocket requests into application service calls
//!   (driving adapter)
//! - Map application results and errors into HTTP responses and typed
//!   WebSocket frames
//!
//! ## Dependency rule
//! Depends on `govhub-app` (for port traits and services) and `govhub-domain`
//! (for domain types used in request/response mapping). Never leaks axum
//! types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod ws;
