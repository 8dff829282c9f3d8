//! # govhub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `govhub-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//! - Provide the transaction boundary for atomic automation + transition
//!   commits
//!
//! ## Dependency rule
//! Depends on `govhub-app` (for port traits) and `govhub-domain` (for domain
//! types). The `app` and `domain` crates must never reference this adapter.

mod codec;

pub mod approval_repo;
pub mod automation_repo;
pub mod backup_store;
pub mod error;
pub mod pool;
pub mod stop_event_repo;
pub mod transition_log;

pub use approval_repo::SqliteApprovalRepository;
pub use automation_repo::SqliteAutomationRepository;
pub use backup_store::SqliteBackupStore;
pub use error::StorageError;
pub use pool::{Config, Database};
pub use stop_event_repo::SqliteStopEventRepository;
pub use transition_log::SqliteTransitionLog;
