//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod approval_repo;
pub mod automation_repo;
pub mod backup_store;
pub mod event_bus;
pub mod platform;
pub mod stop_event_repo;
pub mod transition_log;

pub use approval_repo::ApprovalRepository;
pub use automation_repo::AutomationRepository;
pub use backup_store::BackupStore;
pub use event_bus::EventPublisher;
pub use platform::PlatformGateway;
pub use stop_event_repo::StopEventRepository;
pub use transition_log::TransitionLog;
