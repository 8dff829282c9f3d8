//! Automation repository port — persistence for automations.
//!
//! The `*_with_transition` methods are the transaction boundary required by
//! the lifecycle engine: the automation row and its audit record commit
//! together or not at all.

use std::future::Future;

use govhub_domain::automation::Automation;
use govhub_domain::error::GovError;
use govhub_domain::id::AutomationId;
use govhub_domain::transition::LifecycleTransition;

/// Repository for persisting and querying [`Automation`]s.
pub trait AutomationRepository {
    /// Atomically insert a new automation together with its first
    /// lifecycle transition.
    fn create_with_transition(
        &self,
        automation: Automation,
        transition: LifecycleTransition,
    ) -> impl Future<Output = Result<Automation, GovError>> + Send;

    /// Atomically write the automation's new state together with the
    /// lifecycle transition that produced it.
    fn update_with_transition(
        &self,
        automation: Automation,
        transition: LifecycleTransition,
    ) -> impl Future<Output = Result<Automation, GovError>> + Send;

    /// Update mutable fields that do not change lifecycle state
    /// (execution metrics).
    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, GovError>> + Send;

    /// Get an automation by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, GovError>> + Send;

    /// Get all automations, retired ones included.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, GovError>> + Send;
}
