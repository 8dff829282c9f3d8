//! Transition log port — read access to the append-only audit trail.
//!
//! Appends happen exclusively through
//! [`AutomationRepository::create_with_transition`](super::AutomationRepository::create_with_transition)
//! and `update_with_transition`, so a transition can never exist without its
//! matching automation write.

use std::future::Future;

use govhub_domain::error::GovError;
use govhub_domain::id::AutomationId;
use govhub_domain::transition::LifecycleTransition;

/// Queries over persisted [`LifecycleTransition`]s.
pub trait TransitionLog {
    /// All transitions for one automation, ordered by ascending sequence.
    fn list_for(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<Vec<LifecycleTransition>, GovError>> + Send;

    /// Number of committed transitions for one automation.
    fn count_for(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<u64, GovError>> + Send;

    /// The sequence number the next transition for this automation must use.
    ///
    /// Callers hold the per-automation lock, so the returned value cannot be
    /// claimed twice.
    fn next_sequence(
        &self,
        automation_id: AutomationId,
    ) -> impl Future<Output = Result<u64, GovError>> + Send;
}
