//! Stop event repository port — persistence for emergency stop records.

use std::future::Future;

use govhub_domain::error::GovError;
use govhub_domain::id::StopEventId;
use govhub_domain::stop::EmergencyStopEvent;

/// Repository for persisting and querying [`EmergencyStopEvent`]s.
pub trait StopEventRepository {
    /// Persist a freshly-issued stop event.
    fn create(
        &self,
        event: EmergencyStopEvent,
    ) -> impl Future<Output = Result<EmergencyStopEvent, GovError>> + Send;

    /// Get a stop event by its unique identifier.
    fn get_by_id(
        &self,
        id: StopEventId,
    ) -> impl Future<Output = Result<Option<EmergencyStopEvent>, GovError>> + Send;

    /// The most recent stop events, newest first.
    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<EmergencyStopEvent>, GovError>> + Send;

    /// Write a recovery-status change back. Recovery progress is the only
    /// permitted mutation of a stop event.
    fn update(
        &self,
        event: EmergencyStopEvent,
    ) -> impl Future<Output = Result<EmergencyStopEvent, GovError>> + Send;
}
