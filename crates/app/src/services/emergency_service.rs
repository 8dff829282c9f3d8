//! Emergency stop service — halt one or all automations instantly.
//!
//! The stop path bypasses the approval workflow entirely: each affected
//! automation is forced to `Inactive` under its own lock, its PENDING
//! approval requests are converted to emergency-stop rejections, and one
//! stop event records everything. A failure on one automation never blocks
//! stopping the others; failures are collected, never swallowed.

use std::sync::Arc;

use govhub_domain::approval::ApprovalRequest;
use govhub_domain::automation::LifecycleState;
use govhub_domain::error::{
    AlreadyProcessingError, GovError, NotFoundError, PartialFailureError,
};
use govhub_domain::event::{Event, EventKind};
use govhub_domain::id::{AutomationId, RequestId, StopEventId};
use govhub_domain::stop::{EmergencyStopEvent, StopFailure, StopKind};
use govhub_domain::time::now;

use crate::locks::AutomationLocks;
use crate::ports::{
    ApprovalRepository, AutomationRepository, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use crate::services::lifecycle_service::LifecycleService;

/// Application service owning emergency stops and their recovery.
pub struct EmergencyStopService<SR, PR, AR, TL, EP, PG> {
    stop_repo: SR,
    approval_repo: PR,
    lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
    publisher: EP,
    locks: Arc<AutomationLocks>,
}

impl<SR, PR, AR, TL, EP, PG> EmergencyStopService<SR, PR, AR, TL, EP, PG>
where
    SR: StopEventRepository,
    PR: ApprovalRepository,
    AR: AutomationRepository,
    TL: TransitionLog,
    EP: EventPublisher,
    PG: PlatformGateway,
{
    /// Create a new service backed by the given ports.
    pub fn new(
        stop_repo: SR,
        approval_repo: PR,
        lifecycle: Arc<LifecycleService<AR, TL, EP, PG>>,
        publisher: EP,
        locks: Arc<AutomationLocks>,
    ) -> Self {
        Self {
            stop_repo,
            approval_repo,
            lifecycle,
            publisher,
            locks,
        }
    }

    /// Halt one automation immediately.
    ///
    /// Retired automations are left untouched (the event still records the
    /// attempt). A stop cannot be cancelled once issued.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown automation, or
    /// [`GovError::PartialFailure`] when the automation could not be
    /// stopped (the stop event is still recorded).
    #[tracing::instrument(skip(self, reason))]
    pub async fn stop_one(
        &self,
        id: AutomationId,
        actor: &str,
        reason: &str,
    ) -> Result<EmergencyStopEvent, GovError> {
        // Unknown targets are caller errors, not stop failures.
        self.lifecycle.get_automation(id).await?;
        self.execute_stop(Some(id), vec![id], StopKind::Manual, actor, reason)
            .await
    }

    /// Halt every non-retired automation immediately.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::PartialFailure`] only when *every* target failed;
    /// otherwise the returned event carries the collected per-automation
    /// failures alongside the successfully stopped ids.
    #[tracing::instrument(skip(self, reason))]
    pub async fn stop_all(
        &self,
        actor: &str,
        reason: &str,
    ) -> Result<EmergencyStopEvent, GovError> {
        let targets: Vec<AutomationId> = self
            .lifecycle
            .list_automations()
            .await?
            .into_iter()
            .filter(|automation| !automation.state.is_terminal())
            .map(|automation| automation.id)
            .collect();
        self.execute_stop(None, targets, StopKind::Manual, actor, reason)
            .await
    }

    /// Escalate a PENDING approval request into an emergency stop.
    ///
    /// The stop converts the request (and any other PENDING request for the
    /// same automation) into an emergency-stop rejection. For a CREATION
    /// request the automation does not exist yet, so only the request is
    /// converted and the stop event records no affected automations.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown request or
    /// [`GovError::AlreadyProcessing`] when the request is already decided.
    #[tracing::instrument(skip(self, reason))]
    pub async fn escalate_from_request(
        &self,
        request_id: RequestId,
        actor: &str,
        reason: &str,
    ) -> Result<EmergencyStopEvent, GovError> {
        let request = self
            .approval_repo
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| {
                GovError::from(NotFoundError {
                    entity: "ApprovalRequest",
                    id: request_id.to_string(),
                })
            })?;
        if request.status.is_terminal() {
            return Err(AlreadyProcessingError {
                request: request.id.to_string(),
                status: request.status,
            }
            .into());
        }

        let automation_id = request.automation_id;
        let targets = match self.lifecycle.get_automation(automation_id).await {
            Ok(_) => vec![automation_id],
            // A pending CREATION has no automation row yet; convert the
            // request alone.
            Err(GovError::NotFound(_)) => {
                let _guard = self.locks.acquire(automation_id).await;
                self.convert_pending_requests(automation_id, actor, reason)
                    .await?;
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        self.execute_stop(Some(automation_id), targets, StopKind::System, actor, reason)
            .await
    }

    /// Restore each affected automation to `Active`, one at a time.
    ///
    /// Recovery moves `Pending|Failed -> InProgress -> Completed|Failed`.
    /// An automation that fails to recover is recorded in the event's
    /// recovery failures while the loop continues.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown stop event or
    /// [`GovError::InvalidState`] when recovery already completed or is in
    /// flight.
    #[tracing::instrument(skip(self))]
    pub async fn recover(
        &self,
        stop_event_id: StopEventId,
        actor: &str,
    ) -> Result<EmergencyStopEvent, GovError> {
        let mut event = self.load(stop_event_id).await?;
        event.begin_recovery()?;
        let mut event = self.stop_repo.update(event).await?;
        self.publish_recovery(&event).await;

        let mut failures = Vec::new();
        for id in event.affected.clone() {
            let result = self
                .lifecycle
                .transition(
                    id,
                    LifecycleState::Active,
                    "recovery",
                    actor,
                    serde_json::json!({"stop_event_id": event.id}),
                )
                .await;
            if let Err(err) = result {
                tracing::warn!(automation = %id, error = %err, "recovery failed for automation");
                failures.push(StopFailure {
                    automation_id: id,
                    error: render_error(&err),
                });
            }
        }

        event.finish_recovery(failures, now());
        let event = self.stop_repo.update(event).await?;
        self.publish_recovery(&event).await;
        Ok(event)
    }

    /// Look up a stop event by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] when no stop event with `id` exists.
    pub async fn get_event(&self, id: StopEventId) -> Result<EmergencyStopEvent, GovError> {
        self.load(id).await
    }

    /// The most recent stop events, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_events(&self, limit: usize) -> Result<Vec<EmergencyStopEvent>, GovError> {
        self.stop_repo.get_recent(limit).await
    }

    async fn execute_stop(
        &self,
        scope: Option<AutomationId>,
        targets: Vec<AutomationId>,
        kind: StopKind,
        actor: &str,
        reason: &str,
    ) -> Result<EmergencyStopEvent, GovError> {
        let target_count = targets.len();
        let mut affected = Vec::new();
        let mut failures = Vec::new();
        for id in targets {
            match self.stop_single(id, actor, reason).await {
                Ok(true) => affected.push(id),
                Ok(false) => {} // retired, left untouched
                Err(err) => {
                    tracing::error!(automation = %id, error = %err, "emergency stop failed for automation");
                    failures.push(StopFailure {
                        automation_id: id,
                        error: render_error(&err),
                    });
                }
            }
        }

        let event =
            EmergencyStopEvent::new(scope, kind, actor, reason, affected, failures);
        let event = self.stop_repo.create(event).await?;

        tracing::info!(
            stop_event = %event.id,
            affected = event.affected.len(),
            failures = event.failures.len(),
            reason,
            "emergency stop issued"
        );
        let _ = self
            .publisher
            .publish(Event::new(
                EventKind::EmergencyStopIssued,
                scope,
                serde_json::json!({
                    "stop_event_id": event.id,
                    "kind": event.kind,
                    "reason": event.reason,
                    "affected": event.affected,
                    "failures": event.failures,
                    "recovery": event.recovery,
                }),
            ))
            .await;

        // Every target failing is a failed operation; anything less is a
        // partial success the caller inspects through the event.
        if target_count > 0 && event.affected.is_empty() && !event.failures.is_empty() {
            return Err(PartialFailureError {
                failures: event.failures.clone(),
            }
            .into());
        }
        Ok(event)
    }

    /// Stop one automation under its lock. `Ok(false)` means the automation
    /// is retired and was left untouched.
    async fn stop_single(
        &self,
        id: AutomationId,
        actor: &str,
        reason: &str,
    ) -> Result<bool, GovError> {
        let _guard = self.locks.acquire(id).await;
        let automation = self.lifecycle.get_automation(id).await?;
        if automation.state.is_terminal() {
            return Ok(false);
        }

        self.lifecycle
            .force_inactive_locked(
                id,
                reason,
                actor,
                serde_json::json!({"emergency_stop": true}),
            )
            .await?;
        self.convert_pending_requests(id, actor, reason).await?;
        Ok(true)
    }

    /// Convert every PENDING request for the automation into an
    /// emergency-stop rejection. Caller holds the automation's lock.
    async fn convert_pending_requests(
        &self,
        id: AutomationId,
        actor: &str,
        reason: &str,
    ) -> Result<(), GovError> {
        for mut request in self.approval_repo.find_pending_for(id).await? {
            request.mark_emergency_stopped(actor, reason, now());
            let request = self.approval_repo.update(request).await?;
            self.publish_converted(&request).await;
        }
        Ok(())
    }

    async fn publish_converted(&self, request: &ApprovalRequest) {
        let _ = self
            .publisher
            .publish(Event::new(
                EventKind::ApprovalDecided,
                Some(request.automation_id),
                serde_json::json!({
                    "request_id": request.id,
                    "workflow": request.workflow,
                    "status": request.status,
                    "decided_by": request.decided_by,
                    "reason": request.decision_reason,
                    "emergency_stop": true,
                }),
            ))
            .await;
    }

    async fn publish_recovery(&self, event: &EmergencyStopEvent) {
        let _ = self
            .publisher
            .publish(Event::new(
                EventKind::RecoveryProgressed,
                event.automation_id,
                serde_json::json!({
                    "stop_event_id": event.id,
                    "recovery": event.recovery,
                    "failures": event.recovery_failures,
                }),
            ))
            .await;
    }

    async fn load(&self, id: StopEventId) -> Result<EmergencyStopEvent, GovError> {
        self.stop_repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "EmergencyStopEvent",
                id: id.to_string(),
            }
            .into()
        })
    }
}

/// Render an error with its source, so stop failures carry the platform's
/// actual message instead of the top-level category alone.
fn render_error(err: &GovError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::services::lifecycle_service::test_support::{
        InMemoryStore, RecordingPlatform, seeded_automation,
    };
    use govhub_domain::approval::{ApprovalStatus, RiskLevel, WorkflowKind};
    use govhub_domain::automation::Automation;
    use govhub_domain::stop::RecoveryStatus;

    type Bus = Arc<InProcessEventBus>;
    type TestService = EmergencyStopService<
        InMemoryStore,
        InMemoryStore,
        InMemoryStore,
        InMemoryStore,
        Bus,
        RecordingPlatform,
    >;

    struct Fixture {
        service: TestService,
        lifecycle: Arc<LifecycleService<InMemoryStore, InMemoryStore, Bus, RecordingPlatform>>,
        store: InMemoryStore,
        platform: RecordingPlatform,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::default();
        let platform = RecordingPlatform::default();
        let bus: Bus = Arc::new(InProcessEventBus::new(64));
        let locks = Arc::new(AutomationLocks::new());
        let lifecycle = Arc::new(LifecycleService::new(
            store.clone(),
            store.clone(),
            Arc::clone(&bus),
            platform.clone(),
            Arc::clone(&locks),
        ));
        let service = EmergencyStopService::new(
            store.clone(),
            store.clone(),
            Arc::clone(&lifecycle),
            bus,
            locks,
        );
        Fixture {
            service,
            lifecycle,
            store,
            platform,
        }
    }

    fn seeded_with_platform_id(platform_id: &str) -> Automation {
        let mut automation = seeded_automation(LifecycleState::Active);
        automation.platform_id = platform_id.to_string();
        automation
    }

    async fn pending_modification(store: &InMemoryStore, id: AutomationId) -> RequestId {
        let request = govhub_domain::approval::ApprovalRequest::new(
            id,
            WorkflowKind::Modification,
            RiskLevel::Medium,
            "user:alice",
            serde_json::json!({"config": {}}),
        )
        .unwrap();
        crate::ports::ApprovalRepository::create(store, request)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn should_stop_one_and_convert_pending_requests() {
        let f = fixture();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        f.store.seed_automation(automation);
        let request_id = pending_modification(&f.store, id).await;

        let event = f
            .service
            .stop_one(id, "user:alice", "user panic")
            .await
            .unwrap();

        assert_eq!(event.affected, vec![id]);
        assert!(event.failures.is_empty());
        assert_eq!(event.recovery, RecoveryStatus::Pending);

        let automation = f.lifecycle.get_automation(id).await.unwrap();
        assert_eq!(automation.state, LifecycleState::Inactive);

        let request = crate::ports::ApprovalRepository::get_by_id(&f.store, request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Rejected);
        assert!(request.emergency_stop.is_some());
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_automation() {
        let f = fixture();
        let result = f
            .service
            .stop_one(AutomationId::new(), "user:alice", "panic")
            .await;
        assert!(matches!(result, Err(GovError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_leave_retired_automation_untouched() {
        let f = fixture();
        let automation = seeded_automation(LifecycleState::Retired);
        let id = automation.id;
        f.store.seed_automation(automation);

        let event = f
            .service
            .stop_one(id, "user:alice", "panic")
            .await
            .unwrap();

        assert!(event.affected.is_empty());
        assert!(event.failures.is_empty());
        assert_eq!(f.store.transition_count(id), 0);
    }

    #[tokio::test]
    async fn should_stop_remaining_automations_when_one_fails() {
        let f = fixture();
        let a = seeded_with_platform_id("automation.a");
        let b = seeded_with_platform_id("automation.b");
        let c = seeded_with_platform_id("automation.c");
        let (id_a, id_b, id_c) = (a.id, b.id, c.id);
        f.store.seed_automation(a);
        f.store.seed_automation(b);
        f.store.seed_automation(c);
        f.platform.fail_permanently_for("automation.b");

        let event = f
            .service
            .stop_all("user:alice", "burst pipe")
            .await
            .unwrap();

        assert_eq!(event.affected.len(), 2);
        assert!(event.affected.contains(&id_a));
        assert!(event.affected.contains(&id_c));
        assert_eq!(event.failures.len(), 1);
        assert_eq!(event.failures[0].automation_id, id_b);

        assert_eq!(
            f.lifecycle.get_automation(id_a).await.unwrap().state,
            LifecycleState::Inactive
        );
        assert_eq!(
            f.lifecycle.get_automation(id_b).await.unwrap().state,
            LifecycleState::Active
        );
        assert_eq!(
            f.lifecycle.get_automation(id_c).await.unwrap().state,
            LifecycleState::Inactive
        );
    }

    #[tokio::test]
    async fn should_surface_partial_failure_when_every_target_fails() {
        let f = fixture();
        let automation = seeded_with_platform_id("automation.dead");
        let id = automation.id;
        f.store.seed_automation(automation);
        f.platform.fail_permanently_for("automation.dead");

        let result = f.service.stop_one(id, "user:alice", "panic").await;
        assert!(matches!(result, Err(GovError::PartialFailure(_))));
        // The stop event is still recorded for the audit trail.
        let events = f.service.list_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].failures.len(), 1);
    }

    #[tokio::test]
    async fn should_recover_all_affected_automations() {
        let f = fixture();
        let a = seeded_with_platform_id("automation.a");
        let b = seeded_with_platform_id("automation.b");
        let (id_a, id_b) = (a.id, b.id);
        f.store.seed_automation(a);
        f.store.seed_automation(b);

        let event = f.service.stop_all("user:alice", "panic").await.unwrap();
        let recovered = f.service.recover(event.id, "user:alice").await.unwrap();

        assert_eq!(recovered.recovery, RecoveryStatus::Completed);
        assert!(recovered.recovery_failures.is_empty());
        assert!(recovered.recovered_at.is_some());
        for id in [id_a, id_b] {
            assert_eq!(
                f.lifecycle.get_automation(id).await.unwrap().state,
                LifecycleState::Active
            );
        }
    }

    #[tokio::test]
    async fn should_mark_recovery_failed_but_continue_past_failing_automation() {
        let f = fixture();
        let a = seeded_with_platform_id("automation.a");
        let b = seeded_with_platform_id("automation.b");
        let (id_a, id_b) = (a.id, b.id);
        f.store.seed_automation(a);
        f.store.seed_automation(b);

        let event = f.service.stop_all("user:alice", "panic").await.unwrap();
        // Fail only the re-activation of automation.a.
        f.platform.fail_permanently_for("automation.a");

        let recovered = f.service.recover(event.id, "user:alice").await.unwrap();

        assert_eq!(recovered.recovery, RecoveryStatus::Failed);
        assert_eq!(recovered.recovery_failures.len(), 1);
        assert_eq!(recovered.recovery_failures[0].automation_id, id_a);
        assert_eq!(
            f.lifecycle.get_automation(id_b).await.unwrap().state,
            LifecycleState::Active
        );
    }

    #[tokio::test]
    async fn should_reject_recover_on_completed_event() {
        let f = fixture();
        let automation = seeded_with_platform_id("automation.a");
        let id = automation.id;
        f.store.seed_automation(automation);

        let event = f.service.stop_one(id, "user:alice", "panic").await.unwrap();
        f.service.recover(event.id, "user:alice").await.unwrap();

        let result = f.service.recover(event.id, "user:alice").await;
        assert!(matches!(result, Err(GovError::InvalidState(_))));
    }

    #[tokio::test]
    async fn should_escalate_pending_request_to_system_stop() {
        let f = fixture();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        f.store.seed_automation(automation);
        let request_id = pending_modification(&f.store, id).await;

        let event = f
            .service
            .escalate_from_request(request_id, "watchdog", "runaway behavior")
            .await
            .unwrap();

        assert_eq!(event.kind, StopKind::System);
        assert_eq!(event.affected, vec![id]);
        let request = crate::ports::ApprovalRepository::get_by_id(&f.store, request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.status, ApprovalStatus::Rejected);
        assert!(request.emergency_stop.is_some());
    }

    #[tokio::test]
    async fn should_reject_escalation_of_decided_request() {
        let f = fixture();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        f.store.seed_automation(automation);
        let request_id = pending_modification(&f.store, id).await;

        f.service
            .escalate_from_request(request_id, "watchdog", "runaway")
            .await
            .unwrap();

        let result = f
            .service
            .escalate_from_request(request_id, "watchdog", "again")
            .await;
        assert!(matches!(result, Err(GovError::AlreadyProcessing(_))));
    }
}
