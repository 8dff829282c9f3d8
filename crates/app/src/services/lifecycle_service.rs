//! Lifecycle service — the automation state machine and its audit trail.
//!
//! All transitions for one automation are serialized through
//! [`AutomationLocks`]; transitions for different automations proceed in
//! parallel. The platform gateway is called before anything persists, the
//! automation row and its transition record commit atomically, and the
//! lifecycle event is published while the lock is still held so subscribers
//! observe transitions in commit order.

use std::sync::Arc;

use serde::Serialize;

use govhub_domain::automation::{Automation, ExecutionMetrics, LifecycleState};
use govhub_domain::error::{GovError, InvalidTransitionError, NotFoundError};
use govhub_domain::event::{Event, EventKind};
use govhub_domain::id::AutomationId;
use govhub_domain::time::now;
use govhub_domain::transition::LifecycleTransition;

use crate::locks::AutomationLocks;
use crate::ports::{AutomationRepository, EventPublisher, PlatformGateway, TransitionLog};

/// Attempts per platform call: one initial try plus two retries on
/// transient failures.
const PLATFORM_ATTEMPTS: u32 = 3;

/// Read-only view returned by [`LifecycleService::get_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct AutomationStats {
    pub automation_id: AutomationId,
    pub state: LifecycleState,
    pub transition_count: u64,
    pub metrics: ExecutionMetrics,
}

/// Application service owning lifecycle transitions.
pub struct LifecycleService<AR, TL, EP, PG> {
    automation_repo: AR,
    transition_log: TL,
    publisher: EP,
    platform: PG,
    locks: Arc<AutomationLocks>,
}

impl<AR, TL, EP, PG> LifecycleService<AR, TL, EP, PG>
where
    AR: AutomationRepository,
    TL: TransitionLog,
    EP: EventPublisher,
    PG: PlatformGateway,
{
    /// Create a new service backed by the given ports.
    pub fn new(
        automation_repo: AR,
        transition_log: TL,
        publisher: EP,
        platform: PG,
        locks: Arc<AutomationLocks>,
    ) -> Self {
        Self {
            automation_repo,
            transition_log,
            publisher,
            platform,
            locks,
        }
    }

    /// Commit a lifecycle transition for one automation.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown automation,
    /// [`GovError::InvalidTransition`] for an illegal edge,
    /// [`GovError::Platform`] when the platform rejects the change after
    /// bounded retries, or a storage error. Failed transitions are never
    /// retried automatically and never partially applied.
    #[tracing::instrument(skip(self, metadata))]
    pub async fn transition(
        &self,
        id: AutomationId,
        target: LifecycleState,
        reason: &str,
        actor: &str,
        metadata: serde_json::Value,
    ) -> Result<Automation, GovError> {
        let _guard = self.locks.acquire(id).await;
        self.transition_locked(id, target, reason, actor, metadata)
            .await
    }

    /// Transition body for callers that already hold the automation's lock.
    pub(crate) async fn transition_locked(
        &self,
        id: AutomationId,
        target: LifecycleState,
        reason: &str,
        actor: &str,
        metadata: serde_json::Value,
    ) -> Result<Automation, GovError> {
        let automation = self.load(id).await?;
        if !automation.state.can_transition_to(target) {
            return Err(InvalidTransitionError {
                automation: id.to_string(),
                from: automation.state,
                to: target,
            }
            .into());
        }

        self.push_to_platform(&automation, target).await?;
        self.commit(automation, target, reason, actor, metadata, false)
            .await
    }

    /// Force an automation to `Inactive` regardless of its current state.
    ///
    /// Emergency-stop entry point; only `Retired` resists. The caller holds
    /// the automation's lock.
    pub(crate) async fn force_inactive_locked(
        &self,
        id: AutomationId,
        reason: &str,
        actor: &str,
        metadata: serde_json::Value,
    ) -> Result<Automation, GovError> {
        let automation = self.load(id).await?;
        if automation.state.is_terminal() {
            return Err(InvalidTransitionError {
                automation: id.to_string(),
                from: automation.state,
                to: LifecycleState::Inactive,
            }
            .into());
        }

        self.push_state(&automation.platform_id, LifecycleState::Inactive)
            .await?;
        self.commit(
            automation,
            LifecycleState::Inactive,
            reason,
            actor,
            metadata,
            false,
        )
        .await
    }

    /// Create the automation row and activate it in one atomic commit.
    ///
    /// Used by the approval workflow when a CREATION request is approved:
    /// the automation exists only from this moment on, already `Active`,
    /// with its `PendingApproval -> Active` transition as sequence 1.
    /// The caller holds the automation's lock.
    pub(crate) async fn activate_new_locked(
        &self,
        automation: Automation,
        reason: &str,
        actor: &str,
        metadata: serde_json::Value,
    ) -> Result<Automation, GovError> {
        automation.validate()?;
        self.push_config(&automation.platform_id, &automation.config)
            .await?;
        self.push_state(&automation.platform_id, LifecycleState::Active)
            .await?;
        self.commit(
            automation,
            LifecycleState::Active,
            reason,
            actor,
            metadata,
            true,
        )
        .await
    }

    /// Replace an automation's configuration as a modification transition.
    ///
    /// The governance state stays put (`Active -> Active` or
    /// `Inactive -> Inactive`); retired automations reject the edge.
    /// The caller holds the automation's lock.
    pub(crate) async fn modify_locked(
        &self,
        id: AutomationId,
        config: serde_json::Value,
        reason: &str,
        actor: &str,
        metadata: serde_json::Value,
    ) -> Result<Automation, GovError> {
        let mut automation = self.load(id).await?;
        let target = automation.state;
        if !automation.state.can_transition_to(target) {
            return Err(InvalidTransitionError {
                automation: id.to_string(),
                from: automation.state,
                to: target,
            }
            .into());
        }

        automation.config = config;
        self.push_config(&automation.platform_id, &automation.config)
            .await?;
        self.commit(automation, target, reason, actor, metadata, false)
            .await
    }

    /// Look up an automation by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] when no automation with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_automation(&self, id: AutomationId) -> Result<Automation, GovError> {
        self.load(id).await
    }

    /// List all automations, retired ones included.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_automations(&self) -> Result<Vec<Automation>, GovError> {
        self.automation_repo.get_all().await
    }

    /// Current state, transition count, and aggregated metrics.
    ///
    /// Read-only; never contends with writers.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown automation, or a
    /// storage error.
    pub async fn get_stats(&self, id: AutomationId) -> Result<AutomationStats, GovError> {
        let automation = self.load(id).await?;
        let transition_count = self.transition_log.count_for(id).await?;
        Ok(AutomationStats {
            automation_id: id,
            state: automation.state,
            transition_count,
            metrics: automation.metrics,
        })
    }

    /// The automation's audit trail, ordered by ascending sequence.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the log.
    pub async fn list_transitions(
        &self,
        id: AutomationId,
    ) -> Result<Vec<LifecycleTransition>, GovError> {
        self.transition_log.list_for(id).await
    }

    /// Fold one platform execution report into the automation's metrics.
    ///
    /// Not a lifecycle transition: no audit record, no platform call.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] for an unknown automation, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn record_execution(
        &self,
        id: AutomationId,
        success: bool,
        duration_ms: u64,
    ) -> Result<Automation, GovError> {
        let _guard = self.locks.acquire(id).await;
        let mut automation = self.load(id).await?;
        automation.record_execution(success, duration_ms, now());
        self.automation_repo.update(automation).await
    }

    async fn load(&self, id: AutomationId) -> Result<Automation, GovError> {
        self.automation_repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Persist the state change and its audit record atomically, then
    /// publish the lifecycle event while the per-automation lock is still
    /// held, so notification order equals commit order.
    async fn commit(
        &self,
        mut automation: Automation,
        target: LifecycleState,
        reason: &str,
        actor: &str,
        metadata: serde_json::Value,
        is_new: bool,
    ) -> Result<Automation, GovError> {
        let previous = automation.state;
        let sequence = self.transition_log.next_sequence(automation.id).await?;
        automation.apply_state(target, actor, now());
        let transition = LifecycleTransition::new(
            automation.id,
            sequence,
            previous,
            target,
            reason,
            actor,
            metadata,
        );

        let automation = if is_new {
            self.automation_repo
                .create_with_transition(automation, transition.clone())
                .await?
        } else {
            self.automation_repo
                .update_with_transition(automation, transition.clone())
                .await?
        };

        tracing::info!(
            automation = %automation.id,
            %previous,
            next = %target,
            sequence,
            reason,
            "lifecycle transition committed"
        );

        let _ = self
            .publisher
            .publish(Event::new(
                EventKind::LifecycleChanged,
                Some(automation.id),
                serde_json::json!({
                    "previous": previous,
                    "next": target,
                    "reason": transition.reason,
                    "actor": transition.actor,
                    "sequence": sequence,
                    "version": automation.version,
                    "name": automation.name,
                }),
            ))
            .await;

        Ok(automation)
    }

    /// Platform side effects for a validated edge.
    ///
    /// Activation pushes the definition before the run state; a self-loop is
    /// a configuration replacement; deactivation and retirement only touch
    /// the run state.
    async fn push_to_platform(
        &self,
        automation: &Automation,
        target: LifecycleState,
    ) -> Result<(), GovError> {
        match (automation.state, target) {
            (from, to) if from == to => {
                self.push_config(&automation.platform_id, &automation.config)
                    .await
            }
            (_, LifecycleState::Active) => {
                self.push_config(&automation.platform_id, &automation.config)
                    .await?;
                self.push_state(&automation.platform_id, LifecycleState::Active)
                    .await
            }
            (_, state) => self.push_state(&automation.platform_id, state).await,
        }
    }

    async fn push_state(
        &self,
        platform_id: &str,
        state: LifecycleState,
    ) -> Result<(), GovError> {
        let mut attempt = 1;
        loop {
            match self.platform.apply_state(platform_id, state).await {
                Ok(()) => return Ok(()),
                Err(err) if err.transient && attempt < PLATFORM_ATTEMPTS => {
                    tracing::warn!(error = %err, attempt, "transient platform failure, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn push_config(
        &self,
        platform_id: &str,
        config: &serde_json::Value,
    ) -> Result<(), GovError> {
        let mut attempt = 1;
        loop {
            match self.platform.apply_config(platform_id, config).await {
                Ok(()) => return Ok(()),
                Err(err) if err.transient && attempt < PLATFORM_ATTEMPTS => {
                    tracing::warn!(error = %err, attempt, "transient platform failure, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory port doubles shared by the service tests.

    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use govhub_domain::approval::ApprovalRequest;
    use govhub_domain::automation::{Automation, LifecycleState};
    use govhub_domain::backup::Backup;
    use govhub_domain::error::{GovError, PlatformGatewayError};
    use govhub_domain::id::{AutomationId, BackupId, RequestId, StopEventId};
    use govhub_domain::stop::EmergencyStopEvent;
    use govhub_domain::transition::LifecycleTransition;

    use crate::ports::{
        ApprovalRepository, AutomationRepository, BackupStore, PlatformGateway,
        StopEventRepository, TransitionLog,
    };

    /// Shared in-memory store implementing every repository port, so a test
    /// can hand clones of one store to several services.
    #[derive(Clone, Default)]
    pub struct InMemoryStore {
        inner: Arc<Mutex<StoreInner>>,
    }

    #[derive(Default)]
    struct StoreInner {
        automations: HashMap<AutomationId, Automation>,
        transitions: Vec<LifecycleTransition>,
        requests: HashMap<RequestId, ApprovalRequest>,
        backups: HashMap<BackupId, Backup>,
        stop_events: HashMap<StopEventId, EmergencyStopEvent>,
    }

    impl InMemoryStore {
        /// Insert an automation directly, bypassing the lifecycle engine.
        pub fn seed_automation(&self, automation: Automation) {
            let mut inner = self.inner.lock().unwrap();
            inner.automations.insert(automation.id, automation);
        }

        pub fn transition_count(&self, id: AutomationId) -> usize {
            let inner = self.inner.lock().unwrap();
            inner
                .transitions
                .iter()
                .filter(|t| t.automation_id == id)
                .count()
        }

        pub fn transitions_for(&self, id: AutomationId) -> Vec<LifecycleTransition> {
            let inner = self.inner.lock().unwrap();
            inner
                .transitions
                .iter()
                .filter(|t| t.automation_id == id)
                .cloned()
                .collect()
        }

        pub fn backup_count(&self, id: AutomationId) -> usize {
            let inner = self.inner.lock().unwrap();
            inner
                .backups
                .values()
                .filter(|b| b.automation_id == id)
                .count()
        }
    }

    impl AutomationRepository for InMemoryStore {
        fn create_with_transition(
            &self,
            automation: Automation,
            transition: LifecycleTransition,
        ) -> impl Future<Output = Result<Automation, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.automations.insert(automation.id, automation.clone());
            inner.transitions.push(transition);
            async { Ok(automation) }
        }

        fn update_with_transition(
            &self,
            automation: Automation,
            transition: LifecycleTransition,
        ) -> impl Future<Output = Result<Automation, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.automations.insert(automation.id, automation.clone());
            inner.transitions.push(transition);
            async { Ok(automation) }
        }

        fn update(
            &self,
            automation: Automation,
        ) -> impl Future<Output = Result<Automation, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.automations.insert(automation.id, automation.clone());
            async { Ok(automation) }
        }

        fn get_by_id(
            &self,
            id: AutomationId,
        ) -> impl Future<Output = Result<Option<Automation>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let result = inner.automations.get(&id).cloned();
            async { Ok(result) }
        }

        fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let result: Vec<Automation> = inner.automations.values().cloned().collect();
            async { Ok(result) }
        }
    }

    impl TransitionLog for InMemoryStore {
        fn list_for(
            &self,
            automation_id: AutomationId,
        ) -> impl Future<Output = Result<Vec<LifecycleTransition>, GovError>> + Send {
            let result = self.transitions_for(automation_id);
            async { Ok(result) }
        }

        fn count_for(
            &self,
            automation_id: AutomationId,
        ) -> impl Future<Output = Result<u64, GovError>> + Send {
            let result = self.transition_count(automation_id) as u64;
            async move { Ok(result) }
        }

        fn next_sequence(
            &self,
            automation_id: AutomationId,
        ) -> impl Future<Output = Result<u64, GovError>> + Send {
            let result = self.transition_count(automation_id) as u64 + 1;
            async move { Ok(result) }
        }
    }

    impl ApprovalRepository for InMemoryStore {
        fn create(
            &self,
            request: ApprovalRequest,
        ) -> impl Future<Output = Result<ApprovalRequest, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.insert(request.id, request.clone());
            async { Ok(request) }
        }

        fn get_by_id(
            &self,
            id: RequestId,
        ) -> impl Future<Output = Result<Option<ApprovalRequest>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let result = inner.requests.get(&id).cloned();
            async { Ok(result) }
        }

        fn get_all(
            &self,
        ) -> impl Future<Output = Result<Vec<ApprovalRequest>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let mut result: Vec<ApprovalRequest> = inner.requests.values().cloned().collect();
            result.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
            async { Ok(result) }
        }

        fn update(
            &self,
            request: ApprovalRequest,
        ) -> impl Future<Output = Result<ApprovalRequest, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.insert(request.id, request.clone());
            async { Ok(request) }
        }

        fn find_pending_for(
            &self,
            automation_id: AutomationId,
        ) -> impl Future<Output = Result<Vec<ApprovalRequest>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let result: Vec<ApprovalRequest> = inner
                .requests
                .values()
                .filter(|r| r.automation_id == automation_id && !r.status.is_terminal())
                .cloned()
                .collect();
            async { Ok(result) }
        }
    }

    impl BackupStore for InMemoryStore {
        fn insert(&self, backup: Backup) -> impl Future<Output = Result<Backup, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.backups.insert(backup.id, backup.clone());
            async { Ok(backup) }
        }

        fn get_by_id(
            &self,
            id: BackupId,
        ) -> impl Future<Output = Result<Option<Backup>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let result = inner.backups.get(&id).cloned();
            async { Ok(result) }
        }

        fn list_for(
            &self,
            automation_id: AutomationId,
        ) -> impl Future<Output = Result<Vec<Backup>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let mut result: Vec<Backup> = inner
                .backups
                .values()
                .filter(|b| b.automation_id == automation_id)
                .cloned()
                .collect();
            result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            async { Ok(result) }
        }

        fn delete(&self, id: BackupId) -> impl Future<Output = Result<(), GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.backups.remove(&id);
            async { Ok(()) }
        }
    }

    impl StopEventRepository for InMemoryStore {
        fn create(
            &self,
            event: EmergencyStopEvent,
        ) -> impl Future<Output = Result<EmergencyStopEvent, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.stop_events.insert(event.id, event.clone());
            async { Ok(event) }
        }

        fn get_by_id(
            &self,
            id: StopEventId,
        ) -> impl Future<Output = Result<Option<EmergencyStopEvent>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let result = inner.stop_events.get(&id).cloned();
            async { Ok(result) }
        }

        fn get_recent(
            &self,
            limit: usize,
        ) -> impl Future<Output = Result<Vec<EmergencyStopEvent>, GovError>> + Send {
            let inner = self.inner.lock().unwrap();
            let mut result: Vec<EmergencyStopEvent> =
                inner.stop_events.values().cloned().collect();
            result.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
            result.truncate(limit);
            async { Ok(result) }
        }

        fn update(
            &self,
            event: EmergencyStopEvent,
        ) -> impl Future<Output = Result<EmergencyStopEvent, GovError>> + Send {
            let mut inner = self.inner.lock().unwrap();
            inner.stop_events.insert(event.id, event.clone());
            async { Ok(event) }
        }
    }

    /// Platform double recording every call; failures are scripted per
    /// platform id.
    #[derive(Clone, Default)]
    pub struct RecordingPlatform {
        calls: Arc<Mutex<Vec<String>>>,
        permanent_failures: Arc<Mutex<Vec<String>>>,
        transient_failures_left: Arc<AtomicU32>,
    }

    impl RecordingPlatform {
        pub fn fail_permanently_for(&self, platform_id: &str) {
            self.permanent_failures
                .lock()
                .unwrap()
                .push(platform_id.to_string());
        }

        /// Make the next `count` calls fail with a transient error.
        pub fn fail_transiently(&self, count: u32) {
            self.transient_failures_left.store(count, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn check(&self, platform_id: &str, call: String) -> Result<(), PlatformGatewayError> {
            self.calls.lock().unwrap().push(call);
            if self
                .transient_failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(PlatformGatewayError {
                    transient: true,
                    message: "platform timeout".to_string(),
                });
            }
            if self
                .permanent_failures
                .lock()
                .unwrap()
                .iter()
                .any(|p| p == platform_id)
            {
                return Err(PlatformGatewayError {
                    transient: false,
                    message: "platform rejected the change".to_string(),
                });
            }
            Ok(())
        }
    }

    impl PlatformGateway for RecordingPlatform {
        fn apply_state(
            &self,
            platform_id: &str,
            state: LifecycleState,
        ) -> impl Future<Output = Result<(), PlatformGatewayError>> + Send {
            let result = self.check(platform_id, format!("state:{platform_id}:{state}"));
            async { result }
        }

        fn apply_config(
            &self,
            platform_id: &str,
            _config: &serde_json::Value,
        ) -> impl Future<Output = Result<(), PlatformGatewayError>> + Send {
            let result = self.check(platform_id, format!("config:{platform_id}"));
            async { result }
        }
    }

    /// A governance-ready automation in the given state.
    pub fn seeded_automation(state: LifecycleState) -> Automation {
        let mut automation = Automation::builder()
            .platform_id("automation.test_rule")
            .name("Test rule")
            .config(serde_json::json!({"trigger": "sunset"}))
            .created_by("user:alice")
            .build()
            .unwrap();
        automation.state = state;
        automation.enabled = state == LifecycleState::Active;
        automation
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{InMemoryStore, RecordingPlatform, seeded_automation};
    use super::*;
    use crate::event_bus::InProcessEventBus;

    type TestService =
        LifecycleService<InMemoryStore, InMemoryStore, Arc<InProcessEventBus>, RecordingPlatform>;

    fn make_service() -> (TestService, InMemoryStore, RecordingPlatform, Arc<InProcessEventBus>) {
        let store = InMemoryStore::default();
        let platform = RecordingPlatform::default();
        let bus = Arc::new(InProcessEventBus::new(64));
        let service = LifecycleService::new(
            store.clone(),
            store.clone(),
            Arc::clone(&bus),
            platform.clone(),
            Arc::new(AutomationLocks::new()),
        );
        (service, store, platform, bus)
    }

    #[tokio::test]
    async fn should_commit_transition_and_audit_record() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);

        let updated = service
            .transition(id, LifecycleState::Inactive, "voluntary pause", "user:alice", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(updated.state, LifecycleState::Inactive);
        assert_eq!(updated.version, 1);
        let transitions = store.transitions_for(id);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].previous, LifecycleState::Active);
        assert_eq!(transitions[0].next, LifecycleState::Inactive);
        assert_eq!(transitions[0].sequence, 1);
    }

    #[tokio::test]
    async fn should_reject_illegal_edge() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);

        let result = service
            .transition(id, LifecycleState::PendingApproval, "nope", "user:alice", serde_json::json!({}))
            .await;

        assert!(matches!(result, Err(GovError::InvalidTransition(_))));
        assert_eq!(store.transition_count(id), 0);
    }

    #[tokio::test]
    async fn should_keep_retired_absorbing() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::Retired);
        let id = automation.id;
        store.seed_automation(automation);

        for target in [LifecycleState::Active, LifecycleState::Inactive] {
            let result = service
                .transition(id, target, "resurrect", "user:alice", serde_json::json!({}))
                .await;
            assert!(matches!(result, Err(GovError::InvalidTransition(_))));
        }
        assert_eq!(store.transition_count(id), 0);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_automation() {
        let (service, _, _, _) = make_service();
        let result = service
            .transition(
                AutomationId::new(),
                LifecycleState::Inactive,
                "pause",
                "user:alice",
                serde_json::json!({}),
            )
            .await;
        assert!(matches!(result, Err(GovError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_retry_transient_platform_failures() {
        let (service, store, platform, _) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);
        platform.fail_transiently(2);

        let updated = service
            .transition(id, LifecycleState::Inactive, "pause", "user:alice", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(updated.state, LifecycleState::Inactive);
        assert_eq!(platform.calls().len(), 3);
    }

    #[tokio::test]
    async fn should_surface_permanent_platform_failure_without_committing() {
        let (service, store, platform, _) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);
        platform.fail_permanently_for("automation.test_rule");

        let result = service
            .transition(id, LifecycleState::Retired, "retire", "user:alice", serde_json::json!({}))
            .await;

        assert!(matches!(result, Err(GovError::Platform(_))));
        let unchanged = service.get_automation(id).await.unwrap();
        assert_eq!(unchanged.state, LifecycleState::Active);
        assert_eq!(store.transition_count(id), 0);
    }

    #[tokio::test]
    async fn should_publish_lifecycle_events_in_commit_order() {
        let (service, store, _, bus) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);
        let mut rx = bus.subscribe();

        service
            .transition(id, LifecycleState::Inactive, "pause", "user:alice", serde_json::json!({}))
            .await
            .unwrap();
        service
            .transition(id, LifecycleState::Active, "resume", "user:alice", serde_json::json!({}))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.data["sequence"], 1);
        assert_eq!(first.data["next"], "inactive");
        assert_eq!(second.data["sequence"], 2);
        assert_eq!(second.data["next"], "active");
    }

    #[tokio::test]
    async fn should_activate_new_automation_with_sequence_one() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::PendingApproval);
        let id = automation.id;

        let created = service
            .activate_new_locked(
                automation,
                "creation-approved",
                "policy",
                serde_json::json!({}),
            )
            .await
            .unwrap();

        assert_eq!(created.state, LifecycleState::Active);
        let transitions = store.transitions_for(id);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].previous, LifecycleState::PendingApproval);
        assert_eq!(transitions[0].next, LifecycleState::Active);
        assert_eq!(transitions[0].sequence, 1);
    }

    #[tokio::test]
    async fn should_force_inactive_from_any_nonterminal_state() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::Inactive);
        let id = automation.id;
        store.seed_automation(automation);

        let updated = service
            .force_inactive_locked(id, "user panic", "user:alice", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(updated.state, LifecycleState::Inactive);
        // Forced transitions are audited even when the state does not move.
        assert_eq!(store.transition_count(id), 1);
    }

    #[tokio::test]
    async fn should_not_force_inactive_on_retired() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::Retired);
        let id = automation.id;
        store.seed_automation(automation);

        let result = service
            .force_inactive_locked(id, "stop", "user:alice", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(GovError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn should_modify_config_keeping_state() {
        let (service, store, platform, _) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);

        let updated = service
            .modify_locked(
                id,
                serde_json::json!({"trigger": "sunrise"}),
                "modification-approved",
                "approver:bob",
                serde_json::json!({}),
            )
            .await
            .unwrap();

        assert_eq!(updated.state, LifecycleState::Active);
        assert_eq!(updated.config["trigger"], "sunrise");
        let transitions = store.transitions_for(id);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].reason, "modification-approved");
        // Modification only pushes the configuration, never the run state.
        assert!(platform.calls().iter().all(|c| c.starts_with("config:")));
    }

    #[tokio::test]
    async fn should_report_stats_with_transition_count() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);

        service
            .transition(id, LifecycleState::Inactive, "pause", "user:alice", serde_json::json!({}))
            .await
            .unwrap();

        let stats = service.get_stats(id).await.unwrap();
        assert_eq!(stats.state, LifecycleState::Inactive);
        assert_eq!(stats.transition_count, 1);
    }

    #[tokio::test]
    async fn should_record_execution_without_transition() {
        let (service, store, _, _) = make_service();
        let automation = seeded_automation(LifecycleState::Active);
        let id = automation.id;
        store.seed_automation(automation);

        let updated = service.record_execution(id, true, 120).await.unwrap();
        assert_eq!(updated.metrics.execution_count, 1);
        assert_eq!(store.transition_count(id), 0);
    }
}
