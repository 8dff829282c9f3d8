//! Automation — a governed rule instance executed by the external platform.
//!
//! govhub never runs an automation itself; it owns the rule's *governance*
//! state. Every mutation goes through a lifecycle transition and leaves an
//! audit record. The actual trigger/action definition is an opaque
//! configuration blob pushed to the home-automation platform.

use serde::{Deserialize, Serialize};

use crate::error::{GovError, ValidationError};
use crate::id::AutomationId;
use crate::time::Timestamp;

/// Governance lifecycle state of an automation.
///
/// `Retired` is absorbing: once an automation is retired no transition may
/// ever leave that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Proposed but not yet approved; the platform knows nothing about it.
    PendingApproval,
    /// Approved and running on the platform.
    Active,
    /// Halted — by emergency stop or a voluntary pause.
    Inactive,
    /// Permanently removed from service. Terminal.
    Retired,
}

impl LifecycleState {
    /// Whether the state machine allows the edge `self -> target`.
    ///
    /// Self-loops on `Active` and `Inactive` are modifications: the
    /// configuration changes while the governance state stays put.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        use LifecycleState::{Active, Inactive, PendingApproval, Retired};
        matches!(
            (self, target),
            (PendingApproval, Active)
                | (Active, Active | Inactive | Retired)
                | (Inactive, Active | Inactive | Retired)
        )
    }

    /// Whether no transition may ever leave this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Retired)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PendingApproval => "pending_approval",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Retired => "retired",
        };
        f.write_str(s)
    }
}

/// Aggregated execution statistics reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// Total number of executions reported.
    pub execution_count: u64,
    /// Executions that completed successfully.
    pub success_count: u64,
    /// Running average duration across all executions, in milliseconds.
    pub average_duration_ms: f64,
}

impl ExecutionMetrics {
    /// Fraction of executions that succeeded, in `0.0..=1.0`.
    ///
    /// Returns `1.0` when nothing has executed yet — an automation with no
    /// history has no observed failures.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.success_count as f64 / self.execution_count as f64
        }
    }

    /// Fold one execution report into the running aggregates.
    #[allow(clippy::cast_precision_loss)]
    pub fn record(&mut self, success: bool, duration_ms: u64) {
        let previous_total = self.average_duration_ms * self.execution_count as f64;
        self.execution_count += 1;
        if success {
            self.success_count += 1;
        }
        self.average_duration_ms =
            (previous_total + duration_ms as f64) / self.execution_count as f64;
    }
}

/// A named, stateful rule instance managed by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    /// Identifier assigned by the external home-automation platform.
    pub platform_id: String,
    pub name: String,
    pub description: String,
    pub state: LifecycleState,
    /// Opaque platform-level definition (triggers, actions, schedules).
    pub config: serde_json::Value,
    pub metrics: ExecutionMetrics,
    /// Optimistic version, bumped on every committed transition.
    pub version: u64,
    pub enabled: bool,
    pub created_at: Timestamp,
    pub created_by: String,
    pub updated_at: Timestamp,
    pub updated_by: String,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - `platform_id` is empty ([`ValidationError::EmptyPlatformId`])
    /// - `created_by` is empty ([`ValidationError::EmptyActor`])
    pub fn validate(&self) -> Result<(), GovError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.platform_id.is_empty() {
            return Err(ValidationError::EmptyPlatformId.into());
        }
        if self.created_by.is_empty() {
            return Err(ValidationError::EmptyActor.into());
        }
        Ok(())
    }

    /// Apply a committed transition: new state, bumped version, audit fields.
    pub fn apply_state(&mut self, state: LifecycleState, actor: &str, at: Timestamp) {
        self.state = state;
        self.enabled = state == LifecycleState::Active;
        self.version += 1;
        self.updated_at = at;
        self.updated_by = actor.to_string();
    }

    /// Fold one platform execution report into the metrics.
    pub fn record_execution(&mut self, success: bool, duration_ms: u64, at: Timestamp) {
        self.metrics.record(success, duration_ms);
        self.updated_at = at;
    }
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    platform_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    config: Option<serde_json::Value>,
    created_by: Option<String>,
    created_at: Option<Timestamp>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn platform_id(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = Some(platform_id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// New automations always start in `PendingApproval`; only a lifecycle
    /// transition can move them forward.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<Automation, GovError> {
        let created_at = self.created_at.unwrap_or_else(crate::time::now);
        let created_by = self.created_by.unwrap_or_default();
        let automation = Automation {
            id: self.id.unwrap_or_default(),
            platform_id: self.platform_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            state: LifecycleState::PendingApproval,
            config: self.config.unwrap_or_else(|| serde_json::json!({})),
            metrics: ExecutionMetrics::default(),
            version: 0,
            enabled: false,
            created_at,
            updated_at: created_at,
            updated_by: created_by.clone(),
            created_by,
        };
        automation.validate()?;
        Ok(automation)
    }
}
