//! # govhub-adapter-platform-virtual
//!
//! Virtual home-automation platform — an in-process stand-in used by the
//! daemon in demo mode and by tests. It remembers what was pushed to it and
//! can be scripted to fail, which is how partial-failure paths (emergency
//! stop, recovery) are exercised without a real platform.
//!
//! ## Dependency rule
//!
//! Depends on `govhub-app` (port traits) and `govhub-domain` only.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use govhub_app::ports::PlatformGateway;
use govhub_domain::automation::LifecycleState;
use govhub_domain::error::PlatformGatewayError;

/// What the virtual platform currently believes about one automation.
#[derive(Debug, Clone, Default)]
pub struct PlatformRecord {
    pub config: serde_json::Value,
    pub state: Option<LifecycleState>,
}

/// In-process platform gateway with scriptable failures.
#[derive(Default)]
pub struct VirtualPlatformGateway {
    records: Mutex<HashMap<String, PlatformRecord>>,
    failing: Mutex<HashSet<String>>,
}

impl VirtualPlatformGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call for this platform id fail until cleared.
    pub fn set_failing(&self, platform_id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if failing {
            set.insert(platform_id.to_string());
        } else {
            set.remove(platform_id);
        }
    }

    /// What the platform believes about one automation, if anything was
    /// ever pushed.
    pub fn record_of(&self, platform_id: &str) -> Option<PlatformRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(platform_id)
            .cloned()
    }

    fn check(&self, platform_id: &str) -> Result<(), PlatformGatewayError> {
        if self
            .failing
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains(platform_id)
        {
            return Err(PlatformGatewayError {
                transient: false,
                message: format!("virtual platform scripted to fail for {platform_id}"),
            });
        }
        Ok(())
    }
}

impl PlatformGateway for VirtualPlatformGateway {
    async fn apply_state(
        &self,
        platform_id: &str,
        state: LifecycleState,
    ) -> Result<(), PlatformGatewayError> {
        self.check(platform_id)?;
        let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        records.entry(platform_id.to_string()).or_default().state = Some(state);
        tracing::debug!(platform_id, %state, "virtual platform applied state");
        Ok(())
    }

    async fn apply_config(
        &self,
        platform_id: &str,
        config: &serde_json::Value,
    ) -> Result<(), PlatformGatewayError> {
        self.check(platform_id)?;
        let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        records.entry(platform_id.to_string()).or_default().config = config.clone();
        tracing::debug!(platform_id, "virtual platform applied config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_remember_pushed_state_and_config() {
        let gateway = VirtualPlatformGateway::new();

        gateway
            .apply_config("automation.porch", &serde_json::json!({"trigger": "dusk"}))
            .await
            .unwrap();
        gateway
            .apply_state("automation.porch", LifecycleState::Active)
            .await
            .unwrap();

        let record = gateway.record_of("automation.porch").unwrap();
        assert_eq!(record.config["trigger"], "dusk");
        assert_eq!(record.state, Some(LifecycleState::Active));
    }

    #[tokio::test]
    async fn should_fail_when_scripted_and_recover_when_cleared() {
        let gateway = VirtualPlatformGateway::new();
        gateway.set_failing("automation.porch", true);

        let err = gateway
            .apply_state("automation.porch", LifecycleState::Inactive)
            .await
            .unwrap_err();
        assert!(!err.transient);

        gateway.set_failing("automation.porch", false);
        gateway
            .apply_state("automation.porch", LifecycleState::Inactive)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn should_not_fail_other_platform_ids() {
        let gateway = VirtualPlatformGateway::new();
        gateway.set_failing("automation.broken", true);

        gateway
            .apply_state("automation.fine", LifecycleState::Active)
            .await
            .unwrap();
    }
}
