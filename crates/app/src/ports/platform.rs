//! Platform gateway port — the external home-automation platform.
//!
//! govhub calls the platform only at the moment a lifecycle transition
//! commits, to push the automation's definition or its run state. A gateway
//! failure fails the transition; nothing is partially applied.

use std::future::Future;

use govhub_domain::automation::LifecycleState;
use govhub_domain::error::PlatformGatewayError;

/// Driver for the external home-automation platform.
pub trait PlatformGateway {
    /// Push the automation's run state (activate, halt, or remove).
    fn apply_state(
        &self,
        platform_id: &str,
        state: LifecycleState,
    ) -> impl Future<Output = Result<(), PlatformGatewayError>> + Send;

    /// Push a replacement configuration for an existing automation.
    fn apply_config(
        &self,
        platform_id: &str,
        config: &serde_json::Value,
    ) -> impl Future<Output = Result<(), PlatformGatewayError>> + Send;
}

impl<T: PlatformGateway + Send + Sync> PlatformGateway for std::sync::Arc<T> {
    fn apply_state(
        &self,
        platform_id: &str,
        state: LifecycleState,
    ) -> impl Future<Output = Result<(), PlatformGatewayError>> + Send {
        (**self).apply_state(platform_id, state)
    }

    fn apply_config(
        &self,
        platform_id: &str,
        config: &serde_json::Value,
    ) -> impl Future<Output = Result<(), PlatformGatewayError>> + Send {
        (**self).apply_config(platform_id, config)
    }
}
