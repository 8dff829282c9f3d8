//! Event bus port — publish/subscribe for governance events.

use std::future::Future;

use govhub_domain::error::GovError;
use govhub_domain::event::Event;

/// Publishes governance events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), GovError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), GovError>> + Send {
        (**self).publish(event)
    }
}
