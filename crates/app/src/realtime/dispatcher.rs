//! Notification dispatcher — the bridge from the event bus to the broker.
//!
//! This is the only writer allowed to publish lifecycle-derived content to
//! sessions; keeping the translation in one task keeps the message shape
//! centralized and preserves per-automation commit order (the bus is FIFO
//! and the loop forwards one event at a time).

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::event_bus::InProcessEventBus;

use super::broker::SubscriptionBroker;
use super::notification::Notification;

/// Long-lived task translating governance events into client notifications.
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    /// Subscribe to the bus and forward every event until the bus closes.
    pub fn spawn(
        bus: &InProcessEventBus,
        broker: Arc<SubscriptionBroker>,
    ) -> tokio::task::JoinHandle<()> {
        let mut events = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let notification = Notification::from_event(&event);
                        let reached = broker.publish(notification).await;
                        tracing::debug!(
                            event = ?event.kind,
                            automation = ?event.automation_id,
                            reached,
                            "dispatched notification"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "dispatcher lagged, notifications were dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::EventPublisher;
    use crate::realtime::broker::{Scope, Topic};
    use crate::realtime::session::SessionRegistry;
    use govhub_domain::event::{Event, EventKind};
    use govhub_domain::id::{AutomationId, SessionId};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn should_forward_bus_events_to_subscribed_sessions_in_order() {
        let registry = Arc::new(SessionRegistry::new());
        let broker = Arc::new(SubscriptionBroker::new(
            Arc::clone(&registry),
            Duration::from_millis(50),
        ));
        let bus = InProcessEventBus::new(64);
        let _dispatcher = NotificationDispatcher::spawn(&bus, Arc::clone(&broker));

        let session = SessionId::new();
        let (tx, mut rx) = mpsc::channel(8);
        registry.register(session, "203.0.113.7", tx).await;
        broker
            .subscribe(session, Topic::Lifecycle, Scope::All)
            .await
            .unwrap();

        let automation_id = AutomationId::new();
        for (sequence, next) in [(1, "inactive"), (2, "active")] {
            bus.publish(Event::new(
                EventKind::LifecycleChanged,
                Some(automation_id),
                serde_json::json!({
                    "next": next,
                    "name": "Porch light",
                    "reason": "test",
                    "sequence": sequence,
                }),
            ))
            .await
            .unwrap();
        }

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.status, "inactive");
        assert_eq!(second.status, "active");
    }

    #[tokio::test]
    async fn should_ignore_events_nobody_subscribed_to() {
        let registry = Arc::new(SessionRegistry::new());
        let broker = Arc::new(SubscriptionBroker::new(
            registry,
            Duration::from_millis(50),
        ));
        let bus = InProcessEventBus::new(64);
        let handle = NotificationDispatcher::spawn(&bus, broker);

        bus.publish(Event::new(EventKind::BackupCreated, None, serde_json::json!({})))
            .await
            .unwrap();

        // The dispatcher keeps running after an undeliverable event.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
