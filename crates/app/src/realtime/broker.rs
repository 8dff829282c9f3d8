//! Subscription broker — topic- and scope-keyed fan-out to sessions.
//!
//! The registry `(topic, scope) -> session set` is the only structure shared
//! across sessions. Publishes take a read lock so unrelated topics never
//! block each other; subscribes take the write lock briefly. Delivery to a
//! slow session is bounded by a per-session send timeout, after which the
//! session is evicted rather than stalling anyone else.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::sync::mpsc;

use govhub_domain::error::{GovError, NotFoundError};
use govhub_domain::id::{AutomationId, SessionId};

use super::notification::Notification;
use super::session::SessionRegistry;

/// Event families a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Lifecycle,
    Approval,
    Emergency,
    Backup,
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lifecycle" => Ok(Self::Lifecycle),
            "approval" => Ok(Self::Approval),
            "emergency" => Ok(Self::Emergency),
            "backup" => Ok(Self::Backup),
            other => Err(format!("unknown topic: {other}")),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lifecycle => "lifecycle",
            Self::Approval => "approval",
            Self::Emergency => "emergency",
            Self::Backup => "backup",
        };
        f.write_str(s)
    }
}

/// Which resources within a topic the subscription covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every resource of the topic.
    All,
    /// One specific automation.
    Automation(AutomationId),
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        s.parse::<AutomationId>()
            .map(Self::Automation)
            .map_err(|_| format!("scope must be 'all' or an automation id, got: {s}"))
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Automation(id) => id.fmt(f),
        }
    }
}

/// Maps `(topic, scope)` to interested sessions and fans notifications out.
pub struct SubscriptionBroker {
    registry: Arc<SessionRegistry>,
    topics: RwLock<HashMap<Topic, HashMap<Scope, HashSet<SessionId>>>>,
    /// Reverse index for O(1) cleanup when a session dies.
    by_session: RwLock<HashMap<SessionId, HashSet<(Topic, Scope)>>>,
    send_timeout: Duration,
}

impl SubscriptionBroker {
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            topics: RwLock::new(HashMap::new()),
            by_session: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    /// Register a session's interest in `(topic, scope)`.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] when the session is not registered
    /// (already disconnected).
    pub async fn subscribe(
        &self,
        session: SessionId,
        topic: Topic,
        scope: Scope,
    ) -> Result<(), GovError> {
        if !self.registry.contains(session).await {
            return Err(NotFoundError {
                entity: "Session",
                id: session.to_string(),
            }
            .into());
        }

        let mut topics = self.topics.write().await;
        topics
            .entry(topic)
            .or_default()
            .entry(scope)
            .or_default()
            .insert(session);
        drop(topics);

        self.by_session
            .write()
            .await
            .entry(session)
            .or_default()
            .insert((topic, scope));
        Ok(())
    }

    /// Remove one `(topic, scope)` subscription. Unknown subscriptions are
    /// a no-op.
    pub async fn unsubscribe(&self, session: SessionId, topic: Topic, scope: Scope) {
        let mut topics = self.topics.write().await;
        if let Some(scopes) = topics.get_mut(&topic) {
            if let Some(sessions) = scopes.get_mut(&scope) {
                sessions.remove(&session);
                if sessions.is_empty() {
                    scopes.remove(&scope);
                }
            }
            if scopes.is_empty() {
                topics.remove(&topic);
            }
        }
        drop(topics);

        let mut by_session = self.by_session.write().await;
        if let Some(keys) = by_session.get_mut(&session) {
            keys.remove(&(topic, scope));
            if keys.is_empty() {
                by_session.remove(&session);
            }
        }
    }

    /// Drop every subscription a session holds. Idempotent.
    pub async fn unsubscribe_session(&self, session: SessionId) {
        let keys = self.by_session.write().await.remove(&session);
        let Some(keys) = keys else { return };

        let mut topics = self.topics.write().await;
        for (topic, scope) in keys {
            if let Some(scopes) = topics.get_mut(&topic) {
                if let Some(sessions) = scopes.get_mut(&scope) {
                    sessions.remove(&session);
                    if sessions.is_empty() {
                        scopes.remove(&scope);
                    }
                }
                if scopes.is_empty() {
                    topics.remove(&topic);
                }
            }
        }
    }

    /// Number of `(topic, scope)` entries a session holds.
    pub async fn subscription_count(&self, session: SessionId) -> usize {
        self.by_session
            .read()
            .await
            .get(&session)
            .map_or(0, HashSet::len)
    }

    /// Deliver a notification to every session whose subscription matches
    /// the exact scope or the `all` wildcard for its topic.
    ///
    /// Fast sessions get the message via a non-blocking send; sessions with
    /// a full outbound queue get one bounded, timed send. A session that is
    /// closed or misses the timeout is unregistered — it never blocks
    /// delivery to the others. Returns the number of sessions reached.
    pub async fn publish(&self, notification: Notification) -> usize {
        let targets: Vec<SessionId> = {
            let topics = self.topics.read().await;
            let Some(scopes) = topics.get(&notification.topic) else {
                return 0;
            };
            let mut targets = HashSet::new();
            if let Some(sessions) = scopes.get(&Scope::All) {
                targets.extend(sessions.iter().copied());
            }
            if let Some(id) = notification.automation_id {
                if let Some(sessions) = scopes.get(&Scope::Automation(id)) {
                    targets.extend(sessions.iter().copied());
                }
            }
            targets.into_iter().collect()
        };

        let mut delivered = 0;
        let mut slow = Vec::new();
        let mut dead = Vec::new();
        for session in targets {
            let Some(sender) = self.registry.sender(session).await else {
                dead.push(session);
                continue;
            };
            match sender.try_send(notification.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => slow.push((session, sender)),
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(session),
            }
        }

        // One bounded attempt per slow session, all in parallel; a timeout
        // marks the session unresponsive.
        if !slow.is_empty() {
            let timeout = self.send_timeout;
            let attempts = slow.into_iter().map(|(session, sender)| {
                let notification = notification.clone();
                async move {
                    match tokio::time::timeout(timeout, sender.send(notification)).await {
                        Ok(Ok(())) => (session, true),
                        _ => (session, false),
                    }
                }
            });
            for (session, ok) in futures::future::join_all(attempts).await {
                if ok {
                    delivered += 1;
                } else {
                    dead.push(session);
                }
            }
        }

        for session in dead {
            tracing::debug!(session = %session, "evicting unresponsive session");
            self.registry.unregister(session).await;
            self.unsubscribe_session(session).await;
        }

        delivered
    }
}
