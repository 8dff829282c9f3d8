//! Session registry — live connections and their authentication state.
//!
//! One session is one real-time connection. Sessions are in-memory only and
//! die with the process; cleanup is idempotent and runs on disconnect,
//! explicit logout, or the heartbeat sweeper finding an idle session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc};

use govhub_domain::error::{GovError, NotFoundError};
use govhub_domain::id::{SessionId, UserId};
use govhub_domain::time::{Timestamp, now};

use super::broker::SubscriptionBroker;
use super::notification::Notification;

struct Session {
    user: Option<UserId>,
    origin: String,
    connected_at: Timestamp,
    last_seen: Instant,
    outbound: mpsc::Sender<Notification>,
}

/// Registry of live real-time sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly-opened connection. The session starts
    /// unauthenticated: it may only send `auth` and `ping` messages until
    /// [`Self::authenticate`] succeeds.
    pub async fn register(
        &self,
        id: SessionId,
        origin: impl Into<String>,
        outbound: mpsc::Sender<Notification>,
    ) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            Session {
                user: None,
                origin: origin.into(),
                connected_at: now(),
                last_seen: Instant::now(),
                outbound,
            },
        );
    }

    /// Attach a verified identity to a session.
    ///
    /// # Errors
    ///
    /// Returns [`GovError::NotFound`] when the session is already gone.
    pub async fn authenticate(&self, id: SessionId, user: UserId) -> Result<(), GovError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id).ok_or_else(|| {
            GovError::from(NotFoundError {
                entity: "Session",
                id: id.to_string(),
            })
        })?;
        session.user = Some(user);
        Ok(())
    }

    /// The verified identity behind a session, if any.
    pub async fn user_of(&self, id: SessionId) -> Option<UserId> {
        self.sessions.read().await.get(&id).and_then(|s| s.user)
    }

    /// Whether the session has authenticated.
    pub async fn is_authenticated(&self, id: SessionId) -> bool {
        self.user_of(id).await.is_some()
    }

    /// The network origin the session connected from.
    pub async fn origin_of(&self, id: SessionId) -> Option<String> {
        self.sessions.read().await.get(&id).map(|s| s.origin.clone())
    }

    /// Record inbound traffic for the heartbeat supervisor.
    pub async fn touch(&self, id: SessionId) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.last_seen = Instant::now();
        }
    }

    /// Drop a session. Idempotent: removing an unknown session is a no-op.
    /// Returns whether the session was present.
    pub async fn unregister(&self, id: SessionId) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// The outbound channel for one session, used by the broker.
    pub async fn sender(&self, id: SessionId) -> Option<mpsc::Sender<Notification>> {
        self.sessions.read().await.get(&id).map(|s| s.outbound.clone())
    }

    /// Whether the session is currently registered.
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// When the session connected.
    pub async fn connected_at(&self, id: SessionId) -> Option<Timestamp> {
        self.sessions.read().await.get(&id).map(|s| s.connected_at)
    }

    /// Sessions with no inbound traffic for longer than `max_idle`.
    pub async fn idle_sessions(&self, max_idle: Duration) -> Vec<SessionId> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(_, session)| session.last_seen.elapsed() > max_idle)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Supervising heartbeat: evict sessions that went quiet.
///
/// Runs until the process shuts down; eviction uses the same idempotent
/// cleanup as a disconnect.
pub fn spawn_heartbeat_sweeper(
    registry: Arc<SessionRegistry>,
    broker: Arc<SubscriptionBroker>,
    max_idle: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            for id in registry.idle_sessions(max_idle).await {
                tracing::info!(session = %id, "evicting idle session");
                registry.unregister(id).await;
                broker.unsubscribe_session(id).await;
            }
        }
    })
}
