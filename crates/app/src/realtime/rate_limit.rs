//! Fixed-window rate limiting for the real-time layer.
//!
//! Budgets are tracked per session id and per network origin, plus a cap on
//! concurrent connections per origin. Exceeding a budget produces a
//! [`RateLimitError`] for the sender — the message is dropped but the
//! connection stays open.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use govhub_domain::error::{RateLimitError, RateLimitScope};
use govhub_domain::id::SessionId;

/// Budgets applied by the limiter. Injected configuration, not hard-coded.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Messages one session may send per window.
    pub session_messages_per_window: u32,
    /// Messages one origin may send per window, across its sessions.
    pub origin_messages_per_window: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Concurrent connections allowed per origin.
    pub max_connections_per_origin: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            session_messages_per_window: 100,
            origin_messages_per_window: 300,
            window_secs: 60,
            max_connections_per_origin: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RateKey {
    Session(SessionId),
    Origin(String),
}

struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window counters per session and per origin.
pub struct FixedWindowRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<RateKey, Window>>,
    connections: Mutex<HashMap<String, u32>>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Charge one inbound message against the session and origin budgets.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] naming the exhausted budget; the caller
    /// drops the message and keeps the connection open.
    pub async fn allow_message(
        &self,
        session: SessionId,
        origin: &str,
    ) -> Result<(), RateLimitError> {
        let window = Duration::from_secs(self.config.window_secs);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        charge(
            &mut windows,
            RateKey::Session(session),
            self.config.session_messages_per_window,
            window,
            now,
            RateLimitScope::Session,
        )?;
        charge(
            &mut windows,
            RateKey::Origin(origin.to_string()),
            self.config.origin_messages_per_window,
            window,
            now,
            RateLimitScope::Origin,
        )
    }

    /// Claim a connection slot for an origin.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] when the origin is at its concurrent
    /// connection cap.
    pub async fn connection_opened(&self, origin: &str) -> Result<(), RateLimitError> {
        let mut connections = self.connections.lock().await;
        let count = connections.entry(origin.to_string()).or_insert(0);
        if *count >= self.config.max_connections_per_origin {
            return Err(RateLimitError {
                scope: RateLimitScope::Connections,
                limit: self.config.max_connections_per_origin,
                retry_after_secs: 0,
            });
        }
        *count += 1;
        Ok(())
    }

    /// Release an origin's connection slot. Idempotent once the count
    /// reaches zero.
    pub async fn connection_closed(&self, origin: &str) {
        let mut connections = self.connections.lock().await;
        if let Some(count) = connections.get_mut(origin) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                connections.remove(origin);
            }
        }
    }

    /// Current connection count for an origin.
    pub async fn active_connections(&self, origin: &str) -> u32 {
        self.connections.lock().await.get(origin).copied().unwrap_or(0)
    }
}

/// Charge one unit against a fixed window, resetting it when expired.
fn charge(
    windows: &mut HashMap<RateKey, Window>,
    key: RateKey,
    limit: u32,
    window: Duration,
    now: Instant,
    scope: RateLimitScope,
) -> Result<(), RateLimitError> {
    let entry = windows.entry(key).or_insert(Window {
        started_at: now,
        count: 0,
    });
    let elapsed = now.duration_since(entry.started_at);
    if elapsed >= window {
        entry.started_at = now;
        entry.count = 0;
    }
    if entry.count >= limit {
        let retry_after = window.saturating_sub(now.duration_since(entry.started_at));
        return Err(RateLimitError {
            scope,
            limit,
            retry_after_secs: retry_after.as_secs().max(1),
        });
    }
    entry.count += 1;
    Ok(())
}
