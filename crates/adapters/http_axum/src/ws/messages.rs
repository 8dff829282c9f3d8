//! WebSocket message types — the client transport protocol.
//!
//! Every frame is a JSON object with a `type` discriminator. Client frames
//! other than `auth` and `ping` require a previously-authenticated session;
//! violations produce a typed `error` frame, never a connection close.

use serde::{Deserialize, Serialize};

use govhub_app::realtime::Notification;
use govhub_app::realtime::broker::Topic;
use govhub_domain::error::GovError;
use govhub_domain::time::Timestamp;

use crate::error::{error_kind, error_message};

/// All message types that can be received from a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Present a token; the only state-changing frame allowed before
    /// authentication.
    Auth { token: String },

    /// Register interest in a topic, scoped to one automation or `"all"`.
    Subscribe { topic: String, scope: String },

    /// Drop a previous subscription.
    Unsubscribe { topic: String, scope: String },

    /// Approve a pending request (typically an AI suggestion).
    ApproveSuggestion {
        request_id: String,
        notes: Option<String>,
    },

    /// Reject a pending request with a reason.
    RejectSuggestion { request_id: String, reason: String },

    /// Heartbeat request.
    Ping,
}

impl ClientMessage {
    /// Whether the frame is allowed on an unauthenticated session.
    #[must_use]
    pub fn allowed_unauthenticated(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Ping)
    }
}

/// All message types that can be sent to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted; the session id is the client's handle.
    Welcome {
        session_id: String,
        timestamp: Timestamp,
    },

    /// Authentication succeeded.
    AuthOk { user_id: String },

    /// Subscription registered.
    SubscriptionOk { topic: String, scope: String },

    /// Subscription removed.
    Unsubscribed { topic: String, scope: String },

    /// Lifecycle state change for a subscribed automation.
    LifecycleUpdate(Notification),

    /// Approval workflow progress for a subscribed automation.
    ApprovalUpdate(Notification),

    /// Emergency stop or recovery progress.
    EmergencyUpdate(Notification),

    /// A configuration snapshot was written.
    BackupUpdate(Notification),

    /// A request failed; the connection stays open.
    Error { code: String, message: String },

    /// Heartbeat response.
    Pong { timestamp: Timestamp },
}

impl ServerMessage {
    /// Wrap a broker notification in its `*_update` frame.
    #[must_use]
    pub fn from_notification(notification: Notification) -> Self {
        match notification.topic {
            Topic::Lifecycle => Self::LifecycleUpdate(notification),
            Topic::Approval => Self::ApprovalUpdate(notification),
            Topic::Emergency => Self::EmergencyUpdate(notification),
            Topic::Backup => Self::BackupUpdate(notification),
        }
    }

    /// Shape a [`GovError`] into a typed error frame.
    #[must_use]
    pub fn from_error(err: &GovError) -> Self {
        Self::Error {
            code: error_kind(err).to_string(),
            message: error_message(err),
        }
    }

    /// An error frame for a frame that could not be parsed at all.
    #[must_use]
    pub fn malformed(detail: &str) -> Self {
        Self::Error {
            code: "malformed".to_string(),
            message: format!("could not parse message: {detail}"),
        }
    }
}
