//! WebSocket connection handler.
//!
//! One connection is one session: an inbound stream feeding this loop and
//! one outbound channel the broker pushes notifications into. Ordering and
//! backpressure are explicit in the channels — there is no callback
//! nesting. Protocol violations answer with a typed `error` frame; the
//! connection is only closed by the client, a transport failure, or
//! eviction.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use govhub_app::ports::{
    ApprovalRepository, AutomationRepository, BackupStore, EventPublisher, PlatformGateway,
    StopEventRepository, TransitionLog,
};
use govhub_app::realtime::broker::{Scope, Topic};
use govhub_app::realtime::notification::Notification;
use govhub_domain::approval::{ApprovalRequest, ApprovalStatus};
use govhub_domain::error::{AuthenticationError, GovError};
use govhub_domain::id::{RequestId, SessionId};
use govhub_domain::time::now;

use super::messages::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// Outbound queue depth per session. A session that falls this far behind
/// is subject to the broker's bounded send timeout and then eviction.
const OUTBOUND_BUFFER: usize = 64;

/// Optional peer address extractor. In axum 0.8 `ConnectInfo` no longer
/// implements the `Option` extractor path (the blanket `Option` impl was
/// removed), so this shim reproduces the previous `Option<ConnectInfo>`
/// behaviour: `Some` when connect info is present (including the test mock),
/// `None` otherwise — never rejecting the request.
pub struct MaybePeer(Option<SocketAddr>);

impl<S> FromRequestParts<S> for MaybePeer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
                .await
                .ok()
                .map(|ConnectInfo(addr)| addr),
        ))
    }
}

/// `GET /ws` — upgrade to the real-time protocol.
pub async fn ws_handler<AR, TL, PR, BS, SR, EP, PG>(
    ws: WebSocketUpgrade,
    MaybePeer(peer): MaybePeer,
    State(state): State<AppState<AR, TL, PR, BS, SR, EP, PG>>,
) -> Response
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let origin = peer
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, origin, state))
}

async fn handle_socket<AR, TL, PR, BS, SR, EP, PG>(
    socket: WebSocket,
    origin: String,
    state: AppState<AR, TL, PR, BS, SR, EP, PG>,
) where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    let (mut sink, mut stream) = socket.split();

    // The connection cap is the one violation answered before a session
    // even exists.
    if let Err(err) = state.rate_limiter.connection_opened(&origin).await {
        let _ = send(&mut sink, &ServerMessage::from_error(&err.into())).await;
        return;
    }

    let session_id = SessionId::new();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Notification>(OUTBOUND_BUFFER);
    state
        .sessions
        .register(session_id, origin.clone(), outbound_tx)
        .await;
    tracing::info!(session = %session_id, %origin, "session connected");

    let welcome = ServerMessage::Welcome {
        session_id: session_id.to_string(),
        timestamp: now(),
    };
    if send(&mut sink, &welcome).await.is_err() {
        cleanup(&state, session_id, &origin).await;
        return;
    }

    loop {
        tokio::select! {
            pushed = outbound_rx.recv() => match pushed {
                Some(notification) => {
                    let frame = ServerMessage::from_notification(notification);
                    if send(&mut sink, &frame).await.is_err() {
                        break;
                    }
                }
                // The registry dropped our sender: we were evicted.
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) =
                        process_text(&state, session_id, &origin, text.as_str()).await
                    {
                        if send(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Binary frames and protocol-level ping/pong are ignored.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(session = %session_id, error = %err, "receive error");
                    break;
                }
            },
        }
    }

    cleanup(&state, session_id, &origin).await;
}

/// Handle one inbound text frame; the returned frame (if any) is the direct
/// reply. Broker-fanned notifications travel the outbound channel instead.
async fn process_text<AR, TL, PR, BS, SR, EP, PG>(
    state: &AppState<AR, TL, PR, BS, SR, EP, PG>,
    session_id: SessionId,
    origin: &str,
    text: &str,
) -> Option<ServerMessage>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    state.sessions.touch(session_id).await;

    // Budget first: a flooding client gets errors, not processing.
    if let Err(err) = state.rate_limiter.allow_message(session_id, origin).await {
        return Some(ServerMessage::from_error(&err.into()));
    }

    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => return Some(ServerMessage::malformed(&err.to_string())),
    };

    if !message.allowed_unauthenticated() && !state.sessions.is_authenticated(session_id).await {
        let err: GovError = AuthenticationError {
            reason: "authenticate before sending this message".to_string(),
        }
        .into();
        return Some(ServerMessage::from_error(&err));
    }

    match message {
        ClientMessage::Auth { token } => match state.verifier.verify(&token) {
            Ok(user) => match state.sessions.authenticate(session_id, user).await {
                Ok(()) => Some(ServerMessage::AuthOk {
                    user_id: user.to_string(),
                }),
                Err(err) => Some(ServerMessage::from_error(&err)),
            },
            Err(err) => Some(ServerMessage::from_error(&err)),
        },
        ClientMessage::Ping => Some(ServerMessage::Pong { timestamp: now() }),
        ClientMessage::Subscribe { topic, scope } => match parse_subscription(&topic, &scope) {
            Ok((parsed_topic, parsed_scope)) => {
                match state
                    .broker
                    .subscribe(session_id, parsed_topic, parsed_scope)
                    .await
                {
                    Ok(()) => Some(ServerMessage::SubscriptionOk { topic, scope }),
                    Err(err) => Some(ServerMessage::from_error(&err)),
                }
            }
            Err(frame) => Some(frame),
        },
        ClientMessage::Unsubscribe { topic, scope } => match parse_subscription(&topic, &scope) {
            Ok((parsed_topic, parsed_scope)) => {
                state
                    .broker
                    .unsubscribe(session_id, parsed_topic, parsed_scope)
                    .await;
                Some(ServerMessage::Unsubscribed { topic, scope })
            }
            Err(frame) => Some(frame),
        },
        ClientMessage::ApproveSuggestion { request_id, notes } => {
            let actor = actor_of(state, session_id).await?;
            let request_id = match parse_request_id(&request_id) {
                Ok(id) => id,
                Err(frame) => return Some(frame),
            };
            match state.approvals.approve(request_id, &actor, notes).await {
                Ok(request) => Some(decision_ack(&request, &actor)),
                Err(err) => Some(ServerMessage::from_error(&err)),
            }
        }
        ClientMessage::RejectSuggestion { request_id, reason } => {
            let actor = actor_of(state, session_id).await?;
            let request_id = match parse_request_id(&request_id) {
                Ok(id) => id,
                Err(frame) => return Some(frame),
            };
            match state.approvals.reject(request_id, &actor, reason).await {
                Ok(request) => Some(decision_ack(&request, &actor)),
                Err(err) => Some(ServerMessage::from_error(&err)),
            }
        }
    }
}

async fn cleanup<AR, TL, PR, BS, SR, EP, PG>(
    state: &AppState<AR, TL, PR, BS, SR, EP, PG>,
    session_id: SessionId,
    origin: &str,
) where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    state.sessions.unregister(session_id).await;
    state.broker.unsubscribe_session(session_id).await;
    state.rate_limiter.connection_closed(origin).await;
    tracing::info!(session = %session_id, "session disconnected");
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sink.send(Message::Text(json.into())).await
}

/// Resolve the session's verified identity into an actor string. `None`
/// only happens when the session was evicted between the auth gate and
/// here; the frame then goes unanswered.
async fn actor_of<AR, TL, PR, BS, SR, EP, PG>(
    state: &AppState<AR, TL, PR, BS, SR, EP, PG>,
    session_id: SessionId,
) -> Option<String>
where
    AR: AutomationRepository + Send + Sync + 'static,
    TL: TransitionLog + Send + Sync + 'static,
    PR: ApprovalRepository + Send + Sync + 'static,
    BS: BackupStore + Send + Sync + 'static,
    SR: StopEventRepository + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
    PG: PlatformGateway + Send + Sync + 'static,
{
    state
        .sessions
        .user_of(session_id)
        .await
        .map(|user| format!("user:{user}"))
}

fn parse_request_id(raw: &str) -> Result<RequestId, ServerMessage> {
    raw.parse()
        .map_err(|_| ServerMessage::malformed(&format!("invalid request id: {raw}")))
}

fn parse_subscription(topic: &str, scope: &str) -> Result<(Topic, Scope), ServerMessage> {
    let topic = topic
        .parse::<Topic>()
        .map_err(|err| ServerMessage::malformed(&err))?;
    let scope = scope
        .parse::<Scope>()
        .map_err(|err| ServerMessage::malformed(&err))?;
    Ok((topic, scope))
}

/// Direct acknowledgement for a decision taken over the socket; subscribers
/// get the same fact through the dispatcher.
fn decision_ack(request: &ApprovalRequest, actor: &str) -> ServerMessage {
    let status = match request.status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Rejected => "rejected",
        ApprovalStatus::Cancelled => "cancelled",
    };
    ServerMessage::ApprovalUpdate(Notification {
        topic: Topic::Approval,
        automation_id: Some(request.automation_id),
        status: status.to_string(),
        summary: format!("Approval request {status} by {actor}"),
        timestamp: now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use govhub_domain::id::AutomationId;

    #[test]
    fn should_parse_valid_subscription_pairs() {
        let (topic, scope) = parse_subscription("lifecycle", "all").unwrap();
        assert_eq!(topic, Topic::Lifecycle);
        assert_eq!(scope, Scope::All);

        let id = AutomationId::new();
        let (topic, scope) = parse_subscription("emergency", &id.to_string()).unwrap();
        assert_eq!(topic, Topic::Emergency);
        assert_eq!(scope, Scope::Automation(id));
    }

    #[test]
    fn should_answer_malformed_subscription_with_error_frame() {
        let frame = parse_subscription("nonsense", "all").unwrap_err();
        assert!(matches!(frame, ServerMessage::Error { code, .. } if code == "malformed"));

        let frame = parse_subscription("lifecycle", "not-an-id").unwrap_err();
        assert!(matches!(frame, ServerMessage::Error { code, .. } if code == "malformed"));
    }

    #[test]
    fn should_answer_malformed_request_id_with_error_frame() {
        let frame = parse_request_id("garbage").unwrap_err();
        assert!(matches!(frame, ServerMessage::Error { code, .. } if code == "malformed"));
    }
}
