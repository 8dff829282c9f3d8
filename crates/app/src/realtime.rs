//! Real-time delivery layer — in-process infrastructure for pushing
//! governance notifications to connected clients.
//!
//! The transport adapter owns the sockets; everything here is
//! transport-agnostic: sessions are an id plus an outbound channel, the
//! broker fans notifications out by `(topic, scope)`, and the dispatcher is
//! the single translator from bus events to client-facing messages.

pub mod broker;
pub mod dispatcher;
pub mod notification;
pub mod rate_limit;
pub mod session;

pub use broker::{Scope, SubscriptionBroker, Topic};
pub use dispatcher::NotificationDispatcher;
pub use notification::Notification;
pub use rate_limit::{FixedWindowRateLimiter, RateLimitConfig};
pub use session::SessionRegistry;
