//! Real-time WebSocket transport.

pub mod handler;
pub mod messages;
