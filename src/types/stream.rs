//! Streaming event types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single generated token, in generation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenEvent {
    /// Identifies the backend round that produced this token. Every backend
    /// call within a turn gets a fresh id.
    pub turn_stream_id: Uuid,
    pub text: String,
    pub token_id: u32,
}

/// Item yielded by [`TurnStream::events`](crate::agent::TurnStream::events).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEvent {
    pub token: TokenEvent,
    /// Best-effort structured value parsed from the visible text so far.
    /// `None` mid-tag, inside a function call, when nothing parses yet, or
    /// when partial values are disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<serde_json::Value>,
}

/// Options for [`AgentSession::stream_with`](crate::agent::AgentSession::stream_with).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    pub partial_values: bool,
}

impl StreamOptions {
    pub fn with_partial_values() -> Self {
        Self {
            partial_values: true,
        }
    }
}
