//! Core types for assistchat
//!
//! This crate provides the wire format and domain types shared by the
//! session client and the terminal front-end.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Delay before a dropped channel connection is reopened
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Interval of the liveness check that re-triggers a stalled reconnect
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(5);

/// Earliest moment the hint prompt may fire after startup
pub const HINT_MIN_DELAY: Duration = Duration::from_secs(30);

/// Latest moment the hint prompt may fire after startup
pub const HINT_MAX_DELAY: Duration = Duration::from_secs(60);

/// How long an unacknowledged hint stays visible
pub const HINT_DISMISS_AFTER: Duration = Duration::from_secs(5);

/// Fixed user-facing apology appended when a send fails
pub const APOLOGY_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// Greeting shown when a freshly created conversation has no history yet
pub const WELCOME_TEXT: &str = "Welcome! Ask me anything about the shop.";

// ============================================================================
// Messages
// ============================================================================

/// Who authored a message.
///
/// The server's channel frames tag assistant pushes as `"ai"`, which is
/// accepted as an alias. `system` carries connection notices and
/// server-side error apologies; it never appears in stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "ai")]
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single chat entry. Immutable after creation, ordered by arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

// ============================================================================
// Session state
// ============================================================================

/// Lifecycle of the chat panel.
///
/// `Connected` and `Disconnected` are reached only when the persistent
/// channel transport is in use; the request transport stays in
/// `HistoryLoaded` while the panel is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    AwaitingIdentifier,
    HistoryLoaded,
    Connected,
    Disconnected,
}

impl SessionState {
    /// Whether the panel is currently shown.
    pub fn panel_visible(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }

    /// Whether the send control accepts input. Sends additionally require
    /// a conversation identifier; the session enforces that part.
    pub fn allows_send(&self) -> bool {
        matches!(self, SessionState::HistoryLoaded | SessionState::Connected)
    }
}

// ============================================================================
// HTTP wire format
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CreateConversationResponse {
    Success { conversation_id: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HistoryResponse {
    Success { messages: Vec<Message> },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SendMessageResponse {
    Success { response: String },
    Error { message: String },
}

// ============================================================================
// Channel wire format
// ============================================================================

/// Outbound frame pushed onto the persistent channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub message: String,
}

/// Inbound frame pushed by the server. Extra bookkeeping fields are
/// tolerated and ignored by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerFrame {
    pub role: Role,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ServerFrame {
    pub fn into_message(self) -> Message {
        Message {
            role: self.role,
            content: self.message,
        }
    }
}
