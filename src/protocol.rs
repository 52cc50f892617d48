//! Wire shapes of the `POST /api/chat` endpoint.
//!
//! These are shared by the completion client and the completion server.
//! Only the client-side [`crate::types::Message`] is ever stored; the wire
//! layer additionally knows about the system role used for the tutor
//! instruction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Message, MessageRole};

/// Path of the completion endpoint.
pub const CHAT_PATH: &str = "/api/chat";

/// The instruction prepended to every conversation sent upstream.
///
/// English rendering of the Korean-language tutor instruction.
pub const TUTOR_SYSTEM_PROMPT: &str = "You are a friendly AI tutor helping a 6th-grade student.";

/// Role of a message on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    /// Instruction for the model; never stored in a session.
    System,

    /// The student.
    User,

    /// The tutor.
    Assistant,
}

impl From<MessageRole> for WireRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => WireRole::User,
            MessageRole::Assistant => WireRole::Assistant,
        }
    }
}

/// A message as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Author of the message.
    pub role: WireRole,

    /// Message text.
    pub content: String,
}

impl WireMessage {
    /// The tutor instruction as a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::System,
            content: content.into(),
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.into(),
            content: message.content.clone(),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation, oldest first.
    pub messages: Vec<WireMessage>,
}

impl ChatRequest {
    /// Build a request from a session history, prefixed by `system`.
    pub fn with_system(system: &str, history: &[Message]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(WireMessage::system(system));
        messages.extend(history.iter().map(WireMessage::from));
        Self { messages }
    }

    /// Returns true if the conversation already opens with a system message.
    pub fn has_system_prefix(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == WireRole::System)
    }
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The assistant reply; usually a string.
    pub reply: Value,
}

/// Failure response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatError {
    /// Human-readable description of the failure.
    pub error: String,
}
