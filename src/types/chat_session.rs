use serde::{Deserialize, Serialize};

use crate::types::{Message, SessionId};

/// A single conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique, creation-ordered id.
    pub id: SessionId,

    /// User-editable title.
    pub title: String,

    /// Messages in arrival order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ChatSession {
    /// Create an empty session.
    pub fn new(id: SessionId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
        }
    }

    /// The default title for the `ordinal`-th session (1-based).
    pub fn default_title(ordinal: usize) -> String {
        format!("New chat {ordinal}")
    }

    /// Number of messages in the session.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the session has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
