use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The student.
    User,

    /// The tutor.
    Assistant,
}

impl MessageRole {
    /// The wire and storage spelling of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRoleParseError {
    invalid_value: String,
}

impl fmt::Display for MessageRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown message role: {}", self.invalid_value)
    }
}

impl std::error::Error for MessageRoleParseError {}

impl FromStr for MessageRole {
    type Err = MessageRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(MessageRoleParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// One entry of a conversation.
///
/// Messages are immutable once appended to a session; the store only ever
/// pushes new ones to the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The author of the message.
    pub role: MessageRole,

    /// The markdown text of the message.
    pub content: String,
}

impl Message {
    /// Create a new `Message`.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant `Message`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Returns true if the student wrote this message.
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    /// Returns true if the tutor wrote this message.
    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn message_serializes_lowercase_role() {
        let message = Message::user("hi");
        assert_eq!(
            to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": "hi"
            })
        );
    }

    #[test]
    fn message_rejects_unknown_role() {
        let parsed = serde_json::from_value::<Message>(json!({
            "role": "system",
            "content": "You are a tutor."
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn role_from_str() {
        assert_eq!("user".parse::<MessageRole>(), Ok(MessageRole::User));
        assert_eq!(
            "assistant".parse::<MessageRole>(),
            Ok(MessageRole::Assistant)
        );
        assert!("tutor".parse::<MessageRole>().is_err());
    }

    #[test]
    fn role_predicates() {
        assert!(Message::user("q").is_user());
        assert!(Message::assistant("a").is_assistant());
        assert!(!Message::assistant("a").is_user());
    }
}
