use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Message;

/// The `reply` field of a completion response.
///
/// The endpoint normally answers with a string, but nothing stops it from
/// returning another JSON shape. Both are captured here and collapsed into
/// plain text by [`Reply::into_content`] before anything leaves the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// A plain text reply.
    Text(String),

    /// Any other JSON value.
    Structured(Value),
}

impl Reply {
    /// Collapse the reply into message text.
    ///
    /// Structured replies become their compact JSON encoding.
    pub fn into_content(self) -> String {
        match self {
            Reply::Text(text) => text,
            Reply::Structured(value) => value.to_string(),
        }
    }

    /// Collapse the reply into an assistant message.
    pub fn into_message(self) -> Message {
        Message::assistant(self.into_content())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Reply::Text(text),
            other => Reply::Structured(other),
        }
    }
}
