use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stable identifier of a chat session.
///
/// Ids are the decimal creation time in milliseconds, which makes them
/// creation-ordered when compared numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate an id that sorts after every id in `existing`.
    ///
    /// The clock reading wins unless it would collide with or precede the
    /// largest numeric id already issued, in which case that id plus one is
    /// used.
    pub fn generate<'a>(existing: impl IntoIterator<Item = &'a SessionId>) -> Self {
        Self::generate_at(OffsetDateTime::now_utc(), existing)
    }

    pub(crate) fn generate_at<'a>(
        now: OffsetDateTime,
        existing: impl IntoIterator<Item = &'a SessionId>,
    ) -> Self {
        let millis = (now.unix_timestamp_nanos() / 1_000_000).max(0) as u128;
        let floor = existing.into_iter().filter_map(SessionId::as_millis).max();
        let value = match floor {
            Some(max) if millis <= max => max + 1,
            _ => millis,
        };
        Self(value.to_string())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric value of the id, if it is a millisecond timestamp.
    pub fn as_millis(&self) -> Option<u128> {
        self.0.parse().ok()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
