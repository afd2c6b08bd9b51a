//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix for generated session identifiers.
const SESSION_ID_PREFIX: &str = "sess";

/// Identifier of a session, unique within its owner's scope.
///
/// Generated ids are `sess-<uuid-v4>`, so an id is never reused even after
/// the session it named has been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(format!("{}-{}", SESSION_ID_PREFIX, Uuid::new_v4()))
    }

    /// Wraps an existing id string (deserialization, tests).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for display: the prefix plus the first hex group.
    ///
    /// `sess-1f9a2b3c-...` renders as `sess-1f9a2b3c`. Ids loaded from disk
    /// are not guaranteed ASCII, so the cut backs up to a char boundary.
    pub fn short(&self) -> &str {
        let mut end = SESSION_ID_PREFIX.len() + 9;
        if end >= self.0.len() {
            return &self.0;
        }
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        &self.0[..end]
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of a user as seen by the messaging platform.
///
/// The registry treats this as an opaque key; for Telegram it is the sender's
/// user id, falling back to the chat id for posts without a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw platform identifier.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_has_prefix() {
        let id = SessionId::new();
        assert!(id.as_str().starts_with("sess-"));
    }

    #[test]
    fn session_ids_are_distinct() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn session_id_short_form() {
        let id = SessionId::from_string("sess-1f9a2b3c-0000-0000-0000-000000000000");
        assert_eq!(id.short(), "sess-1f9a2b3c");

        let tiny = SessionId::from_string("sess-1");
        assert_eq!(tiny.short(), "sess-1");
    }

    #[test]
    fn session_id_short_never_splits_a_char() {
        // Byte 13 lands inside the third euro sign.
        let id = SessionId::from_string("sess-€€€€-extra");
        assert_eq!(id.short(), "sess-€€");
        assert!(id.as_str().starts_with(id.short()));
    }

    #[test]
    fn session_id_serializes_transparently() {
        let id = SessionId::from_string("sess-fixed");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sess-fixed\"");

        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn user_id_roundtrip() {
        let user = UserId::new(42);
        assert_eq!(user.as_i64(), 42);
        assert_eq!(format!("{}", user), "42");

        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, "42");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }
}
