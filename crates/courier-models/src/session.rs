//! Session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, UserId};

/// One isolated coding context belonging to a single user.
///
/// Whether a session is active is not stored here; it is derived from the
/// owning registry's per-user active pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, assigned at creation, immutable.
    pub id: SessionId,

    /// The user this session belongs to.
    pub owner: UserId,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// Optional human-readable name. The only mutable field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Session {
    /// Creates a new unlabeled session for the given owner.
    pub fn new(owner: UserId) -> Self {
        Self {
            id: SessionId::new(),
            owner,
            created_at: Utc::now(),
            label: None,
        }
    }

    /// Creates a new session with a label.
    pub fn with_label(owner: UserId, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(owner)
        }
    }

    /// Display name: the label if set, otherwise the short id.
    pub fn title(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.id.short().to_string(),
        }
    }
}

/// A message paired with the session it was resolved to.
///
/// This is the outbound unit handed to the forwarding layer; the text is
/// carried unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedMessage {
    /// The session the message belongs to.
    pub session: Session,

    /// The user's message text, untouched.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_unlabeled() {
        let session = Session::new(UserId::new(7));
        assert_eq!(session.owner, UserId::new(7));
        assert!(session.label.is_none());
        assert!(session.id.as_str().starts_with("sess-"));
    }

    #[test]
    fn title_prefers_label() {
        let owner = UserId::new(1);
        let labeled = Session::with_label(owner, "api refactor");
        assert_eq!(labeled.title(), "api refactor");

        let bare = Session::new(owner);
        assert_eq!(bare.title(), bare.id.short());
    }

    #[test]
    fn session_json_omits_missing_label() {
        let session = Session::new(UserId::new(3));
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("label"));

        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
