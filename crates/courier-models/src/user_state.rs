//! Per-user session state.

use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, UserId};
use crate::prefs::UserPreferences;
use crate::session::Session;

/// Everything the registry tracks for one user.
///
/// This is also the unit of persistence: the store writes one of these per
/// user. The mutation helpers keep two invariants: a non-empty session list
/// always has exactly one active pointer referring to a present session, and
/// `sessions` stays in creation order (new sessions are appended, never
/// inserted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    /// The user this state belongs to.
    pub user: UserId,

    /// All sessions in creation order.
    #[serde(default)]
    pub sessions: Vec<Session>,

    /// Id of the currently active session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<SessionId>,

    /// Forwarding preferences.
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl UserState {
    /// Creates empty state for a user with no sessions yet.
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            sessions: Vec::new(),
            active: None,
            preferences: UserPreferences::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Looks up a session by id.
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    /// Resolves the active pointer to its session.
    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    /// The most recently created session.
    pub fn most_recent(&self) -> Option<&Session> {
        self.sessions.last()
    }

    /// Appends a session and makes it active.
    pub fn push_session(&mut self, session: Session) {
        self.active = Some(session.id.clone());
        self.sessions.push(session);
    }

    /// Points the active pointer at `id`. Returns false (and changes
    /// nothing) when the id is not present.
    pub fn activate(&mut self, id: &SessionId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    /// Removes a session, returning it, or None when absent.
    ///
    /// When the removed session was active, the most recently created
    /// remaining session becomes active; the pointer clears when the list
    /// empties. Removing an inactive session leaves the pointer alone.
    pub fn remove_session(&mut self, id: &SessionId) -> Option<Session> {
        let index = self.sessions.iter().position(|s| &s.id == id)?;
        let removed = self.sessions.remove(index);
        if self.active.as_ref() == Some(id) {
            self.active = self.most_recent().map(|s| s.id.clone());
        }
        Some(removed)
    }

    /// Sets or clears a session's label. Returns the updated session, or
    /// None when the id is not present.
    pub fn relabel(&mut self, id: &SessionId, label: Option<String>) -> Option<&Session> {
        let session = self.sessions.iter_mut().find(|s| &s.id == id)?;
        session.label = label;
        Some(session)
    }

    /// Repairs the active pointer after external edits to the stored state.
    ///
    /// A pointer naming a session that is not present (store-side expiry,
    /// hand-edited file) is moved to the most recent session, or cleared
    /// when there are none. Returns true when a repair was needed.
    pub fn normalize(&mut self) -> bool {
        let valid = match &self.active {
            Some(id) => self.contains(id),
            None => self.sessions.is_empty(),
        };
        if valid {
            return false;
        }
        self.active = self.most_recent().map(|s| s.id.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(n: usize) -> UserState {
        let mut state = UserState::new(UserId::new(100));
        for i in 0..n {
            state.push_session(Session::with_label(state.user, format!("s{}", i)));
        }
        state
    }

    #[test]
    fn new_state_is_empty() {
        let state = UserState::new(UserId::new(1));
        assert!(state.is_empty());
        assert!(state.active.is_none());
        assert!(state.active_session().is_none());
    }

    #[test]
    fn push_makes_session_active() {
        let mut state = UserState::new(UserId::new(1));
        let session = Session::new(state.user);
        let id = session.id.clone();
        state.push_session(session);

        assert_eq!(state.active, Some(id.clone()));
        assert_eq!(state.active_session().unwrap().id, id);
    }

    #[test]
    fn activate_unknown_id_changes_nothing() {
        let mut state = state_with(2);
        let before = state.active.clone();

        assert!(!state.activate(&SessionId::from_string("sess-missing")));
        assert_eq!(state.active, before);
    }

    #[test]
    fn activate_switches_pointer() {
        let mut state = state_with(3);
        let first = state.sessions[0].id.clone();

        assert!(state.activate(&first));
        assert_eq!(state.active_session().unwrap().id, first);
    }

    #[test]
    fn remove_inactive_keeps_pointer() {
        let mut state = state_with(3);
        let first = state.sessions[0].id.clone();
        let last = state.sessions[2].id.clone();

        state.remove_session(&first).unwrap();
        assert_eq!(state.active, Some(last));
        assert_eq!(state.sessions.len(), 2);
    }

    #[test]
    fn remove_active_picks_most_recent_remaining() {
        // [A, B(active)]: deleting B must leave A active.
        let mut state = state_with(2);
        let a = state.sessions[0].id.clone();
        let b = state.sessions[1].id.clone();
        assert_eq!(state.active, Some(b.clone()));

        state.remove_session(&b).unwrap();
        assert_eq!(state.active, Some(a));
    }

    #[test]
    fn remove_active_middle_prefers_newest() {
        // [A, B(active), C]: deleting B must leave C active, not A.
        let mut state = state_with(3);
        let b = state.sessions[1].id.clone();
        let c = state.sessions[2].id.clone();
        state.activate(&b);

        state.remove_session(&b).unwrap();
        assert_eq!(state.active, Some(c));
    }

    #[test]
    fn remove_last_session_clears_pointer() {
        let mut state = state_with(1);
        let only = state.sessions[0].id.clone();

        state.remove_session(&only).unwrap();
        assert!(state.is_empty());
        assert!(state.active.is_none());
    }

    #[test]
    fn remove_unknown_returns_none() {
        let mut state = state_with(2);
        let before = state.clone();

        assert!(state
            .remove_session(&SessionId::from_string("sess-missing"))
            .is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn relabel_updates_only_label() {
        let mut state = state_with(1);
        let id = state.sessions[0].id.clone();

        let updated = state.relabel(&id, Some("renamed".to_string())).unwrap();
        assert_eq!(updated.label.as_deref(), Some("renamed"));
        assert_eq!(updated.id, id);

        state.relabel(&id, None).unwrap();
        assert!(state.sessions[0].label.is_none());
    }

    #[test]
    fn normalize_repairs_dangling_pointer() {
        let mut state = state_with(2);
        let last = state.sessions[1].id.clone();
        state.active = Some(SessionId::from_string("sess-gone"));

        assert!(state.normalize());
        assert_eq!(state.active, Some(last));
        assert!(!state.normalize());
    }

    #[test]
    fn normalize_clears_pointer_without_sessions() {
        let mut state = UserState::new(UserId::new(5));
        state.active = Some(SessionId::from_string("sess-gone"));

        assert!(state.normalize());
        assert!(state.active.is_none());
    }

    #[test]
    fn state_json_roundtrip() {
        let state = state_with(2);
        let json = serde_json::to_string_pretty(&state).unwrap();
        let back: UserState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
