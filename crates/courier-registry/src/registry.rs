//! The session registry.

use std::collections::HashMap;
use std::sync::Arc;

use courier_models::{RoutedMessage, Session, SessionId, UserId, UserPreferences, UserState};
use courier_persistence::RegistryStore;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};

/// Owns all per-user session state.
///
/// Internally a sharded lock table: the outer map is only locked long enough
/// to find (or insert) a user's entry, and each entry carries its own mutex
/// that serializes every operation for that user. Work for unrelated users
/// proceeds in parallel.
///
/// With a backing store, every mutation is persisted before it is committed
/// to memory, so a failed write leaves the registry exactly as it was.
pub struct SessionRegistry {
    users: RwLock<HashMap<UserId, Arc<Mutex<UserState>>>>,
    store: Option<RegistryStore>,
}

impl SessionRegistry {
    /// Creates an in-memory registry. State is lost on restart.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Creates a registry backed by a store, loading all persisted state.
    ///
    /// Stored active pointers that no longer refer to a present session are
    /// repaired on the way in (store-side eviction behaves like deletion).
    ///
    /// # Errors
    /// `StorageUnavailable` if the store cannot be read.
    pub fn with_store(store: RegistryStore) -> Result<Self> {
        let loaded = store.load_all()?;
        let mut users = HashMap::new();
        for (user, mut state) in loaded {
            if state.normalize() {
                warn!(user = %user, "Repaired stale active pointer in stored session state");
            }
            users.insert(user, Arc::new(Mutex::new(state)));
        }
        info!(users = users.len(), "Loaded session registry from store");

        Ok(Self {
            users: RwLock::new(users),
            store: Some(store),
        })
    }

    /// Finds a user's entry without creating one.
    async fn lookup(&self, user: UserId) -> Option<Arc<Mutex<UserState>>> {
        self.users.read().await.get(&user).cloned()
    }

    /// Finds or atomically inserts a user's entry.
    async fn entry(&self, user: UserId) -> Arc<Mutex<UserState>> {
        if let Some(entry) = self.lookup(user).await {
            return entry;
        }
        let mut users = self.users.write().await;
        users
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(UserState::new(user))))
            .clone()
    }

    /// Writes a user's state to the store, if one is attached.
    fn persist(&self, state: &UserState) -> Result<()> {
        if let Some(store) = &self.store {
            store.save_user(state)?;
        }
        Ok(())
    }

    /// Creates a new session for the user and makes it active.
    ///
    /// The identifier is freshly generated and is never one that has existed
    /// for this user before. In memory mode this cannot fail.
    pub async fn create_session(&self, user: UserId, label: Option<String>) -> Result<Session> {
        let entry = self.entry(user).await;
        let mut state = entry.lock().await;

        let session = match label {
            Some(label) => Session::with_label(user, label),
            None => Session::new(user),
        };

        let mut next = state.clone();
        next.push_session(session.clone());
        self.persist(&next)?;
        *state = next;

        info!(user = %user, session = %session.id, "Created session");
        Ok(session)
    }

    /// All of the user's sessions in creation order. Side-effect free.
    pub async fn list_sessions(&self, user: UserId) -> Vec<Session> {
        match self.lookup(user).await {
            Some(entry) => entry.lock().await.sessions.clone(),
            None => Vec::new(),
        }
    }

    /// The active session id, or None when the user has none.
    ///
    /// Unlike [`get_active_session`](Self::get_active_session) this never
    /// creates anything, so display code can call it freely.
    pub async fn active_session_id(&self, user: UserId) -> Option<SessionId> {
        let entry = self.lookup(user).await?;
        let state = entry.lock().await;
        state.active.clone()
    }

    /// Points the user's active pointer at the given session.
    ///
    /// # Errors
    /// `SessionNotFound` if the id is not in the user's set; the pointer is
    /// left untouched in that case.
    pub async fn switch_session(&self, user: UserId, id: &SessionId) -> Result<Session> {
        let entry = self.entry(user).await;
        let mut state = entry.lock().await;

        let Some(session) = state.get(id).cloned() else {
            return Err(RegistryError::SessionNotFound(id.clone()));
        };

        if state.active.as_ref() != Some(id) {
            let mut next = state.clone();
            next.activate(id);
            self.persist(&next)?;
            *state = next;
        }

        info!(user = %user, session = %session.id, "Switched active session");
        Ok(session)
    }

    /// Returns the active session, creating a default one first if the user
    /// has none. Check-and-create runs under the user's lock, so two
    /// concurrent first calls still produce exactly one session.
    pub async fn get_active_session(&self, user: UserId) -> Result<Session> {
        let entry = self.entry(user).await;
        let mut state = entry.lock().await;

        if let Some(session) = state.active_session() {
            return Ok(session.clone());
        }

        let session = Session::new(user);
        let mut next = state.clone();
        next.push_session(session.clone());
        self.persist(&next)?;
        *state = next;

        info!(user = %user, session = %session.id, "Created default session on first use");
        Ok(session)
    }

    /// Resolves the user's active session and pairs it with the text,
    /// unmodified, for the forwarding layer. Forwarding failures are the
    /// caller's concern.
    pub async fn route_message(&self, user: UserId, text: &str) -> Result<RoutedMessage> {
        let session = self.get_active_session(user).await?;
        debug!(user = %user, session = %session.id, "Routed message to active session");
        Ok(RoutedMessage {
            session,
            text: text.to_string(),
        })
    }

    /// Deletes a session. If it was active, the most recently created
    /// remaining session becomes active (or none remain and the next access
    /// lazily creates one).
    ///
    /// # Errors
    /// `SessionNotFound` if the id is not in the user's set; nothing is
    /// mutated in that case.
    pub async fn delete_session(&self, user: UserId, id: &SessionId) -> Result<()> {
        let entry = self.entry(user).await;
        let mut state = entry.lock().await;

        if !state.contains(id) {
            return Err(RegistryError::SessionNotFound(id.clone()));
        }

        let mut next = state.clone();
        next.remove_session(id);
        self.persist(&next)?;
        *state = next;

        info!(user = %user, session = %id, remaining = state.sessions.len(), "Deleted session");
        Ok(())
    }

    /// Sets or clears a session's label.
    ///
    /// # Errors
    /// `SessionNotFound` if the id is not in the user's set.
    pub async fn rename_session(
        &self,
        user: UserId,
        id: &SessionId,
        label: Option<String>,
    ) -> Result<Session> {
        let entry = self.entry(user).await;
        let mut state = entry.lock().await;

        let mut next = state.clone();
        let session = next
            .relabel(id, label)
            .cloned()
            .ok_or_else(|| RegistryError::SessionNotFound(id.clone()))?;
        self.persist(&next)?;
        *state = next;

        info!(user = %user, session = %session.id, "Relabeled session");
        Ok(session)
    }

    /// The user's forwarding preferences (defaults when none stored).
    pub async fn preferences(&self, user: UserId) -> UserPreferences {
        match self.lookup(user).await {
            Some(entry) => entry.lock().await.preferences.clone(),
            None => UserPreferences::default(),
        }
    }

    /// Sets the user's provider/model selection.
    pub async fn set_model(
        &self,
        user: UserId,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<()> {
        let entry = self.entry(user).await;
        let mut state = entry.lock().await;
        let provider = provider.into();
        let model = model.into();

        let mut next = state.clone();
        next.preferences.provider = Some(provider.clone());
        next.preferences.model = Some(model.clone());
        self.persist(&next)?;
        *state = next;

        info!(user = %user, provider = %provider, model = %model, "Updated model selection");
        Ok(())
    }

    /// Flips whether reasoning blocks are shown. Returns the new value.
    pub async fn toggle_thinking(&self, user: UserId) -> Result<bool> {
        let entry = self.entry(user).await;
        let mut state = entry.lock().await;

        let mut next = state.clone();
        next.preferences.show_thinking = !next.preferences.show_thinking;
        self.persist(&next)?;
        let enabled = next.preferences.show_thinking;
        *state = next;

        info!(user = %user, enabled = enabled, "Toggled thinking display");
        Ok(enabled)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn user(n: i64) -> UserId {
        UserId::new(n)
    }

    #[tokio::test]
    async fn created_session_becomes_active() {
        let registry = SessionRegistry::new();
        let created = registry.create_session(user(1), None).await.unwrap();

        let active = registry.get_active_session(user(1)).await.unwrap();
        assert_eq!(active.id, created.id);
    }

    #[tokio::test]
    async fn get_active_lazily_creates_exactly_once() {
        let registry = SessionRegistry::new();

        let first = registry.get_active_session(user(2)).await.unwrap();
        let second = registry.get_active_session(user(2)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(registry.list_sessions(user(2)).await.len(), 1);
    }

    #[tokio::test]
    async fn switch_changes_active_session() {
        let registry = SessionRegistry::new();
        let a = registry.create_session(user(3), None).await.unwrap();
        let _b = registry.create_session(user(3), None).await.unwrap();

        let switched = registry.switch_session(user(3), &a.id).await.unwrap();
        assert_eq!(switched.id, a.id);

        let active = registry.get_active_session(user(3)).await.unwrap();
        assert_eq!(active.id, a.id);
    }

    #[tokio::test]
    async fn switch_to_unknown_session_has_no_side_effect() {
        let registry = SessionRegistry::new();
        let a = registry.create_session(user(4), None).await.unwrap();

        let missing = SessionId::from_string("sess-missing");
        let result = registry.switch_session(user(4), &missing).await;
        assert!(matches!(result, Err(RegistryError::SessionNotFound(_))));

        assert_eq!(registry.active_session_id(user(4)).await, Some(a.id));
    }

    #[tokio::test]
    async fn deleting_active_falls_back_to_previous() {
        // Sessions [A, B] with B active: deleting B must activate A.
        let registry = SessionRegistry::new();
        let a = registry.create_session(user(5), None).await.unwrap();
        let b = registry.create_session(user(5), None).await.unwrap();

        registry.delete_session(user(5), &b.id).await.unwrap();

        let active = registry.get_active_session(user(5)).await.unwrap();
        assert_eq!(active.id, a.id);
    }

    #[tokio::test]
    async fn deleting_inactive_session_keeps_pointer() {
        let registry = SessionRegistry::new();
        let a = registry.create_session(user(6), None).await.unwrap();
        let b = registry.create_session(user(6), None).await.unwrap();

        registry.delete_session(user(6), &a.id).await.unwrap();

        assert_eq!(registry.active_session_id(user(6)).await, Some(b.id));
    }

    #[tokio::test]
    async fn deleting_last_session_clears_then_recreates_lazily() {
        let registry = SessionRegistry::new();
        let only = registry.create_session(user(7), None).await.unwrap();

        registry.delete_session(user(7), &only.id).await.unwrap();
        assert!(registry.list_sessions(user(7)).await.is_empty());
        assert!(registry.active_session_id(user(7)).await.is_none());

        let fresh = registry.get_active_session(user(7)).await.unwrap();
        assert_ne!(fresh.id, only.id);
    }

    #[tokio::test]
    async fn deleting_unknown_session_fails_cleanly() {
        let registry = SessionRegistry::new();
        registry.create_session(user(8), None).await.unwrap();

        let missing = SessionId::from_string("sess-missing");
        let result = registry.delete_session(user(8), &missing).await;
        assert!(matches!(result, Err(RegistryError::SessionNotFound(_))));

        assert_eq!(registry.list_sessions(user(8)).await.len(), 1);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_deletion() {
        let registry = SessionRegistry::new();
        let a = registry.create_session(user(9), None).await.unwrap();

        registry.delete_session(user(9), &a.id).await.unwrap();
        let c = registry.create_session(user(9), None).await.unwrap();

        assert_ne!(c.id, a.id);
    }

    #[tokio::test]
    async fn concurrent_creates_leave_consistent_state() {
        let registry = Arc::new(SessionRegistry::new());
        let target = user(10);

        let first = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.create_session(target, None).await.unwrap() })
        };
        let second = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.create_session(target, None).await.unwrap() })
        };
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        let sessions = registry.list_sessions(target).await;
        assert_eq!(sessions.len(), 2);

        let active = registry.active_session_id(target).await.unwrap();
        assert!(active == first.id || active == second.id);
    }

    #[tokio::test]
    async fn list_preserves_creation_order() {
        let registry = SessionRegistry::new();
        for label in ["one", "two", "three"] {
            registry
                .create_session(user(11), Some(label.to_string()))
                .await
                .unwrap();
        }

        let labels = |sessions: Vec<Session>| -> Vec<String> {
            sessions.into_iter().filter_map(|s| s.label).collect()
        };

        let once = labels(registry.list_sessions(user(11)).await);
        assert_eq!(once, ["one", "two", "three"]);

        let again = labels(registry.list_sessions(user(11)).await);
        assert_eq!(once, again);
    }

    #[tokio::test]
    async fn list_for_unknown_user_is_empty_and_creates_nothing() {
        let registry = SessionRegistry::new();

        assert!(registry.list_sessions(user(12)).await.is_empty());
        assert!(registry.active_session_id(user(12)).await.is_none());
        assert!(registry.list_sessions(user(12)).await.is_empty());
    }

    #[tokio::test]
    async fn route_message_pairs_active_session_with_text() {
        let registry = SessionRegistry::new();
        let session = registry.create_session(user(13), None).await.unwrap();

        let routed = registry.route_message(user(13), "fix the tests").await.unwrap();
        assert_eq!(routed.session.id, session.id);
        assert_eq!(routed.text, "fix the tests");
    }

    #[tokio::test]
    async fn rename_updates_label_only() {
        let registry = SessionRegistry::new();
        let session = registry.create_session(user(14), None).await.unwrap();

        let renamed = registry
            .rename_session(user(14), &session.id, Some("bugfix".to_string()))
            .await
            .unwrap();
        assert_eq!(renamed.id, session.id);
        assert_eq!(renamed.label.as_deref(), Some("bugfix"));

        let missing = SessionId::from_string("sess-missing");
        let result = registry.rename_session(user(14), &missing, None).await;
        assert!(matches!(result, Err(RegistryError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn preferences_default_and_update() {
        let registry = SessionRegistry::new();

        let prefs = registry.preferences(user(15)).await;
        assert!(prefs.show_thinking);
        assert!(prefs.selection().is_none());

        registry
            .set_model(user(15), "anthropic", "claude-sonnet-4")
            .await
            .unwrap();
        let prefs = registry.preferences(user(15)).await;
        assert_eq!(prefs.selection(), Some(("anthropic", "claude-sonnet-4")));

        assert!(!registry.toggle_thinking(user(15)).await.unwrap());
        assert!(registry.toggle_thinking(user(15)).await.unwrap());
    }

    #[tokio::test]
    async fn preferences_survive_deleting_every_session() {
        let registry = SessionRegistry::new();
        registry
            .set_model(user(16), "openai", "gpt-4o")
            .await
            .unwrap();
        let session = registry.create_session(user(16), None).await.unwrap();

        registry.delete_session(user(16), &session.id).await.unwrap();

        let prefs = registry.preferences(user(16)).await;
        assert_eq!(prefs.selection(), Some(("openai", "gpt-4o")));
    }

    #[tokio::test]
    async fn state_round_trips_through_store() {
        let dir = tempdir().unwrap();

        let first = registry_with_store(dir.path());
        let a = first.create_session(user(17), Some("alpha".to_string())).await.unwrap();
        let _b = first.create_session(user(17), None).await.unwrap();
        first.switch_session(user(17), &a.id).await.unwrap();
        first.set_model(user(17), "anthropic", "claude-sonnet-4").await.unwrap();
        drop(first);

        let second = registry_with_store(dir.path());
        let sessions = second.list_sessions(user(17)).await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].label.as_deref(), Some("alpha"));
        assert_eq!(second.active_session_id(user(17)).await, Some(a.id));
        assert_eq!(
            second.preferences(user(17)).await.selection(),
            Some(("anthropic", "claude-sonnet-4"))
        );
    }

    #[tokio::test]
    async fn failed_store_write_leaves_memory_untouched() {
        // A plain file as the store base makes every save fail.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, "not a directory").unwrap();

        let registry = registry_with_store(&blocker);
        let result = registry.create_session(user(18), None).await;
        assert!(matches!(result, Err(RegistryError::StorageUnavailable(_))));

        assert!(registry.list_sessions(user(18)).await.is_empty());
        assert!(registry.active_session_id(user(18)).await.is_none());
    }

    fn registry_with_store(path: &std::path::Path) -> SessionRegistry {
        SessionRegistry::with_store(RegistryStore::new(path)).unwrap()
    }
}
