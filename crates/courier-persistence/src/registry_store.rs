//! File-backed store for per-user session state.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use courier_models::{UserId, UserState};
use tracing::warn;

use crate::atomic::{atomic_write_json, read_json};
use crate::error::{PersistenceError, Result};

/// Persists one JSON file of session state per user.
///
/// ```text
/// base_path/
/// └── users/
///     ├── 1234567.json
///     └── 7654321.json
/// ```
///
/// Writes are atomic, so the file for a user always holds a complete
/// serialized [`UserState`]. The store itself never expires entries; if
/// something outside deletes a file, the user simply loads as absent next
/// time, which the registry treats like a deletion of those sessions.
pub struct RegistryStore {
    base_path: PathBuf,
}

impl RegistryStore {
    /// Creates a store rooted at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory holding the per-user files.
    fn users_dir(&self) -> PathBuf {
        self.base_path.join("users")
    }

    /// Path of one user's state file.
    fn user_path(&self, user: UserId) -> PathBuf {
        self.users_dir().join(format!("{}.json", user))
    }

    /// Saves a user's state, creating the directory tree if needed.
    pub fn save_user(&self, state: &UserState) -> Result<()> {
        atomic_write_json(&self.user_path(state.user), state)
    }

    /// Loads one user's state.
    ///
    /// # Errors
    /// `NotFound` if no state has been saved for this user.
    pub fn load_user(&self, user: UserId) -> Result<UserState> {
        let path = self.user_path(user);
        if !path.exists() {
            return Err(PersistenceError::NotFound {
                kind: "user state".to_string(),
                id: user.to_string(),
            });
        }
        read_json(&path)
    }

    /// Loads every user's state.
    ///
    /// Non-JSON directory entries are ignored. A file that fails to parse is
    /// skipped with a warning rather than failing the whole load; it is
    /// indistinguishable from state the store evicted. An unreadable
    /// directory is an error.
    pub fn load_all(&self) -> Result<HashMap<UserId, UserState>> {
        let dir = self.users_dir();
        if !dir.exists() {
            return Ok(HashMap::new());
        }

        let entries = fs::read_dir(&dir).map_err(|source| PersistenceError::Read {
            path: dir.clone(),
            source,
        })?;

        let mut users = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::Read {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match read_json::<UserState>(&path) {
                Ok(state) => {
                    users.insert(state.user, state);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable user state file");
                }
            }
        }

        Ok(users)
    }

    /// Deletes a user's state file. Deleting an absent user is a no-op.
    pub fn delete_user(&self, user: UserId) -> Result<()> {
        let path = self.user_path(user);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| PersistenceError::Write { path, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_models::Session;
    use tempfile::tempdir;

    fn sample_state(id: i64, sessions: usize) -> UserState {
        let mut state = UserState::new(UserId::new(id));
        for _ in 0..sessions {
            state.push_session(Session::new(state.user));
        }
        state
    }

    #[test]
    fn save_then_load_user() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        let state = sample_state(11, 2);
        store.save_user(&state).unwrap();

        let loaded = store.load_user(state.user).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn load_missing_user_is_not_found() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        let result = store.load_user(UserId::new(99));
        assert!(matches!(result, Err(PersistenceError::NotFound { .. })));
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        let mut state = sample_state(11, 1);
        store.save_user(&state).unwrap();

        state.push_session(Session::new(state.user));
        store.save_user(&state).unwrap();

        let loaded = store.load_user(state.user).unwrap();
        assert_eq!(loaded.sessions.len(), 2);
    }

    #[test]
    fn load_all_collects_every_user() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        store.save_user(&sample_state(1, 1)).unwrap();
        store.save_user(&sample_state(2, 3)).unwrap();

        let users = store.load_all().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[&UserId::new(2)].sessions.len(), 3);
    }

    #[test]
    fn load_all_on_fresh_store_is_empty() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn load_all_skips_corrupt_files() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        store.save_user(&sample_state(1, 1)).unwrap();
        fs::write(store.users_dir().join("2.json"), "{broken").unwrap();
        fs::write(store.users_dir().join("notes.txt"), "ignore me").unwrap();

        let users = store.load_all().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users.contains_key(&UserId::new(1)));
    }

    #[test]
    fn delete_user_removes_file() {
        let dir = tempdir().unwrap();
        let store = RegistryStore::new(dir.path());

        let state = sample_state(5, 1);
        store.save_user(&state).unwrap();
        store.delete_user(state.user).unwrap();

        assert!(matches!(
            store.load_user(state.user),
            Err(PersistenceError::NotFound { .. })
        ));

        // Deleting again is fine.
        store.delete_user(state.user).unwrap();
    }
}
