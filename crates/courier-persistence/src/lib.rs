//! Persistence layer for opencode-courier.
//!
//! Session state is written with atomic file operations (write to a temp
//! file in the target directory, then rename), so a crash mid-write never
//! leaves a half-written state file behind.
//!
//! # Example
//!
//! ```no_run
//! use courier_models::{UserId, UserState};
//! use courier_persistence::RegistryStore;
//!
//! let store = RegistryStore::new("/home/user/.opencode-courier/state");
//!
//! let state = UserState::new(UserId::new(42));
//! store.save_user(&state).unwrap();
//!
//! let loaded = store.load_user(state.user).unwrap();
//! assert_eq!(loaded.user, state.user);
//! ```

pub mod atomic;
pub mod error;
pub mod registry_store;

pub use error::{PersistenceError, Result};
pub use registry_store::RegistryStore;
