//! Core data models for opencode-courier.
//!
//! Everything the registry and the surrounding service layers pass around
//! lives here: identifier newtypes, the [`Session`] record, the per-user
//! [`UserState`] that the registry owns and the store persists, and the
//! [`RoutedMessage`] pair handed to the forwarding layer.

pub mod ids;
pub mod prefs;
pub mod session;
pub mod user_state;

pub use ids::{SessionId, UserId};
pub use prefs::UserPreferences;
pub use session::{RoutedMessage, Session};
pub use user_state::UserState;
