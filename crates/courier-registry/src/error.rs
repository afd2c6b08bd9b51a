//! Error types for registry operations.

use courier_models::SessionId;
use courier_persistence::PersistenceError;
use thiserror::Error;

/// Errors that can occur in the session registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An operation referenced a session id absent from the user's set.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The backing store failed. Never downgraded to an in-memory fallback;
    /// callers decide what to tell the user.
    #[error("session storage unavailable: {0}")]
    StorageUnavailable(#[from] PersistenceError),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
