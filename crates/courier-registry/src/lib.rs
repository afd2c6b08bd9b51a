//! Session registry for opencode-courier.
//!
//! The [`SessionRegistry`] owns every user's session set and active-session
//! pointer. It is the single source of truth for which coding context an
//! incoming message belongs to: handlers ask it to create, list, switch,
//! rename, and delete sessions, and to resolve a message to the session it
//! should be forwarded under.
//!
//! Operations on the same user are serialized through a per-user lock;
//! different users never contend. The registry performs no network I/O;
//! talking to the coding agent happens after [`SessionRegistry::route_message`]
//! returns, in the forwarding layer.

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::SessionRegistry;
