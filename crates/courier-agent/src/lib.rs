//! Client for the OpenCode coding-agent server.
//!
//! The server owns the actual AI sessions; this crate only speaks its HTTP
//! API: creating remote sessions, listing providers, and forwarding prompts.
//! Nothing here knows about Telegram or about the local session registry.

pub mod client;
pub mod error;

pub use client::{
    OpenCodeClient, PromptPart, PromptReply, Provider, ProviderCatalog, RemoteSession,
};
pub use error::{AgentError, Result};
