//! Error types for the agent client.

use thiserror::Error;

/// Errors that can occur talking to the OpenCode server.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Client misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request never produced a response (connect failure, timeout).
    #[error("request to agent server failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("agent server error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to parse agent response: {0}")]
    Parse(String),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
