//! Error types for the Telegram bot.

use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    BotStartFailed(String),

    /// The agent server has no connected provider to run prompts with.
    #[error("No connected providers on the agent server. Connect one in OpenCode and retry.")]
    NoProviders,

    /// Session registry error.
    #[error("Session error: {0}")]
    Registry(#[from] courier_registry::RegistryError),

    /// Agent server error.
    #[error("Agent error: {0}")]
    Agent(#[from] courier_agent::AgentError),
}

/// Result type for Telegram bot operations.
pub type Result<T> = std::result::Result<T, TelegramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelegramError::NoToken;
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));

        let err = TelegramError::BotStartFailed("network unreachable".to_string());
        assert!(err.to_string().contains("network unreachable"));
    }

    #[test]
    fn test_registry_error_wraps() {
        let inner =
            courier_registry::RegistryError::SessionNotFound(courier_models::SessionId::from_string(
                "sess-missing",
            ));
        let err = TelegramError::from(inner);
        assert!(err.to_string().contains("sess-missing"));
    }
}
