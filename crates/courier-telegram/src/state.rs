//! Shared state for the Telegram bot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use courier_agent::{OpenCodeClient, PromptReply};
use courier_models::{Session, SessionId, UserId};
use courier_persistence::RegistryStore;
use courier_registry::SessionRegistry;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, TelegramError};

/// Everything the handlers need, shared behind an `Arc`.
pub struct BotState {
    /// Local session registry.
    registry: SessionRegistry,
    /// Client for the OpenCode server.
    agent: OpenCodeClient,
    /// Local session id to remote session id. Remote sessions are created
    /// lazily on first forward and live only for this process.
    remote: RwLock<HashMap<SessionId, String>>,
}

/// The outcome of forwarding one message to the agent.
pub struct ForwardReply {
    /// Session the message was routed to.
    pub session: Session,
    /// Provider the prompt ran with.
    pub provider: String,
    /// Model the prompt ran with.
    pub model: String,
    /// The agent's reply.
    pub reply: PromptReply,
    /// Whether reasoning blocks should be shown to the user.
    pub show_thinking: bool,
}

impl BotState {
    pub fn new(registry: SessionRegistry, agent: OpenCodeClient) -> Self {
        Self {
            registry,
            agent,
            remote: RwLock::new(HashMap::new()),
        }
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The agent client.
    pub fn agent(&self) -> &OpenCodeClient {
        &self.agent
    }

    /// The remote session bound to a local one, creating it on first use.
    pub async fn remote_session_for(&self, session: &Session) -> Result<String> {
        if let Some(remote) = self.remote.read().await.get(&session.id).cloned() {
            return Ok(remote);
        }

        let created = self
            .agent
            .create_session(&format!("Telegram: {}", session.title()))
            .await?;
        debug!(session = %session.id, remote = %created.id, "Bound remote session");

        let mut remote = self.remote.write().await;
        Ok(remote.entry(session.id.clone()).or_insert(created.id).clone())
    }

    /// Drop the remote binding for a deleted session.
    pub async fn forget_remote(&self, id: &SessionId) {
        self.remote.write().await.remove(id);
    }

    /// The provider/model to run prompts with: the user's stored choice,
    /// or the server's first connected provider and its first model.
    pub async fn resolve_selection(&self, user: UserId) -> Result<(String, String)> {
        let prefs = self.registry.preferences(user).await;
        if let Some((provider, model)) = prefs.selection() {
            return Ok((provider.to_string(), model.to_string()));
        }

        let catalog = self.agent.providers().await?;
        catalog.default_selection().ok_or(TelegramError::NoProviders)
    }

    /// Route a message through the registry and run it on the agent server.
    ///
    /// The registry side never fails for valid input; errors come from the
    /// store or from the agent server and are surfaced to the caller.
    pub async fn forward(&self, user: UserId, text: &str) -> Result<ForwardReply> {
        let routed = self.registry.route_message(user, text).await?;
        let (provider, model) = self.resolve_selection(user).await?;
        let remote = self.remote_session_for(&routed.session).await?;

        let reply = self
            .agent
            .send_prompt(&remote, &provider, &model, &routed.text)
            .await?;

        let show_thinking = self.registry.preferences(user).await.show_thinking;
        info!(
            user = %user,
            session = %routed.session.id,
            provider = %provider,
            model = %model,
            "Forwarded message and received reply"
        );
        Ok(ForwardReply {
            session: routed.session,
            provider,
            model,
            reply,
            show_thinking,
        })
    }
}

/// Build the shared state: a store-backed registry plus the agent client.
///
/// The registry store lives under `state_dir`; the agent URL comes from the
/// environment.
pub fn create_shared_state(state_dir: &Path) -> Result<Arc<BotState>> {
    let registry = SessionRegistry::with_store(RegistryStore::new(state_dir))?;
    let agent = OpenCodeClient::from_env()?;
    Ok(Arc::new(BotState::new(registry, agent)))
}
