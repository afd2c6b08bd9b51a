//! OpenCode server API client.
//!
//! Covers the three endpoints the bot needs:
//! - `POST /session` to create a remote session
//! - `GET /provider` for the provider/model catalog
//! - `POST /session/{id}/message` to run a prompt

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{AgentError, Result};

/// Environment variable for the OpenCode server base URL.
pub const OPENCODE_API_URL_ENV: &str = "OPENCODE_API_URL";

/// Base URL used when the environment does not override it.
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Prompt requests wait out a full agent turn; everything else uses the
/// client default.
const PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for the OpenCode server HTTP API.
#[derive(Clone)]
pub struct OpenCodeClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenCodeClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            AgentError::Configuration(format!("invalid agent server URL '{}': {}", base_url, e))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    /// Create a client from environment variables.
    ///
    /// Uses `OPENCODE_API_URL`, falling back to `http://localhost:8000`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(OPENCODE_API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(base_url)
    }

    /// The base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a session on the server.
    pub async fn create_session(&self, title: &str) -> Result<RemoteSession> {
        let url = format!("{}/session", self.base_url);
        debug!(url = %url, title = title, "Creating remote session");

        let response = self
            .client
            .post(&url)
            .json(&CreateSessionRequest { title })
            .send()
            .await
            .map_err(|e| AgentError::Http(format!("create session: {}", e)))?;
        let response = check_status(response).await?;

        let session: RemoteSession = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(format!("create session response: {}", e)))?;
        info!(remote = %session.id, "Created remote session");
        Ok(session)
    }

    /// Fetch the provider/model catalog.
    pub async fn providers(&self) -> Result<ProviderCatalog> {
        let url = format!("{}/provider", self.base_url);
        debug!(url = %url, "Fetching provider catalog");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Http(format!("list providers: {}", e)))?;
        let response = check_status(response).await?;

        let catalog: ProviderCatalog = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(format!("provider catalog: {}", e)))?;
        debug!(
            providers = catalog.all.len(),
            connected = catalog.connected.len(),
            "Fetched provider catalog"
        );
        Ok(catalog)
    }

    /// Run a prompt in a remote session and wait for the full reply.
    ///
    /// Agent turns routinely take minutes, so this call carries its own
    /// 300 second timeout.
    pub async fn send_prompt(
        &self,
        remote_session: &str,
        provider: &str,
        model: &str,
        text: &str,
    ) -> Result<PromptReply> {
        let url = format!("{}/session/{}/message", self.base_url, remote_session);
        let request = PromptRequest {
            provider_id: provider.to_string(),
            model_id: model.to_string(),
            parts: vec![PromptPart::text(text)],
        };
        info!(
            remote = remote_session,
            provider = provider,
            model = model,
            chars = text.len(),
            "Forwarding prompt to agent server"
        );

        let response = self
            .client
            .post(&url)
            .timeout(PROMPT_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Http(format!("send prompt: {}", e)))?;
        let response = check_status(response).await?;

        let reply: PromptReply = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(format!("prompt reply: {}", e)))?;
        debug!(
            remote = remote_session,
            parts = reply.parts.len(),
            "Received agent reply"
        );
        Ok(reply)
    }
}

/// Turn a non-success response into an `Api` error carrying the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(AgentError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Request body for `POST /session`.
#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    title: &'a str,
}

/// A session as the server knows it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSession {
    /// Server-assigned session id.
    pub id: String,

    /// Title the session was created with.
    #[serde(default)]
    pub title: Option<String>,
}

/// Response from `GET /provider`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCatalog {
    /// Every provider the server knows about.
    #[serde(default)]
    pub all: Vec<Provider>,

    /// Ids of providers with working credentials.
    #[serde(default)]
    pub connected: Vec<String>,
}

impl ProviderCatalog {
    /// Whether a provider has working credentials.
    pub fn is_connected(&self, provider: &str) -> bool {
        self.connected.iter().any(|id| id == provider)
    }

    /// Look up a provider by id.
    pub fn find(&self, provider: &str) -> Option<&Provider> {
        self.all.iter().find(|p| p.id == provider)
    }

    /// The first connected provider that has a model, with its first model.
    ///
    /// This is the fallback for users who never picked a model explicitly.
    pub fn default_selection(&self) -> Option<(String, String)> {
        self.connected
            .iter()
            .filter_map(|id| self.find(id))
            .find_map(|provider| {
                let model = provider.models.keys().next()?;
                Some((provider.id.clone(), model.clone()))
            })
    }
}

/// One provider in the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    /// Provider id, e.g. `anthropic`.
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,

    /// Model id to model metadata. Only the ids matter here; the metadata
    /// shape varies by provider.
    #[serde(default)]
    pub models: BTreeMap<String, serde_json::Value>,
}

impl Provider {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Model ids in stable order.
    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

/// Request body for `POST /session/{id}/message`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest {
    /// Provider to run the prompt with.
    #[serde(rename = "providerID")]
    pub provider_id: String,

    /// Model to run the prompt with.
    #[serde(rename = "modelID")]
    pub model_id: String,

    /// Message parts; the bot always sends a single text part.
    pub parts: Vec<PromptPart>,
}

/// One part of a prompt or reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPart {
    /// Part kind: `text`, `reasoning`, tool parts, etc.
    #[serde(rename = "type")]
    pub part_type: String,

    /// Text payload. Non-text parts may omit it.
    #[serde(default)]
    pub text: String,
}

impl PromptPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            part_type: "text".to_string(),
            text: text.into(),
        }
    }

    /// Whether this is a plain text part.
    pub fn is_text(&self) -> bool {
        self.part_type == "text"
    }

    /// Whether this is a reasoning block.
    pub fn is_reasoning(&self) -> bool {
        matches!(self.part_type.as_str(), "reasoning" | "thinking")
    }
}

/// Response body of a prompt run.
///
/// The server wraps the parts in message metadata; everything but `parts` is
/// ignored here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptReply {
    /// Reply parts in arrival order.
    #[serde(default)]
    pub parts: Vec<PromptPart>,
}

impl PromptReply {
    /// The reply's text parts joined with newlines.
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .parts
            .iter()
            .filter(|p| p.is_text())
            .map(|p| p.text.as_str())
            .collect();
        parts.join("\n")
    }

    /// Reasoning blocks in arrival order.
    pub fn reasoning(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| p.is_reasoning() && !p.text.is_empty())
            .map(|p| p.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            OpenCodeClient::new("not a url"),
            Err(AgentError::Configuration(_))
        ));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = OpenCodeClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_prompt_request_serialization() {
        let request = PromptRequest {
            provider_id: "anthropic".to_string(),
            model_id: "claude-sonnet-4".to_string(),
            parts: vec![PromptPart::text("write a parser")],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["providerID"], "anthropic");
        assert_eq!(json["modelID"], "claude-sonnet-4");
        assert_eq!(json["parts"][0]["type"], "text");
        assert_eq!(json["parts"][0]["text"], "write a parser");
    }

    #[test]
    fn test_remote_session_deserialization() {
        let json = r#"{"id": "ses_4f2a", "title": "Telegram session", "version": "0.3.1"}"#;
        let session: RemoteSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "ses_4f2a");
        assert_eq!(session.title.as_deref(), Some("Telegram session"));
    }

    #[test]
    fn test_provider_catalog_deserialization() {
        let json = r#"{
            "all": [
                {"id": "openai", "name": "OpenAI", "models": {"gpt-4o": {}}},
                {"id": "anthropic", "name": "Anthropic", "models": {"claude-sonnet-4": {"limit": 200000}}}
            ],
            "connected": ["anthropic"]
        }"#;

        let catalog: ProviderCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.all.len(), 2);
        assert!(catalog.is_connected("anthropic"));
        assert!(!catalog.is_connected("openai"));
        assert_eq!(
            catalog.default_selection(),
            Some(("anthropic".to_string(), "claude-sonnet-4".to_string()))
        );
    }

    #[test]
    fn test_default_selection_skips_modelless_providers() {
        let json = r#"{
            "all": [
                {"id": "stub", "models": {}},
                {"id": "openai", "name": "OpenAI", "models": {"gpt-4o": {}}}
            ],
            "connected": ["stub", "openai"]
        }"#;

        let catalog: ProviderCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(
            catalog.default_selection(),
            Some(("openai".to_string(), "gpt-4o".to_string()))
        );
    }

    #[test]
    fn test_default_selection_requires_connected_provider() {
        let json = r#"{"all": [{"id": "openai", "models": {"gpt-4o": {}}}], "connected": []}"#;
        let catalog: ProviderCatalog = serde_json::from_str(json).unwrap();
        assert!(catalog.default_selection().is_none());
    }

    #[test]
    fn test_reply_splits_text_and_reasoning() {
        let json = r#"{
            "info": {"id": "msg_1", "role": "assistant"},
            "parts": [
                {"type": "reasoning", "text": "The user wants a CLI."},
                {"type": "text", "text": "Here is main.rs:"},
                {"type": "tool", "tool": "write"},
                {"type": "text", "text": "Done."}
            ]
        }"#;

        let reply: PromptReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.text(), "Here is main.rs:\nDone.");
        assert_eq!(reply.reasoning(), vec!["The user wants a CLI."]);
    }

    #[test]
    fn test_empty_reply() {
        let reply: PromptReply = serde_json::from_str("{}").unwrap();
        assert!(reply.text().is_empty());
        assert!(reply.reasoning().is_empty());
    }
}
