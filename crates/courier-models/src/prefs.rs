//! Per-user forwarding preferences.

use serde::{Deserialize, Serialize};

/// How a user's messages are sent to the coding agent.
///
/// Provider and model stay unset until the user picks one; the forwarding
/// layer then falls back to the agent server's default selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Provider id on the agent server (e.g. `anthropic`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model id within the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Whether reasoning blocks from the agent are shown to the user.
    #[serde(default = "default_show_thinking")]
    pub show_thinking: bool,
}

fn default_show_thinking() -> bool {
    true
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            show_thinking: true,
        }
    }
}

impl UserPreferences {
    /// The explicit provider/model pair, if the user picked one.
    pub fn selection(&self) -> Option<(&str, &str)> {
        match (&self.provider, &self.model) {
            (Some(provider), Some(model)) => Some((provider.as_str(), model.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinking_defaults_on() {
        let prefs = UserPreferences::default();
        assert!(prefs.show_thinking);
        assert!(prefs.selection().is_none());
    }

    #[test]
    fn selection_requires_both_fields() {
        let mut prefs = UserPreferences::default();
        prefs.provider = Some("anthropic".to_string());
        assert!(prefs.selection().is_none());

        prefs.model = Some("claude-sonnet-4".to_string());
        assert_eq!(prefs.selection(), Some(("anthropic", "claude-sonnet-4")));
    }

    #[test]
    fn missing_show_thinking_deserializes_true() {
        // Preference files written before the toggle existed carry no field.
        let prefs: UserPreferences = serde_json::from_str("{}").unwrap();
        assert!(prefs.show_thinking);
    }
}
