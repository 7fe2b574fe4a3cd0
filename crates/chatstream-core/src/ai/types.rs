//! Chat request types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Role of a chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Stop sequences: the API accepts a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for StopSequences {
    fn from(s: &str) -> Self {
        StopSequences::One(s.to_string())
    }
}

impl From<Vec<String>> for StopSequences {
    fn from(v: Vec<String>) -> Self {
        StopSequences::Many(v)
    }
}

/// Everything needed to issue one streaming chat completion
///
/// Fields left as `None` fall back to the client's [`crate::ClientConfig`] or are
/// omitted from the request body entirely.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub api_key: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Option<StopSequences>,
    /// Overrides the configured API base (e.g. `https://openrouter.ai/api/v1`)
    pub base_url: Option<String>,
    /// Sent as `HTTP-Referer`
    pub site_url: Option<String>,
    /// Sent as `X-Title`
    pub app_name: Option<String>,
    /// Merged into the top level of the request body, after the standard fields
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, api_key: impl Into<String>) -> Self {
        Self {
            messages,
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop(mut self, stop: impl Into<StopSequences>) -> Self {
        self.stop = Some(stop.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check the invariants that must hold before any network call
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.messages.is_empty() {
            return Err(ValidationError::EmptyMessages);
        }
        if self.api_key.trim().is_empty() {
            return Err(ValidationError::MissingApiKey);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let ok = ChatRequest::new(vec![ChatMessage::user("hi")], "sk-test");
        assert!(ok.validate().is_ok());

        let empty = ChatRequest::new(vec![], "sk-test");
        assert_eq!(empty.validate(), Err(ValidationError::EmptyMessages));

        let no_key = ChatRequest::new(vec![ChatMessage::user("hi")], "  ");
        assert_eq!(no_key.validate(), Err(ValidationError::MissingApiKey));
    }

    #[test]
    fn test_message_serialization() {
        let msg = ChatMessage::assistant("done");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "done"}));
    }

    #[test]
    fn test_stop_sequences_untagged() {
        let one = serde_json::to_value(StopSequences::from("END")).unwrap();
        assert_eq!(one, serde_json::json!("END"));

        let many = serde_json::to_value(StopSequences::from(vec![
            "a".to_string(),
            "b".to_string(),
        ]))
        .unwrap();
        assert_eq!(many, serde_json::json!(["a", "b"]));
    }
}
