//! Core types for chat interactions

use serde::{Deserialize, Serialize};

/// Wire protocol spoken by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Api {
    /// OpenAI-compatible `chat/completions` with server-sent events
    OpenAiChat,
    /// Bedrock `converse-stream` with binary event-stream frames
    BedrockConverse,
}

impl Api {
    /// Pick the wire protocol for a configured base URL.
    pub fn detect(base_url: &str) -> Self {
        if base_url.to_ascii_lowercase().contains("bedrock") {
            Api::BedrockConverse
        } else {
            Api::OpenAiChat
        }
    }

    /// Environment variable holding the bearer credential by default
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            Api::OpenAiChat => "OPENAI_API_KEY",
            Api::BedrockConverse => "AWS_BEARER_TOKEN_BEDROCK",
        }
    }
}

/// Model definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g., "gpt-4o")
    pub id: String,
    /// Base URL for API calls, without a trailing slash
    pub base_url: String,
    /// API type to use
    pub api: Api,
}

impl Model {
    /// Create a model, detecting the wire protocol from the base URL.
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            id: id.into(),
            api: Api::detect(&base_url),
            base_url,
        }
    }
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Unix millis; not sent over the wire
    #[serde(skip)]
    pub timestamp: i64,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_detect() {
        assert_eq!(Api::detect("https://api.openai.com/v1"), Api::OpenAiChat);
        assert_eq!(
            Api::detect("https://bedrock-runtime.us-east-1.amazonaws.com"),
            Api::BedrockConverse
        );
        assert_eq!(Api::detect("http://localhost:11434/v1"), Api::OpenAiChat);
    }

    #[test]
    fn test_model_trims_trailing_slash() {
        let model = Model::new("gpt-4o", "https://api.openai.com/v1/");
        assert_eq!(model.base_url, "https://api.openai.com/v1");
        assert_eq!(model.api, Api::OpenAiChat);
    }

    #[test]
    fn test_message_serializes_role_and_content_only() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
