//! Chat completion endpoints

pub mod bedrock;
pub mod openai;

use crate::{Api, Error, FragmentStream, Message, Model, Result};
use async_trait::async_trait;

/// Trait for streaming chat endpoints
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the full message list and stream the reply text back
    async fn stream(&self, model: &Model, messages: &[Message]) -> Result<FragmentStream>;
}

/// Get an API key from a provided value or the environment
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided {
        return Ok(key.to_string());
    }

    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::MissingCredential(env_var.to_string())),
    }
}

/// Build the provider matching the model's wire protocol
pub fn provider_for(model: &Model, api_key: String) -> Box<dyn ChatProvider> {
    match model.api {
        Api::OpenAiChat => Box::new(openai::OpenAIProvider::new(api_key)),
        Api::BedrockConverse => Box::new(bedrock::BedrockProvider::new(api_key)),
    }
}

/// Turn a non-success response into an API error.
pub(crate) async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match body.trim() {
        "" => status.canonical_reason().unwrap_or("request failed").to_string(),
        text => text.chars().take(500).collect(),
    };
    Err(Error::api(status.as_u16(), message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_api_key_prefers_provided() {
        let key = get_api_key(Some("sk-test"), "QUILL_TEST_UNSET_VAR").unwrap();
        assert_eq!(key, "sk-test");
    }

    #[test]
    fn test_get_api_key_missing() {
        let err = get_api_key(None, "QUILL_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(matches!(err, Error::MissingCredential(ref v) if v == "QUILL_TEST_DEFINITELY_UNSET"));
    }
}
