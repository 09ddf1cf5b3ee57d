//! Transport abstraction for fetching a reply

use async_trait::async_trait;
use quill_ai::providers::{get_api_key, provider_for};
use quill_ai::{FragmentStream, Message, Model, Result};
use tracing::debug;

/// Produces the text fragments of one reply.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `messages` and stream the reply.
    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream>;
}

/// Direct provider transport - calls the chat endpoint over HTTP.
///
/// The credential is read from the environment on every request, so a
/// missing key fails the round rather than the session.
pub struct ProviderTransport {
    model: Model,
    api_key_env: Option<String>,
}

impl ProviderTransport {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            api_key_env: None,
        }
    }

    /// Read the credential from `name` instead of the endpoint's default
    /// variable.
    pub fn with_api_key_env(mut self, name: impl Into<String>) -> Self {
        self.api_key_env = Some(name.into());
        self
    }

    /// Environment variable the credential is read from.
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or(self.model.api.api_key_env_var())
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream> {
        let api_key = get_api_key(None, self.api_key_env())?;
        debug!(
            "requesting {} via {:?} ({} messages)",
            self.model.id,
            self.model.api,
            messages.len()
        );
        provider_for(&self.model, api_key)
            .stream(&self.model, messages)
            .await
    }
}
