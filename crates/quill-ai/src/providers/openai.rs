//! OpenAI-compatible Chat Completions provider

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{ChatProvider, error_for_status};
use crate::{
    error::Result,
    frames::SseDecoder,
    stream::{FragmentStream, decode_body},
    types::{Message, Model, Role},
};

/// Client for any endpoint speaking `POST {base}/chat/completions`
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIProvider {
    /// Create a new provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn build_request<'a>(&self, model: &'a Model, messages: &'a [Message]) -> OpenAIRequest<'a> {
        OpenAIRequest {
            model: &model.id,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            stream: true,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    async fn stream(&self, model: &Model, messages: &[Message]) -> Result<FragmentStream> {
        let url = format!("{}/chat/completions", model.base_url);
        debug!("POST {} ({} messages)", url, messages.len());

        let request = self.build_request(model, messages);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        Ok(decode_body(response, SseDecoder::new()))
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// Request types

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let provider = OpenAIProvider::new("sk-test");
        let model = Model::new("gpt-4o", "https://api.openai.com/v1");
        let messages = vec![
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];

        let json = serde_json::to_value(provider.build_request(&model, &messages)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                ],
                "stream": true,
            })
        );
    }
}
