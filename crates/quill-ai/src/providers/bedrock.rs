//! Bedrock Converse streaming provider
//!
//! Uses bearer-token authentication (`AWS_BEARER_TOKEN_BEDROCK`) rather than
//! SigV4 request signing; the response body is a sequence of binary
//! event-stream frames.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{ChatProvider, error_for_status};
use crate::{
    error::Result,
    frames::EventStreamDecoder,
    stream::{FragmentStream, decode_body},
    types::{Message, Model, Role},
};

/// Client for `POST {base}/model/{id}/converse-stream`
pub struct BedrockProvider {
    client: reqwest::Client,
    api_key: String,
}

impl BedrockProvider {
    /// Create a new provider with a bearer token
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn build_request(&self, messages: &[Message]) -> ConverseRequest {
        let mut system = Vec::new();
        let mut turns: Vec<ConverseMessage> = Vec::new();

        for msg in messages {
            let role = match msg.role {
                Role::System => {
                    system.push(TextBlock {
                        text: msg.content.clone(),
                    });
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "assistant",
            };

            // Converse requires strictly alternating roles
            match turns.last_mut() {
                Some(last) if last.role == role => last.content.push(TextBlock {
                    text: msg.content.clone(),
                }),
                _ => turns.push(ConverseMessage {
                    role,
                    content: vec![TextBlock {
                        text: msg.content.clone(),
                    }],
                }),
            }
        }

        ConverseRequest {
            messages: turns,
            system,
        }
    }
}

#[async_trait]
impl ChatProvider for BedrockProvider {
    async fn stream(&self, model: &Model, messages: &[Message]) -> Result<FragmentStream> {
        let url = format!("{}/model/{}/converse-stream", model.base_url, model.id);
        debug!("POST {} ({} messages)", url, messages.len());

        let request = self.build_request(messages);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        Ok(decode_body(response, EventStreamDecoder::new()))
    }
}

// Request types

#[derive(Debug, Serialize)]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<TextBlock>,
}

#[derive(Debug, Serialize)]
struct ConverseMessage {
    role: &'static str,
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize)]
struct TextBlock {
    text: String,
}
