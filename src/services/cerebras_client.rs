//! Hosted chat backend speaking the OpenAI-compatible `/chat/completions` API.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::models::conversation::ConversationTurn;
use crate::services::llm_service::{non_empty, CompletionClient, CompletionError, InitFailure};

pub struct CerebrasClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CerebrasClient {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self, InitFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InitFailure::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        Ok(CerebrasClient {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl CompletionClient for CerebrasClient {
    async fn complete(&self, conversation: &[ConversationTurn], model: &str) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model,
            messages: conversation.iter()
                .map(|turn| WireMessage { role: turn.role.as_str(), content: &turn.content })
                .collect(),
        };
        debug!("Calling {} with {} turns, model {}", self.completions_url(), conversation.len(), model);

        let response = self.client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                CompletionError::Backend(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            error!("Completion API returned {}: {}", status, text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Auth(format!("{} {}", status, text)),
                _ => CompletionError::Backend(format!("{} {}", status, text)),
            });
        }

        let parsed: ChatCompletionResponse = response.json().await
            .map_err(|e| CompletionError::Backend(format!("Invalid response from API: {}", e)))?;

        non_empty(
            parsed.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message)
                .and_then(|message| message.content),
        )
    }
}
