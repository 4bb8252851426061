use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::Ollama;
use reqwest::Url;

use crate::models::conversation::{ConversationTurn, Role};
use crate::services::llm_service::{flatten_prompt, non_empty, CompletionClient, CompletionError, InitFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OllamaMode {
    /// `/api/chat` with role-tagged messages.
    Chat,
    /// `/api/generate` with one flattened prompt.
    Generate,
}

/// Local model server reached through `ollama-rs`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    ollama: Ollama,
    mode: OllamaMode,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(host: &str, port: u16, mode: OllamaMode, timeout: Duration) -> Result<Self, InitFailure> {
        // Ollama::new panics on a host it cannot parse, so check first.
        let url = Url::parse(host)
            .map_err(|e| InitFailure::InvalidConfig(format!("OLLAMA_HOST {}: {}", host, e)))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(InitFailure::InvalidConfig(format!("OLLAMA_HOST {} has no host", host)));
        }

        Ok(OllamaClient {
            ollama: Ollama::new(host.to_string(), port),
            mode,
            timeout,
        })
    }

    async fn chat(&self, conversation: &[ConversationTurn], model: &str) -> Result<String, CompletionError> {
        let messages = conversation.iter().map(to_chat_message).collect();
        let request = ChatMessageRequest::new(model.to_string(), messages);
        let response = tokio::time::timeout(self.timeout, self.ollama.send_chat_messages(request))
            .await
            .map_err(|_| CompletionError::Backend(format!("Ollama chat timed out after {:?}", self.timeout)))?
            .map_err(|e| CompletionError::Backend(e.to_string()))?;
        non_empty(Some(response.message.content))
    }

    async fn generate(&self, conversation: &[ConversationTurn], model: &str) -> Result<String, CompletionError> {
        let request = GenerationRequest::new(model.to_string(), flatten_prompt(conversation));
        let response = tokio::time::timeout(self.timeout, self.ollama.generate(request))
            .await
            .map_err(|_| CompletionError::Backend(format!("Ollama generate timed out after {:?}", self.timeout)))?
            .map_err(|e| CompletionError::Backend(e.to_string()))?;
        non_empty(Some(response.response))
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, conversation: &[ConversationTurn], model: &str) -> Result<String, CompletionError> {
        debug!("Calling Ollama ({:?}) with {} turns, model {}", self.mode, conversation.len(), model);
        match self.mode {
            OllamaMode::Chat => self.chat(conversation, model).await,
            OllamaMode::Generate => self.generate(conversation, model).await,
        }
    }
}

fn to_chat_message(turn: &ConversationTurn) -> ChatMessage {
    match turn.role {
        Role::System => ChatMessage::system(turn.content.clone()),
        Role::User => ChatMessage::user(turn.content.clone()),
        Role::Assistant => ChatMessage::assistant(turn.content.clone()),
    }
}
