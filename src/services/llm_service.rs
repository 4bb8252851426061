use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::config::{BackendKind, CompletionConfig};
use crate::models::conversation::{ConversationTurn, Role};
use crate::services::cerebras_client::CerebrasClient;
use crate::services::ollama_client::{OllamaClient, OllamaMode};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Backend returned no usable content")]
    EmptyResponse,
}

/// A language-model backend that answers a role-tagged conversation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, conversation: &[ConversationTurn], model: &str) -> Result<String, CompletionError>;
}

/// Why the backend could not be built at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InitFailure {
    #[error("missing credential {0}")]
    MissingCredential(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The completion backend as built once at startup and injected into the
/// services. `Unavailable` keeps the process running and is reported to users
/// as text.
#[derive(Clone)]
pub enum CompletionBackend {
    Ready(Arc<dyn CompletionClient>),
    Unavailable(InitFailure),
}

impl fmt::Debug for CompletionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionBackend::Ready(_) => f.write_str("Ready"),
            CompletionBackend::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

impl CompletionBackend {
    pub fn ready(client: impl CompletionClient + 'static) -> Self {
        CompletionBackend::Ready(Arc::new(client))
    }
}

/// Text shown in place of a summary or answer when no backend is available.
pub fn unavailable_message(reason: &InitFailure) -> String {
    format!("Completion backend is not initialized: {}. Check server logs for configuration issues.", reason)
}

pub fn build_backend(config: &CompletionConfig) -> CompletionBackend {
    let backend = match config.kind {
        BackendKind::Cerebras => match config.cerebras_api_key.as_deref() {
            Some(key) => CerebrasClient::new(&config.cerebras_api_url, key, config.timeout)
                .map(CompletionBackend::ready)
                .unwrap_or_else(CompletionBackend::Unavailable),
            None => CompletionBackend::Unavailable(InitFailure::MissingCredential("CEREBRAS_API_KEY")),
        },
        BackendKind::OllamaChat | BackendKind::OllamaGenerate => {
            let mode = if config.kind == BackendKind::OllamaChat { OllamaMode::Chat } else { OllamaMode::Generate };
            OllamaClient::new(&config.ollama_host, config.ollama_port, mode, config.timeout)
                .map(CompletionBackend::ready)
                .unwrap_or_else(CompletionBackend::Unavailable)
        }
    };

    match &backend {
        CompletionBackend::Ready(_) => info!("Completion backend ready: {:?}", config.kind),
        CompletionBackend::Unavailable(reason) => warn!("Completion backend unavailable: {}", reason),
    }
    backend
}

/// Flattens a conversation for backends that only take a single prompt.
/// System turns become a preamble; the remaining turns are labelled by role.
pub fn flatten_prompt(conversation: &[ConversationTurn]) -> String {
    let (system, dialogue): (Vec<&ConversationTurn>, Vec<&ConversationTurn>) =
        conversation.iter().partition(|turn| turn.role == Role::System);

    let mut sections: Vec<String> = system.iter().map(|turn| turn.content.clone()).collect();

    // A lone user turn is sent verbatim, which is what the summary prompt needs.
    if let [only] = dialogue.as_slice() {
        if only.role == Role::User && system.is_empty() {
            return only.content.clone();
        }
    }

    sections.extend(dialogue.iter().map(|turn| match turn.role {
        Role::Assistant => format!("Assistant: {}", turn.content),
        _ => format!("User: {}", turn.content),
    }));
    if !dialogue.is_empty() {
        sections.push("Assistant:".to_string());
    }
    sections.join("\n\n")
}

/// Blank generations count as no usable content.
pub fn non_empty(content: Option<String>) -> Result<String, CompletionError> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(CompletionError::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(kind: BackendKind, key: Option<&str>) -> CompletionConfig {
        CompletionConfig {
            kind,
            cerebras_api_url: "https://api.cerebras.ai/v1".to_string(),
            cerebras_api_key: key.map(String::from),
            ollama_host: "http://localhost".to_string(),
            ollama_port: 11434,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn missing_key_yields_unavailable_backend() {
        let backend = build_backend(&config(BackendKind::Cerebras, None));
        match backend {
            CompletionBackend::Unavailable(reason) => {
                assert_eq!(reason, InitFailure::MissingCredential("CEREBRAS_API_KEY"));
                assert!(unavailable_message(&reason).contains("CEREBRAS_API_KEY"));
            }
            other => panic!("expected unavailable backend, got {:?}", other),
        }
    }

    #[test]
    fn configured_backends_are_ready() {
        for (kind, key) in [
            (BackendKind::Cerebras, Some("csk-test")),
            (BackendKind::OllamaChat, None),
            (BackendKind::OllamaGenerate, None),
        ] {
            let backend = build_backend(&config(kind, key));
            assert!(matches!(backend, CompletionBackend::Ready(_)), "{:?} should be ready", kind);
        }
    }

    #[test]
    fn single_user_turn_is_sent_verbatim() {
        let prompt = flatten_prompt(&[ConversationTurn::user("Summarize this")]);
        assert_eq!(prompt, "Summarize this");
    }

    #[test]
    fn chat_conversation_is_flattened_with_roles() {
        let prompt = flatten_prompt(&[
            ConversationTurn::system("Email: lunch on Tuesday"),
            ConversationTurn::user("When?"),
            ConversationTurn::assistant("Tuesday."),
            ConversationTurn::user("Where?"),
        ]);
        assert_eq!(
            prompt,
            "Email: lunch on Tuesday\n\nUser: When?\n\nAssistant: Tuesday.\n\nUser: Where?\n\nAssistant:"
        );
    }

    #[test]
    fn blank_content_is_an_empty_response() {
        assert!(matches!(non_empty(None), Err(CompletionError::EmptyResponse)));
        assert!(matches!(non_empty(Some("  \n".to_string())), Err(CompletionError::EmptyResponse)));
        assert_eq!(non_empty(Some(" ok ".to_string())).unwrap(), "ok");
    }
}
