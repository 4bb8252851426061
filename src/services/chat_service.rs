use log::{error, info};

use crate::models::conversation::ConversationTurn;
use crate::services::llm_service::{unavailable_message, CompletionBackend};

const GROUNDING_PROMPT: &str = "You are a helpful assistant. Answer questions based on the following email content:\n\n";

/// Builds the conversation sent for one chat turn: a system turn grounding the
/// assistant in `body`, the prior turns as given, then the new question.
pub fn build_conversation(body: &str, question: &str, history: &[ConversationTurn]) -> Vec<ConversationTurn> {
    let mut conversation = Vec::with_capacity(history.len() + 2);
    conversation.push(ConversationTurn::system(format!("{}{}", GROUNDING_PROMPT, body)));
    conversation.extend_from_slice(history);
    conversation.push(ConversationTurn::user(question));
    conversation
}

/// Answers a question about one email. Backend failures come back as text.
pub async fn chat(
    backend: &CompletionBackend,
    body: &str,
    question: &str,
    history: &[ConversationTurn],
    model: &str,
) -> String {
    let client = match backend {
        CompletionBackend::Ready(client) => client,
        CompletionBackend::Unavailable(reason) => return unavailable_message(reason),
    };

    // History is resent in full on every call; there is no cap on its length.
    let conversation = build_conversation(body, question, history);
    info!("Chat call with {} prior turns, model {}", history.len(), model);

    match client.complete(&conversation, model).await {
        Ok(answer) => answer,
        Err(e) => {
            error!("Error calling completion backend for chat: {}", e);
            format!("Could not get chat response from AI service: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::Role;
    use crate::services::llm_service::{CompletionError, InitFailure, MockCompletionClient};

    fn history() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user("Who sent this?"),
            ConversationTurn::assistant("Kai Henderson."),
            ConversationTurn::user("What is it about?"),
            ConversationTurn::assistant("An invoice."),
        ]
    }

    #[test]
    fn conversation_is_grounded_then_history_then_question() {
        let conversation = build_conversation("Invoice #12345 is due in 30 days.", "When is it due?", &history());

        assert_eq!(conversation.len(), history().len() + 2);
        let first = conversation.first().unwrap();
        assert_eq!(first.role, Role::System);
        assert!(first.content.contains("Invoice #12345 is due in 30 days."));
        assert_eq!(&conversation[1..conversation.len() - 1], history().as_slice());
        assert_eq!(conversation.last().unwrap(), &ConversationTurn::user("When is it due?"));
    }

    #[test]
    fn empty_history_gives_two_turns() {
        let conversation = build_conversation("", "Anything?", &[]);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].role, Role::System);
        assert_eq!(conversation[1].content, "Anything?");
    }

    #[test]
    fn history_never_embeds_the_body() {
        let body = "UNIQUE-BODY-MARKER";
        let conversation = build_conversation(body, "q", &history());
        let mentions = conversation.iter().filter(|turn| turn.content.contains(body)).count();
        assert_eq!(mentions, 1);
    }

    #[tokio::test]
    async fn chat_sends_built_conversation() {
        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(|conversation: &[ConversationTurn], model: &str| {
                conversation.len() == 6
                    && conversation[0].role == Role::System
                    && conversation[5].content == "When is it due?"
                    && model == "qwen-3-32b"
            })
            .times(1)
            .returning(|_, _| Ok("In 30 days.".to_string()));
        let backend = CompletionBackend::ready(mock);

        let answer = chat(&backend, "Invoice body", "When is it due?", &history(), "qwen-3-32b").await;
        assert_eq!(answer, "In 30 days.");
    }

    #[tokio::test]
    async fn chat_backend_error_becomes_text() {
        let mut mock = MockCompletionClient::new();
        mock.expect_complete().returning(|_, _| Err(CompletionError::EmptyResponse));
        let backend = CompletionBackend::ready(mock);

        let answer = chat(&backend, "body", "q", &[], "m").await;
        assert!(answer.starts_with("Could not get chat response from AI service"));
    }

    #[tokio::test]
    async fn chat_with_unavailable_backend_returns_sentinel() {
        let backend = CompletionBackend::Unavailable(InitFailure::MissingCredential("CEREBRAS_API_KEY"));
        let answer = chat(&backend, "body", "q", &[], "m").await;
        assert!(answer.starts_with("Completion backend is not initialized"));
    }
}
