use log::{error, info};

use crate::models::conversation::ConversationTurn;
use crate::models::email::{EmailDigest, MailboxMessage};
use crate::services::llm_service::{unavailable_message, CompletionBackend};

pub const EMPTY_BODY_SUMMARY: &str = "Email body was empty, no summary generated.";

const SUMMARY_PROMPT: &str = "Please provide a concise summary of the following email text:\n\n---\n\n";

/// Summarizes one email body. Never fails: backend problems come back as
/// readable text so that a batch always has one entry per message.
pub async fn summarize(backend: &CompletionBackend, body: &str, model: &str) -> String {
    let client = match backend {
        CompletionBackend::Ready(client) => client,
        CompletionBackend::Unavailable(reason) => return unavailable_message(reason),
    };
    if body.trim().is_empty() {
        return EMPTY_BODY_SUMMARY.to_string();
    }

    let conversation = [ConversationTurn::user(format!("{}{}", SUMMARY_PROMPT, body))];
    match client.complete(&conversation, model).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Error calling completion backend for summary: {}", e);
            format!("Could not get summary from AI service: {}", e)
        }
    }
}

/// Summarizes messages one after another, keeping input order.
pub async fn summarize_batch(backend: &CompletionBackend, messages: &[MailboxMessage], model: &str) -> Vec<EmailDigest> {
    info!("Summarizing {} emails with model {}", messages.len(), model);
    let mut digests = Vec::with_capacity(messages.len());
    for message in messages {
        let summary = summarize(backend, &message.body, model).await;
        digests.push(EmailDigest::new(message, summary));
    }
    digests
}
