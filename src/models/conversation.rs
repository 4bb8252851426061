use serde::{Deserialize, Serialize};
use crate::models::email::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message of a linear conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        ConversationTurn { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ConversationTurn { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ConversationTurn { role: Role::Assistant, content: content.into() }
    }
}

/// Body of `POST /api/summarize-emails`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizeEmailsBody {
    #[serde(default)]
    pub model: Option<String>,
}

/// Body of `POST /api/chat`. Fields are optional so that missing data can be
/// answered with a 400 instead of a deserialization failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub email_id: Option<MessageId>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
}
