use std::fmt;
use serde::{Deserialize, Serialize};

/// Server-assigned message identifier. Opaque to everything but the mailbox adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoded inbox message. Built per request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailboxMessage {
    pub id: MessageId,
    pub subject: String,
    pub sender: String,
    pub body: String,
}

impl fmt::Display for MailboxMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Email:")?;
        writeln!(f, "  ID: {}", self.id)?;
        writeln!(f, "  From: {}", self.sender)?;
        writeln!(f, "  Subject: {}", self.subject)?;
        if !self.body.is_empty() {
            writeln!(f, "  Body: {}", self.body)?;
        }
        Ok(())
    }
}

/// A summarized message as returned to the front-end. The body stays server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDigest {
    pub id: MessageId,
    pub subject: String,
    pub from: String,
    pub summary: String,
}

impl EmailDigest {
    pub fn new(message: &MailboxMessage, summary: String) -> Self {
        EmailDigest {
            id: message.id.clone(),
            subject: message.subject.clone(),
            from: message.sender.clone(),
            summary,
        }
    }
}
