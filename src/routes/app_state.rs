use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::mailbox::{Credentials, ImapConnector, MailboxConnector};
use crate::services::llm_service::CompletionBackend;

/// Shared, read-only request context. Nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn MailboxConnector>,
    pub credentials: Credentials,
    pub backend: CompletionBackend,
    pub default_model: String,
    pub batch_size: usize,
    pub mailbox_timeout: Duration,
}

impl AppState {
    pub fn from_config(config: &AppConfig, backend: CompletionBackend) -> Self {
        AppState {
            connector: Arc::new(ImapConnector::new(
                config.imap_host.clone(),
                config.imap_port,
                config.mailbox_timeout,
            )),
            credentials: config.credentials.clone(),
            backend,
            default_model: config.default_model.clone(),
            batch_size: config.batch_size,
            mailbox_timeout: config.mailbox_timeout,
        }
    }

    /// The requested model, or the configured default when none was sent.
    pub fn model_or_default(&self, requested: Option<String>) -> String {
        requested
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.default_model.clone())
    }
}
