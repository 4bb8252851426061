use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::mailbox::Credentials;

pub fn init_logging() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}

pub const DEFAULT_MODEL: &str = "llama3.1-8b";
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Batch size of the single-backend `/summarize-emails` route.
pub const LEGACY_BATCH_SIZE: usize = 5;

const IMAP_HOST: &str = "imap.gmail.com";
const IMAP_PORT: u16 = 993;
const CEREBRAS_API_URL: &str = "https://api.cerebras.ai/v1";
const OLLAMA_HOST: &str = "http://localhost";
const OLLAMA_PORT: u16 = 11434;
const BIND_ADDR: &str = "0.0.0.0:5000";
const STATIC_DIR: &str = "./static";
const MAILBOX_TIMEOUT_SECS: u64 = 30;
const COMPLETION_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which completion backend the process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Hosted OpenAI-compatible chat API.
    Cerebras,
    /// Local Ollama server, `/api/chat`.
    OllamaChat,
    /// Local Ollama server, `/api/generate` (single prompt).
    OllamaGenerate,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cerebras" | "openai" => Ok(BackendKind::Cerebras),
            "ollama" | "ollama-chat" => Ok(BackendKind::OllamaChat),
            "ollama-generate" => Ok(BackendKind::OllamaGenerate),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub kind: BackendKind,
    pub cerebras_api_url: String,
    pub cerebras_api_key: Option<String>,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub credentials: Credentials,
    pub completion: CompletionConfig,
    pub default_model: String,
    pub batch_size: usize,
    pub mailbox_timeout: Duration,
    pub bind_addr: String,
    pub static_dir: String,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let credentials = Credentials {
            username: required("GMAIL_USER")?,
            password: required("GMAIL_APP_PASSWORD")?,
        };

        let kind = match get("COMPLETION_BACKEND") {
            Some(value) => value
                .parse()
                .map_err(|value| ConfigError::Invalid { key: "COMPLETION_BACKEND", value })?,
            None => BackendKind::Cerebras,
        };

        let batch_size = parse_or(&get, "BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid { key: "BATCH_SIZE", value: "0".to_string() });
        }

        Ok(AppConfig {
            imap_host: get("IMAP_HOST").unwrap_or_else(|| IMAP_HOST.to_string()),
            imap_port: parse_or(&get, "IMAP_PORT", IMAP_PORT)?,
            credentials,
            completion: CompletionConfig {
                kind,
                cerebras_api_url: get("CEREBRAS_API_URL").unwrap_or_else(|| CEREBRAS_API_URL.to_string()),
                cerebras_api_key: get("CEREBRAS_API_KEY"),
                ollama_host: get("OLLAMA_HOST").unwrap_or_else(|| OLLAMA_HOST.to_string()),
                ollama_port: parse_or(&get, "OLLAMA_PORT", OLLAMA_PORT)?,
                timeout: Duration::from_secs(parse_or(&get, "COMPLETION_TIMEOUT_SECS", COMPLETION_TIMEOUT_SECS)?),
            },
            default_model: get("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            batch_size,
            mailbox_timeout: Duration::from_secs(parse_or(&get, "MAILBOX_TIMEOUT_SECS", MAILBOX_TIMEOUT_SECS)?),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| BIND_ADDR.to_string()),
            static_dir: get("STATIC_DIR").unwrap_or_else(|| STATIC_DIR.to_string()),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const CREDS: [(&str, &str); 2] = [("GMAIL_USER", "me@example.com"), ("GMAIL_APP_PASSWORD", "abcd efgh")];

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let config = AppConfig::from_lookup(lookup(&CREDS)).unwrap();
        assert_eq!(config.imap_host, "imap.gmail.com");
        assert_eq!(config.imap_port, 993);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.default_model, "llama3.1-8b");
        assert_eq!(config.completion.kind, BackendKind::Cerebras);
        assert!(config.completion.cerebras_api_key.is_none());
        assert_eq!(config.mailbox_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_mailbox_password_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[("GMAIL_USER", "me@example.com")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GMAIL_APP_PASSWORD"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = AppConfig::from_lookup(lookup(&[("GMAIL_USER", "  "), ("GMAIL_APP_PASSWORD", "x")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("GMAIL_USER"));
    }

    #[test]
    fn backend_kind_and_numbers_are_parsed() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([
            ("COMPLETION_BACKEND", "ollama-generate"),
            ("OLLAMA_PORT", "11435"),
            ("BATCH_SIZE", "5"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.completion.kind, BackendKind::OllamaGenerate);
        assert_eq!(config.completion.ollama_port, 11435);
        assert_eq!(config.batch_size, 5);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("COMPLETION_BACKEND", "gpt-cloud"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: "COMPLETION_BACKEND", value: "gpt-cloud".to_string() });
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("BATCH_SIZE", "0"));
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
