pub mod cerebras_client;
pub mod chat_service;
pub mod email_service;
pub mod llm_service;
pub mod ollama_client;
pub mod summary_service;
