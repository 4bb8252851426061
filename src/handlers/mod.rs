pub mod chat_handler;
pub mod summary_handler;
