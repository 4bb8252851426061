pub mod app_state;
pub mod chat_routes;
pub mod summary_routes;
