pub mod config;
pub mod decoder;
pub mod handlers;
pub mod mailbox;
pub mod models;
pub mod routes;
pub mod services;
