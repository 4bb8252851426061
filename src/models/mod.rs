pub mod conversation;
pub mod email;
