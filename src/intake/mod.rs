pub mod chat;
pub mod session;
pub mod transcript;
