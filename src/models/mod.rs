pub mod chat;
pub mod document;
pub mod session;
pub mod version;
