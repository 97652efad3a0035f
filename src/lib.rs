//! Draftsmith — the core library behind the AI-assisted resume builder.
//!
//! The interactive flow is: an intake session advances through three steps,
//! chat turns in steps 2–3 produce tool invocations from the model, the
//! proposal mediator turns those into human-reviewable mutations, accepted
//! resume drafts become immutable versions, and previews of any version are
//! rendered through a bounded per-job cache.
//!
//! The HTTP layer, CRUD screens, prompt content, document rendering engine
//! and the domain-entity store all live outside this crate. They are consumed
//! through the `ChatModel`, `Renderer` and `DomainStore` seams.

pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod intake;
pub mod llm_client;
pub mod models;
pub mod preview;
pub mod proposals;
pub mod state;
pub mod telemetry;
pub mod versions;

pub use config::Config;
pub use errors::AppError;
pub use state::{AppState, SessionContext};
