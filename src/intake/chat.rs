//! One intake chat turn.
//!
//! Flow: model call → persist the turn → re-render open proposals. The model
//! is called before anything is written, so a quota failure surfaces with no
//! partial state and the turn is safely retryable. A degraded outcome
//! persists only the user message for the same reason; the error flag rides
//! back to the caller on the outcome.
//!
//! Prompt content is owned by the caller — this crate only wires the step's
//! tool set and the stored transcript into the call.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::domain::DomainStore;
use crate::errors::AppError;
use crate::intake::transcript;
use crate::llm_client::{tools, ChatModel, ModelOutcome};
use crate::models::chat::ChatMessage;
use crate::models::session::{IntakeSessionRow, IntakeStep};
use crate::proposals::{open_proposals, OpenProposal};

/// Result of one chat turn: what the model said plus every proposal still
/// awaiting a verdict for this step.
#[derive(Debug)]
pub struct ChatTurn {
    pub outcome: ModelOutcome,
    pub proposals: Vec<OpenProposal>,
}

pub async fn run_chat_turn(
    pool: &SqlitePool,
    model: &dyn ChatModel,
    domain: &dyn DomainStore,
    session: &IntakeSessionRow,
    step: i64,
    system: &str,
    user_message: &str,
) -> Result<ChatTurn, AppError> {
    let step_kind = IntakeStep::from_number(step)
        .filter(|s| s.has_transcript())
        .ok_or_else(|| AppError::Validation(format!("Chat step must be 2 or 3, got {step}")))?;
    if session.is_completed() {
        return Err(AppError::Validation(
            "Session is completed; restart intake to chat again".to_string(),
        ));
    }
    if user_message.trim().is_empty() {
        return Err(AppError::Validation("Message must not be empty".to_string()));
    }

    let mut messages = transcript::get_step_messages(pool, session, step).await?;
    let user = ChatMessage::user(user_message);
    messages.push(user.clone());

    // QuotaExceeded propagates here before anything is persisted.
    let outcome = model
        .chat(system, &messages, &tools::step_tools(step_kind))
        .await?;

    let batch = if outcome.degraded {
        warn!(
            "Degraded model outcome for session {}: {:?}",
            session.id, outcome.error
        );
        vec![user]
    } else {
        vec![user, outcome.to_message()]
    };
    transcript::append_batch(pool, session, step, &batch).await?;

    let proposals = open_proposals(pool, domain, session, step).await?;

    info!(
        "Chat turn for session {} step {step}: {} tool call(s), {} open proposal(s)",
        session.id,
        outcome.tool_calls.len(),
        proposals.len()
    );

    Ok(ChatTurn { outcome, proposals })
}
