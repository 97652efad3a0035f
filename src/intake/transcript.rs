//! Chat transcript store — append-only batches of messages per
//! `(session, step)`. Rows are never updated; arrival order comes from the
//! autoincrement id, and the payload keeps the original structured message
//! shape so a session can be replayed exactly.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat::ChatMessage;
use crate::models::session::{IntakeSessionRow, IntakeStep};

fn validate_step(step: i64) -> Result<IntakeStep, AppError> {
    match IntakeStep::from_number(step) {
        Some(s) if s.has_transcript() => Ok(s),
        _ => Err(AppError::Validation(format!(
            "Transcript step must be 2 or 3, got {step}"
        ))),
    }
}

/// Appends one batch of messages for a step. The batch must be non-empty.
pub async fn append_batch(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
    step: i64,
    batch: &[ChatMessage],
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    append_batch_tx(&mut tx, session.id, step, batch).await?;
    tx.commit().await?;
    Ok(())
}

/// Transaction-scoped variant, used by the mediator to make the synthetic
/// verdict message part of the acceptance unit of work.
pub async fn append_batch_tx(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: Uuid,
    step: i64,
    batch: &[ChatMessage],
) -> Result<(), AppError> {
    validate_step(step)?;
    if batch.is_empty() {
        return Err(AppError::Validation(
            "Message batch must not be empty".to_string(),
        ));
    }
    let payload = serde_json::to_string(batch)
        .map_err(|e| AppError::Validation(format!("Batch is not serializable: {e}")))?;

    sqlx::query(
        "INSERT INTO chat_batches (session_id, step, payload, created_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(session_id)
    .bind(step)
    .bind(payload)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// All messages for one step, batches flattened in arrival order.
pub async fn get_step_messages(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
    step: i64,
) -> Result<Vec<ChatMessage>, AppError> {
    validate_step(step)?;

    let payloads: Vec<(String,)> = sqlx::query_as(
        "SELECT payload FROM chat_batches
         WHERE session_id = ?1 AND step = ?2 ORDER BY id ASC",
    )
    .bind(session.id)
    .bind(step)
    .fetch_all(pool)
    .await?;

    let mut messages = Vec::new();
    for (payload,) in payloads {
        let batch: Vec<ChatMessage> = serde_json::from_str(&payload)?;
        messages.extend(batch);
    }
    Ok(messages)
}

/// The full conversation: step number → chronological messages.
pub async fn get_full_conversation(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
) -> Result<BTreeMap<i64, Vec<ChatMessage>>, AppError> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT step, payload FROM chat_batches WHERE session_id = ?1 ORDER BY id ASC",
    )
    .bind(session.id)
    .fetch_all(pool)
    .await?;

    let mut conversation: BTreeMap<i64, Vec<ChatMessage>> = BTreeMap::new();
    for (step, payload) in rows {
        let batch: Vec<ChatMessage> = serde_json::from_str(&payload)?;
        conversation.entry(step).or_default().extend(batch);
    }
    Ok(conversation)
}
