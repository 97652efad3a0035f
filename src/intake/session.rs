//! Intake session state machine.
//!
//! One session per job, created on first entry. Steps move 1 → 2 → 3 and
//! never backwards while the session is open; `complete_session` makes the
//! session terminal. Step 1 records the gap analysis, step 2 the stakeholder
//! analysis, step 3 the conversation summary.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::{IntakeSessionRow, IntakeStep};

/// Creates the session for `job_id` at step 1, or returns the existing one
/// unchanged. Idempotent by design: re-entering intake never errors.
pub async fn create_session(
    pool: &SqlitePool,
    job_id: Uuid,
) -> Result<IntakeSessionRow, AppError> {
    if let Some(existing) = get_session_by_job(pool, job_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO intake_sessions (id, job_id, current_step, created_at, updated_at)
         VALUES (?1, ?2, 1, ?3, ?3)
         ON CONFLICT (job_id) DO NOTHING",
    )
    .bind(id)
    .bind(job_id)
    .bind(now)
    .execute(pool)
    .await?;

    info!("Created intake session {id} for job {job_id}");

    // Re-read rather than assume: the conflict arm may have kept another row.
    get_session_by_job(pool, job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session for job {job_id} not found")))
}

pub async fn get_session(pool: &SqlitePool, id: Uuid) -> Result<IntakeSessionRow, AppError> {
    sqlx::query_as::<_, IntakeSessionRow>("SELECT * FROM intake_sessions WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

pub async fn get_session_by_job(
    pool: &SqlitePool,
    job_id: Uuid,
) -> Result<Option<IntakeSessionRow>, AppError> {
    Ok(
        sqlx::query_as::<_, IntakeSessionRow>("SELECT * FROM intake_sessions WHERE job_id = ?1")
            .bind(job_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Moves the session to `step`, optionally marking that step completed.
/// Steps only move forward; a terminal session cannot advance.
pub async fn advance_session(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
    step: i64,
    completed: bool,
) -> Result<IntakeSessionRow, AppError> {
    let target = IntakeStep::from_number(step)
        .ok_or_else(|| AppError::Validation(format!("Invalid intake step: {step}")))?;

    if session.is_completed() {
        return Err(AppError::Validation(
            "Session is completed and cannot advance".to_string(),
        ));
    }
    if target.number() < session.current_step {
        return Err(AppError::Validation(format!(
            "Cannot move back from step {} to step {}",
            session.current_step,
            target.number()
        )));
    }

    let flag_column = match target {
        IntakeStep::Step1 => "step1_completed",
        IntakeStep::Step2 => "step2_completed",
        IntakeStep::Step3 => "step3_completed",
    };

    // The completion flag is only ever raised here, never lowered.
    let sql = format!(
        "UPDATE intake_sessions
         SET current_step = ?1,
             {flag_column} = CASE WHEN ?2 THEN 1 ELSE {flag_column} END,
             updated_at = ?3
         WHERE id = ?4"
    );
    sqlx::query(&sql)
        .bind(target.number())
        .bind(completed)
        .bind(Utc::now())
        .bind(session.id)
        .execute(pool)
        .await?;

    get_session(pool, session.id).await
}

/// Step 1 output: how the user's background maps onto the job posting.
pub async fn record_gap_analysis(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
    text: &str,
) -> Result<IntakeSessionRow, AppError> {
    record_text_field(pool, session, "gap_analysis", text).await
}

/// Step 2 output: who the resume is written for and what they care about.
pub async fn record_stakeholder_analysis(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
    text: &str,
) -> Result<IntakeSessionRow, AppError> {
    record_text_field(pool, session, "stakeholder_analysis", text).await
}

/// Step 3 output: distilled summary of the whole intake conversation.
pub async fn record_conversation_summary(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
    text: &str,
) -> Result<IntakeSessionRow, AppError> {
    record_text_field(pool, session, "conversation_summary", text).await
}

async fn record_text_field(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
    column: &'static str,
    text: &str,
) -> Result<IntakeSessionRow, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(format!("{column} must not be empty")));
    }

    let sql = format!("UPDATE intake_sessions SET {column} = ?1, updated_at = ?2 WHERE id = ?3");
    sqlx::query(&sql)
        .bind(text)
        .bind(Utc::now())
        .bind(session.id)
        .execute(pool)
        .await?;

    get_session(pool, session.id).await
}

/// Marks the session terminal. Idempotent: a second call keeps the original
/// completion timestamp.
pub async fn complete_session(
    pool: &SqlitePool,
    session: &IntakeSessionRow,
) -> Result<IntakeSessionRow, AppError> {
    if session.is_completed() {
        return get_session(pool, session.id).await;
    }

    sqlx::query(
        "UPDATE intake_sessions SET completed_at = ?1, updated_at = ?1
         WHERE id = ?2 AND completed_at IS NULL",
    )
    .bind(Utc::now())
    .bind(session.id)
    .execute(pool)
    .await?;

    info!("Completed intake session {}", session.id);
    get_session(pool, session.id).await
}

/// Re-enters intake for a job whose session already completed: the existing
/// row is reset to step 1 with flags, analyses and `completed_at` cleared,
/// and the session's transcript and handled-proposal marks are deleted so
/// the restarted run starts from a blank conversation. Prior state is
/// deliberately not archived; the one-row-per-job invariant stays intact.
pub async fn restart_session(pool: &SqlitePool, job_id: Uuid) -> Result<IntakeSessionRow, AppError> {
    let session = get_session_by_job(pool, job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session for job {job_id} not found")))?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chat_batches WHERE session_id = ?1")
        .bind(session.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM handled_proposals WHERE session_id = ?1")
        .bind(session.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE intake_sessions
         SET current_step = 1,
             step1_completed = 0, step2_completed = 0, step3_completed = 0,
             gap_analysis = NULL, stakeholder_analysis = NULL,
             conversation_summary = NULL, completed_at = NULL,
             updated_at = ?1
         WHERE id = ?2",
    )
    .bind(Utc::now())
    .bind(session.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Restarted intake session {} for job {job_id}", session.id);
    get_session(pool, session.id).await
}
