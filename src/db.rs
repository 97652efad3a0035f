use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

/// Schema owned by this crate. Domain entities (users, experiences,
/// achievements, education, certifications) live in the consumed store and
/// are deliberately absent here.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS intake_sessions (
        id TEXT PRIMARY KEY,
        job_id TEXT NOT NULL UNIQUE,
        current_step INTEGER NOT NULL DEFAULT 1,
        step1_completed INTEGER NOT NULL DEFAULT 0,
        step2_completed INTEGER NOT NULL DEFAULT 0,
        step3_completed INTEGER NOT NULL DEFAULT 0,
        gap_analysis TEXT,
        stakeholder_analysis TEXT,
        conversation_summary TEXT,
        completed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_batches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        step INTEGER NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_batches_session_step
        ON chat_batches (session_id, step, id)",
    "CREATE TABLE IF NOT EXISTS resume_versions (
        id TEXT PRIMARY KEY,
        job_id TEXT NOT NULL,
        version_index INTEGER NOT NULL,
        parent_version_id TEXT,
        event_type TEXT NOT NULL,
        template_name TEXT NOT NULL,
        resume_content TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (job_id, version_index)
    )",
    "CREATE TABLE IF NOT EXISTS canonical_resumes (
        job_id TEXT PRIMARY KEY,
        template_name TEXT NOT NULL,
        resume_content TEXT NOT NULL,
        pinned_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS handled_proposals (
        session_id TEXT NOT NULL,
        call_id TEXT NOT NULL,
        verdict TEXT NOT NULL,
        handled_at TEXT NOT NULL,
        PRIMARY KEY (session_id, call_id)
    )",
];

/// Creates a SQLite connection pool and applies the schema.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Connecting to SQLite at {database_url}");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    init_schema(&pool).await?;

    info!("SQLite connection pool established");
    Ok(pool)
}

/// Applies the embedded schema. Idempotent.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

/// In-memory pool for tests. A single connection keeps every statement on
/// the same `:memory:` database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_schema(&pool).await.expect("schema init");
    pool
}
