use std::collections::HashSet;
use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::DomainStore;
use crate::errors::AppError;
use crate::llm_client::ChatModel;
use crate::preview::PreviewCache;

/// Shared application state handed to the thin request layer above this
/// crate. All collaborators sit behind trait objects so tests (and future
/// backends) can swap them.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub model: Arc<dyn ChatModel>,
    pub domain: Arc<dyn DomainStore>,
    pub previews: Arc<PreviewCache>,
}

/// Explicit per-session context: owns the in-memory handled-proposal set for
/// one intake session, loaded from and written through `handled_proposals`.
/// Passed alongside the session wherever proposals are settled — never a
/// global.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub job_id: Uuid,
    handled: HashSet<String>,
}

impl SessionContext {
    /// Loads the persisted handled set for a session. The session row is the
    /// authority on which job it belongs to: a `job_id` that does not match
    /// is an `InvalidReference`, so an accepted draft can never be versioned
    /// under the wrong job.
    pub async fn load(
        pool: &SqlitePool,
        session_id: Uuid,
        job_id: Uuid,
    ) -> Result<Self, AppError> {
        let owner: Option<(Uuid,)> =
            sqlx::query_as("SELECT job_id FROM intake_sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_optional(pool)
                .await?;
        match owner {
            None => {
                return Err(AppError::NotFound(format!(
                    "Session {session_id} not found"
                )))
            }
            Some((owner_job,)) if owner_job != job_id => {
                return Err(AppError::InvalidReference(format!(
                    "Session {session_id} belongs to job {owner_job}, not {job_id}"
                )))
            }
            Some(_) => {}
        }

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT call_id FROM handled_proposals WHERE session_id = ?1")
                .bind(session_id)
                .fetch_all(pool)
                .await?;
        Ok(SessionContext {
            session_id,
            job_id,
            handled: rows.into_iter().map(|(c,)| c).collect(),
        })
    }

    pub fn is_handled(&self, call_id: &str) -> bool {
        self.handled.contains(call_id)
    }

    pub(crate) fn mark_handled(&mut self, call_id: &str) {
        self.handled.insert(call_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::intake::session::create_session;

    #[tokio::test]
    async fn test_load_rejects_a_mismatched_job() {
        let pool = test_pool().await;
        let job = Uuid::new_v4();
        let session = create_session(&pool, job).await.unwrap();

        let err = SessionContext::load(&pool, session.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidReference(_)));

        let ctx = SessionContext::load(&pool, session.id, job).await.unwrap();
        assert_eq!(ctx.job_id, job);
    }

    #[tokio::test]
    async fn test_load_requires_an_existing_session() {
        let pool = test_pool().await;
        let err = SessionContext::load(&pool, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
