//! Resume version store — append-only snapshots per job plus one decoupled
//! canonical pin.
//!
//! CRITICAL: version rows are never UPDATEd or DELETEd. `version_index` forms
//! exactly 1..N per job; the index is allocated inside a transaction and
//! backed by `UNIQUE(job_id, version_index)`, so a racing writer hits a
//! constraint error instead of silently duplicating an index.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::ResumeDocument;
use crate::models::version::{CanonicalResumeRow, ResumeVersionRow, VersionEventType};

/// How the parent of a new version is chosen. Always stated by the caller;
/// the resolved id is recorded on the row for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentPolicy {
    /// Use this exact version as the parent. Must belong to the same job.
    Explicit(Uuid),
    /// Use the job's current head version, or no parent for the first one.
    LatestHead,
}

/// Creates a new immutable version for `job_id` and returns the stored row.
pub async fn create_version(
    pool: &SqlitePool,
    job_id: Uuid,
    document: &ResumeDocument,
    template_name: &str,
    event_type: VersionEventType,
    parent: ParentPolicy,
    created_by: &str,
) -> Result<ResumeVersionRow, AppError> {
    let mut tx = pool.begin().await?;
    let row = create_version_tx(
        &mut tx,
        job_id,
        document,
        template_name,
        event_type,
        parent,
        created_by,
    )
    .await?;
    tx.commit().await?;
    Ok(row)
}

/// Transaction-scoped variant, used by the proposal mediator so the version
/// insert shares the acceptance unit of work.
pub async fn create_version_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    job_id: Uuid,
    document: &ResumeDocument,
    template_name: &str,
    event_type: VersionEventType,
    parent: ParentPolicy,
    created_by: &str,
) -> Result<ResumeVersionRow, AppError> {
    let content = document.to_stored_json()?;

    let head: Option<(Uuid, i64)> = sqlx::query_as(
        "SELECT id, version_index FROM resume_versions
         WHERE job_id = ?1 ORDER BY version_index DESC LIMIT 1",
    )
    .bind(job_id)
    .fetch_optional(&mut **tx)
    .await?;

    let parent_version_id = match parent {
        ParentPolicy::Explicit(id) => {
            let owner: Option<(Uuid,)> =
                sqlx::query_as("SELECT job_id FROM resume_versions WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await?;
            match owner {
                Some((owner_job,)) if owner_job == job_id => Some(id),
                Some(_) => {
                    return Err(AppError::InvalidReference(format!(
                        "Version {id} does not belong to job {job_id}"
                    )))
                }
                None => {
                    return Err(AppError::InvalidReference(format!(
                        "Parent version {id} does not exist"
                    )))
                }
            }
        }
        ParentPolicy::LatestHead => head.map(|(id, _)| id),
    };

    let version_index = head.map(|(_, idx)| idx + 1).unwrap_or(1);

    let row = ResumeVersionRow {
        id: Uuid::new_v4(),
        job_id,
        version_index,
        parent_version_id,
        event_type: event_type.as_str().to_string(),
        template_name: template_name.to_string(),
        resume_content: content,
        created_by: created_by.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO resume_versions
            (id, job_id, version_index, parent_version_id, event_type,
             template_name, resume_content, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(row.id)
    .bind(row.job_id)
    .bind(row.version_index)
    .bind(row.parent_version_id)
    .bind(&row.event_type)
    .bind(&row.template_name)
    .bind(&row.resume_content)
    .bind(&row.created_by)
    .bind(row.created_at)
    .execute(&mut **tx)
    .await?;

    info!(
        "Created version {} (index {}) for job {} via {:?}",
        row.id, row.version_index, job_id, event_type
    );

    Ok(row)
}

/// All versions for a job, oldest first.
pub async fn list_versions(
    pool: &SqlitePool,
    job_id: Uuid,
) -> Result<Vec<ResumeVersionRow>, AppError> {
    Ok(sqlx::query_as::<_, ResumeVersionRow>(
        "SELECT * FROM resume_versions WHERE job_id = ?1 ORDER BY version_index ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?)
}

pub async fn get_version(pool: &SqlitePool, id: Uuid) -> Result<ResumeVersionRow, AppError> {
    sqlx::query_as::<_, ResumeVersionRow>("SELECT * FROM resume_versions WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Version {id} not found")))
}

/// Pins a version as the job's canonical resume, copying its content.
/// Overwrites any existing pin.
pub async fn pin_canonical(
    pool: &SqlitePool,
    job_id: Uuid,
    version_id: Uuid,
) -> Result<(), AppError> {
    let version = get_version(pool, version_id).await?;
    if version.job_id != job_id {
        return Err(AppError::InvalidReference(format!(
            "Version {version_id} does not belong to job {job_id}"
        )));
    }

    sqlx::query(
        "INSERT INTO canonical_resumes (job_id, template_name, resume_content, pinned_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (job_id) DO UPDATE SET
            template_name = excluded.template_name,
            resume_content = excluded.resume_content,
            pinned_at = excluded.pinned_at",
    )
    .bind(job_id)
    .bind(&version.template_name)
    .bind(&version.resume_content)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    info!("Pinned version {version_id} as canonical for job {job_id}");
    Ok(())
}

/// Removes the canonical pin. No error if none exists.
pub async fn unpin_canonical(pool: &SqlitePool, job_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM canonical_resumes WHERE job_id = ?1")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_canonical(
    pool: &SqlitePool,
    job_id: Uuid,
) -> Result<Option<CanonicalResumeRow>, AppError> {
    Ok(sqlx::query_as::<_, CanonicalResumeRow>(
        "SELECT * FROM canonical_resumes WHERE job_id = ?1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::document::{IdentityBlock, ResumeDocument};

    fn doc(summary: &str) -> ResumeDocument {
        ResumeDocument {
            identity: IdentityBlock {
                name: "Ada Lovelace".into(),
                title: "Engineer".into(),
                email: "ada@example.com".into(),
                phone: None,
                location: None,
                links: vec![],
            },
            summary: summary.into(),
            experiences: vec![],
            education: vec![],
            certifications: vec![],
            skills: vec!["Rust".into()],
        }
    }

    #[tokio::test]
    async fn test_version_indexes_are_contiguous_from_one() {
        let pool = test_pool().await;
        let job = Uuid::new_v4();

        for i in 0..5 {
            create_version(
                &pool,
                job,
                &doc(&format!("v{i}")),
                "classic",
                VersionEventType::Save,
                ParentPolicy::LatestHead,
                "user",
            )
            .await
            .unwrap();
        }

        let versions = list_versions(&pool, job).await.unwrap();
        let indexes: Vec<i64> = versions.iter().map(|v| v.version_index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_latest_head_parent_chains_versions() {
        let pool = test_pool().await;
        let job = Uuid::new_v4();

        let v1 = create_version(
            &pool,
            job,
            &doc("first"),
            "classic",
            VersionEventType::Generate,
            ParentPolicy::LatestHead,
            "assistant",
        )
        .await
        .unwrap();
        assert_eq!(v1.parent_version_id, None);

        let v2 = create_version(
            &pool,
            job,
            &doc("second"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::LatestHead,
            "user",
        )
        .await
        .unwrap();
        assert_eq!(v2.parent_version_id, Some(v1.id));
    }

    #[tokio::test]
    async fn test_explicit_parent_must_belong_to_job() {
        let pool = test_pool().await;
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();

        let v1 = create_version(
            &pool,
            job_a,
            &doc("a1"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::LatestHead,
            "user",
        )
        .await
        .unwrap();

        let err = create_version(
            &pool,
            job_b,
            &doc("b1"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::Explicit(v1.id),
            "user",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidReference(_)));

        // Branching off an older version of the same job is allowed.
        let _v2 = create_version(
            &pool,
            job_a,
            &doc("a2"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::LatestHead,
            "user",
        )
        .await
        .unwrap();
        let v3 = create_version(
            &pool,
            job_a,
            &doc("a3"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::Explicit(v1.id),
            "user",
        )
        .await
        .unwrap();
        assert_eq!(v3.parent_version_id, Some(v1.id));
        assert_eq!(v3.version_index, 3);
    }

    #[tokio::test]
    async fn test_pin_copies_content_and_unpin_clears() {
        let pool = test_pool().await;
        let job = Uuid::new_v4();

        let v1 = create_version(
            &pool,
            job,
            &doc("pinned content"),
            "modern",
            VersionEventType::Generate,
            ParentPolicy::LatestHead,
            "assistant",
        )
        .await
        .unwrap();

        pin_canonical(&pool, job, v1.id).await.unwrap();
        let canonical = get_canonical(&pool, job).await.unwrap().unwrap();
        assert_eq!(canonical.resume_content, v1.resume_content);
        assert_eq!(canonical.template_name, "modern");

        unpin_canonical(&pool, job).await.unwrap();
        assert!(get_canonical(&pool, job).await.unwrap().is_none());

        // Unpinning again is a no-op.
        unpin_canonical(&pool, job).await.unwrap();
    }

    #[tokio::test]
    async fn test_pin_rejects_other_jobs_version() {
        let pool = test_pool().await;
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();

        let v1 = create_version(
            &pool,
            job_a,
            &doc("a"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::LatestHead,
            "user",
        )
        .await
        .unwrap();

        let err = pin_canonical(&pool, job_b, v1.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn test_get_version_not_found() {
        let pool = test_pool().await;
        let err = get_version(&pool, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_repin_overwrites_previous_pin() {
        let pool = test_pool().await;
        let job = Uuid::new_v4();

        let v1 = create_version(
            &pool,
            job,
            &doc("one"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::LatestHead,
            "user",
        )
        .await
        .unwrap();
        let v2 = create_version(
            &pool,
            job,
            &doc("two"),
            "classic",
            VersionEventType::Save,
            ParentPolicy::LatestHead,
            "user",
        )
        .await
        .unwrap();

        pin_canonical(&pool, job, v1.id).await.unwrap();
        pin_canonical(&pool, job, v2.id).await.unwrap();

        let canonical = get_canonical(&pool, job).await.unwrap().unwrap();
        assert_eq!(canonical.resume_content, v2.resume_content);
    }
}
