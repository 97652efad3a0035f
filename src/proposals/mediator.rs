//! Proposal mediator — settles proposals with a human verdict.
//!
//! Acceptance is one unit of work: the handled-set mark, the synthetic
//! verdict message and (for drafts) the version insert share a single
//! transaction, and the domain mutation is awaited inside it. A mutation
//! failure rolls the whole unit back, so a call never becomes "handled"
//! without its effect. Either way a settled call id is never re-applied.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::domain::{DomainStore, ExperiencePatch, NewAchievement};
use crate::errors::AppError;
use crate::intake::transcript::append_batch_tx;
use crate::models::chat::ChatMessage;
use crate::models::document::{
    CertificationEntry, EducationEntry, ExperienceEntry, IdentityBlock, ResumeDocument,
};
use crate::models::version::{ResumeVersionRow, VersionEventType};
use crate::proposals::{Proposal, ResumeDraftProposal};
use crate::state::SessionContext;
use crate::versions::{create_version_tx, ParentPolicy};

/// What `accept` did. `applied` is false when the call id was already
/// settled (idempotent no-op).
#[derive(Debug)]
pub struct AcceptOutcome {
    pub applied: bool,
    pub version: Option<ResumeVersionRow>,
}

pub(crate) async fn load_handled_set(
    pool: &SqlitePool,
    session_id: Uuid,
) -> Result<HashSet<String>, AppError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT call_id FROM handled_proposals WHERE session_id = ?1")
            .bind(session_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

/// Accepts a proposal, applying the (possibly user-edited) payload.
///
/// Retry note: if the external store applies a mutation but the commit here
/// fails, the call stays un-handled and a retry re-applies it. That is
/// harmless for the update variants and duplicates an `AchievementAdd`; the
/// window is a single commit and accepted for the single-user target.
pub async fn accept(
    pool: &SqlitePool,
    domain: &dyn DomainStore,
    ctx: &mut SessionContext,
    step: i64,
    call_id: &str,
    proposal: Proposal,
    template_name: &str,
) -> Result<AcceptOutcome, AppError> {
    if ctx.is_handled(call_id) {
        return Ok(AcceptOutcome {
            applied: false,
            version: None,
        });
    }

    let mut tx = pool.begin().await?;

    // The persisted set is authoritative; a stale context must not re-apply.
    let marked = sqlx::query(
        "INSERT OR IGNORE INTO handled_proposals (session_id, call_id, verdict, handled_at)
         VALUES (?1, ?2, 'accepted', ?3)",
    )
    .bind(ctx.session_id)
    .bind(call_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    if marked.rows_affected() == 0 {
        ctx.mark_handled(call_id);
        return Ok(AcceptOutcome {
            applied: false,
            version: None,
        });
    }

    let ack = ChatMessage::verdict(call_id, ack_text(&proposal), "accepted");
    append_batch_tx(&mut tx, ctx.session_id, step, &[ack]).await?;

    let version = match proposal {
        Proposal::ExperienceUpdate(p) => {
            domain
                .update_experience(
                    p.experience_id,
                    ExperiencePatch {
                        company_overview: p.company_overview,
                        role_overview: p.role_overview,
                        skills: Some(p.skills),
                    },
                )
                .await?;
            None
        }
        Proposal::AchievementUpdate(p) => {
            domain
                .update_achievement(p.achievement_id, p.title, p.content)
                .await?;
            None
        }
        Proposal::AchievementAdd(p) => {
            domain
                .add_achievement(NewAchievement {
                    experience_id: p.experience_id,
                    title: p.title,
                    content: p.content,
                    order: p.order,
                })
                .await?;
            None
        }
        Proposal::ResumeDraft(draft) => {
            let document = compose_document(domain, &draft).await?;
            let row = create_version_tx(
                &mut tx,
                ctx.job_id,
                &document,
                template_name,
                VersionEventType::Generate,
                ParentPolicy::LatestHead,
                "assistant",
            )
            .await?;
            Some(row)
        }
    };

    tx.commit().await?;
    ctx.mark_handled(call_id);

    info!(
        "Accepted proposal {call_id} for session {} (version: {:?})",
        ctx.session_id,
        version.as_ref().map(|v| v.version_index)
    );

    Ok(AcceptOutcome {
        applied: true,
        version,
    })
}

/// Rejects a proposal: marks it handled and appends a synthetic rejection
/// message. No domain mutation. Returns false if already settled.
pub async fn reject(
    pool: &SqlitePool,
    ctx: &mut SessionContext,
    step: i64,
    call_id: &str,
) -> Result<bool, AppError> {
    if ctx.is_handled(call_id) {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    let marked = sqlx::query(
        "INSERT OR IGNORE INTO handled_proposals (session_id, call_id, verdict, handled_at)
         VALUES (?1, ?2, 'rejected', ?3)",
    )
    .bind(ctx.session_id)
    .bind(call_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    if marked.rows_affected() == 0 {
        ctx.mark_handled(call_id);
        return Ok(false);
    }

    let note = ChatMessage::verdict(call_id, "I'd rather not apply this suggestion.", "rejected");
    append_batch_tx(&mut tx, ctx.session_id, step, &[note]).await?;

    tx.commit().await?;
    ctx.mark_handled(call_id);

    info!("Rejected proposal {call_id} for session {}", ctx.session_id);
    Ok(true)
}

fn ack_text(proposal: &Proposal) -> &'static str {
    match proposal {
        Proposal::ExperienceUpdate(_) => "Applied the suggested experience update.",
        Proposal::AchievementUpdate(_) => "Applied the suggested achievement rewrite.",
        Proposal::AchievementAdd(_) => "Added the suggested achievement.",
        Proposal::ResumeDraft(_) => "Accepted this resume draft.",
    }
}

/// Resolves a draft into the full structured document: identity from the
/// user profile, company/location/dates from the backing experience records,
/// education and certifications resolved by id.
pub async fn compose_document(
    domain: &dyn DomainStore,
    draft: &ResumeDraftProposal,
) -> Result<ResumeDocument, AppError> {
    let user = domain.get_user().await?;

    let mut experiences = Vec::with_capacity(draft.experiences.len());
    for entry in &draft.experiences {
        let record = domain.get_experience(entry.experience_id).await?;
        experiences.push(ExperienceEntry {
            experience_id: entry.experience_id,
            title: entry.title.clone(),
            company: record.company,
            location: record.location,
            start_date: record.start_date,
            end_date: record.end_date,
            bullets: entry.points.clone(),
        });
    }

    let mut education = Vec::with_capacity(draft.education_ids.len());
    for id in &draft.education_ids {
        let record = domain.get_education(*id).await?;
        education.push(EducationEntry {
            education_id: *id,
            institution: record.institution,
            degree: record.degree,
            start_date: record.start_date,
            end_date: record.end_date,
        });
    }

    let mut certifications = Vec::with_capacity(draft.certification_ids.len());
    for id in &draft.certification_ids {
        let record = domain.get_certification(*id).await?;
        certifications.push(CertificationEntry {
            certification_id: *id,
            name: record.name,
            issuer: record.issuer,
            issued_on: record.issued_on,
        });
    }

    Ok(ResumeDocument {
        identity: IdentityBlock {
            name: user.name,
            title: draft.title.clone(),
            email: user.email,
            phone: user.phone,
            location: user.location,
            links: user.links,
        },
        summary: draft.summary.clone(),
        experiences,
        education,
        certifications,
        skills: draft.skills.clone(),
    })
}
