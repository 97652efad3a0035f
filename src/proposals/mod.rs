//! Proposals — AI-suggested mutations awaiting a human verdict.
//!
//! A tool invocation from the model becomes a `Proposal` by merging its
//! arguments onto the current record state. Merge rule: extend, don't
//! replace — a stored field is only overwritten when the model explicitly
//! supplied a non-empty value; omitted fields keep the stored value.
//!
//! Proposals are ephemeral: only handled-set membership is persisted, so
//! `open_proposals` is a pure function of the transcript plus the handled
//! set and re-rendering after a reload never re-surfaces a settled call.

pub mod mediator;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::domain::DomainStore;
use crate::errors::AppError;
use crate::intake::transcript;
use crate::llm_client::tools;
use crate::models::chat::ToolInvocation;
use crate::models::session::IntakeSessionRow;

// ────────────────────────────────────────────────────────────────────────────
// Proposal variants
// ────────────────────────────────────────────────────────────────────────────

/// Post-merge enrichment of an experience. Fields hold the value that would
/// be stored on acceptance; `None` means nothing stored and nothing proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceUpdateProposal {
    pub experience_id: Uuid,
    pub company_overview: Option<String>,
    pub role_overview: Option<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementUpdateProposal {
    pub achievement_id: Uuid,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementAddProposal {
    pub experience_id: Uuid,
    pub title: String,
    pub content: String,
    /// `None` appends after the experience's existing achievements.
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftExperience {
    pub experience_id: Uuid,
    pub title: String,
    pub points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeDraftProposal {
    pub title: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub experiences: Vec<DraftExperience>,
    #[serde(default)]
    pub education_ids: Vec<Uuid>,
    #[serde(default)]
    pub certification_ids: Vec<Uuid>,
}

/// The closed set of proposal kinds. Dispatch is an exhaustive match —
/// never a string-keyed lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Proposal {
    ExperienceUpdate(ExperienceUpdateProposal),
    AchievementUpdate(AchievementUpdateProposal),
    AchievementAdd(AchievementAddProposal),
    ResumeDraft(ResumeDraftProposal),
}

/// A rendered, not-yet-handled proposal surfaced for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenProposal {
    pub call_id: String,
    pub proposal: Proposal,
}

// ────────────────────────────────────────────────────────────────────────────
// Argument shapes as the model sends them
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ExperienceUpdateArgs {
    experience_id: Uuid,
    company_overview: Option<String>,
    role_overview: Option<String>,
    skills: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AchievementUpdateArgs {
    achievement_id: Uuid,
    title: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AchievementAddArgs {
    experience_id: Uuid,
    title: String,
    content: String,
    order: Option<i64>,
}

/// Treats empty and whitespace-only strings as "not supplied".
fn supplied(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn merge_text(current: Option<String>, proposed: Option<String>) -> Option<String> {
    supplied(proposed).or(current)
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

impl Proposal {
    /// Renders a tool invocation into a reviewable proposal, merging the
    /// model's arguments onto the current record state. `Validation` on an
    /// unknown tool name or malformed arguments.
    pub async fn from_invocation(
        domain: &dyn DomainStore,
        invocation: &ToolInvocation,
    ) -> Result<Proposal, AppError> {
        match invocation.name.as_str() {
            tools::UPDATE_EXPERIENCE => {
                let args: ExperienceUpdateArgs = parse_args(invocation)?;
                let current = domain.get_experience(args.experience_id).await?;
                let skills = match args.skills.filter(|s| !s.is_empty()) {
                    Some(proposed) => {
                        // Extend: keep stored skills, append new ones in order.
                        let mut merged = current.skills.clone();
                        for skill in proposed {
                            if !merged.iter().any(|s| s.eq_ignore_ascii_case(&skill)) {
                                merged.push(skill);
                            }
                        }
                        merged
                    }
                    None => current.skills.clone(),
                };
                Ok(Proposal::ExperienceUpdate(ExperienceUpdateProposal {
                    experience_id: args.experience_id,
                    company_overview: merge_text(
                        current.company_overview,
                        args.company_overview,
                    ),
                    role_overview: merge_text(current.role_overview, args.role_overview),
                    skills,
                }))
            }
            tools::UPDATE_ACHIEVEMENT => {
                let args: AchievementUpdateArgs = parse_args(invocation)?;
                let current = domain.get_achievement(args.achievement_id).await?;
                Ok(Proposal::AchievementUpdate(AchievementUpdateProposal {
                    achievement_id: args.achievement_id,
                    title: supplied(args.title).unwrap_or(current.title),
                    content: supplied(args.content).unwrap_or(current.content),
                }))
            }
            tools::ADD_ACHIEVEMENT => {
                let args: AchievementAddArgs = parse_args(invocation)?;
                if args.title.trim().is_empty() || args.content.trim().is_empty() {
                    return Err(AppError::Validation(
                        "Achievement title and content must not be empty".to_string(),
                    ));
                }
                // Validate the experience exists before surfacing the card.
                domain.get_experience(args.experience_id).await?;
                Ok(Proposal::AchievementAdd(AchievementAddProposal {
                    experience_id: args.experience_id,
                    title: args.title,
                    content: args.content,
                    order: args.order,
                }))
            }
            tools::DRAFT_RESUME => {
                let draft: ResumeDraftProposal = parse_args(invocation)?;
                if draft.experiences.is_empty() {
                    return Err(AppError::Validation(
                        "A resume draft needs at least one experience".to_string(),
                    ));
                }
                Ok(Proposal::ResumeDraft(draft))
            }
            other => Err(AppError::Validation(format!("Unknown tool name: {other}"))),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    invocation: &ToolInvocation,
) -> Result<T, AppError> {
    serde_json::from_value(invocation.arguments.clone()).map_err(|e| {
        AppError::Validation(format!(
            "Malformed arguments for {}: {e}",
            invocation.name
        ))
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Open-proposal scan
// ────────────────────────────────────────────────────────────────────────────

/// Re-renders every un-handled tool invocation from a step's transcript.
/// Pure with respect to its inputs: transcript + handled set.
pub async fn open_proposals(
    pool: &SqlitePool,
    domain: &dyn DomainStore,
    session: &IntakeSessionRow,
    step: i64,
) -> Result<Vec<OpenProposal>, AppError> {
    let messages = transcript::get_step_messages(pool, session, step).await?;
    let handled = mediator::load_handled_set(pool, session.id).await?;

    let mut open = Vec::new();
    for message in &messages {
        for invocation in &message.tool_calls {
            if handled.contains(&invocation.call_id) {
                continue;
            }
            match Proposal::from_invocation(domain, invocation).await {
                Ok(proposal) => open.push(OpenProposal {
                    call_id: invocation.call_id.clone(),
                    proposal,
                }),
                // A malformed or stale invocation must not block replay of
                // the rest of the transcript.
                Err(AppError::Validation(reason)) | Err(AppError::NotFound(reason)) => {
                    warn!(
                        "Skipping un-renderable proposal {}: {reason}",
                        invocation.call_id
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(open)
}
