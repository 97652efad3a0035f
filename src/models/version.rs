use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::document::ResumeDocument;

/// Why a version was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionEventType {
    /// Created from an accepted AI draft proposal.
    Generate,
    /// Created by an explicit user save.
    Save,
}

impl VersionEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionEventType::Generate => "generate",
            VersionEventType::Save => "save",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "generate" => Some(VersionEventType::Generate),
            "save" => Some(VersionEventType::Save),
            _ => None,
        }
    }
}

/// One immutable resume snapshot. Append-only: rows are never updated or
/// deleted, and `version_index` values form exactly 1..N per job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeVersionRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub version_index: i64,
    pub parent_version_id: Option<Uuid>,
    pub event_type: String,
    pub template_name: String,
    /// Serialized `ResumeDocument`, stored verbatim.
    pub resume_content: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ResumeVersionRow {
    pub fn event(&self) -> Option<VersionEventType> {
        VersionEventType::parse(&self.event_type)
    }

    pub fn document(&self) -> Result<ResumeDocument, serde_json::Error> {
        ResumeDocument::from_stored_json(&self.resume_content)
    }
}

/// The single pinned snapshot per job, decoupled from the version graph:
/// content is copied at pin time and unpinning just deletes the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CanonicalResumeRow {
    pub job_id: Uuid,
    pub template_name: String,
    pub resume_content: String,
    pub pinned_at: DateTime<Utc>,
}

impl CanonicalResumeRow {
    pub fn document(&self) -> Result<ResumeDocument, serde_json::Error> {
        ResumeDocument::from_stored_json(&self.resume_content)
    }
}
