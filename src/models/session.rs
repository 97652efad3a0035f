use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One intake session per job. `current_step` only moves forward while
/// `completed_at` is unset; once set the session is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IntakeSessionRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub current_step: i64,
    pub step1_completed: bool,
    pub step2_completed: bool,
    pub step3_completed: bool,
    pub gap_analysis: Option<String>,
    pub stakeholder_analysis: Option<String>,
    pub conversation_summary: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntakeSessionRow {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// The three intake steps. Step 1 analyzes the job posting, steps 2–3 are
/// conversational (interview, then drafting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeStep {
    Step1,
    Step2,
    Step3,
}

impl IntakeStep {
    pub fn from_number(step: i64) -> Option<Self> {
        match step {
            1 => Some(IntakeStep::Step1),
            2 => Some(IntakeStep::Step2),
            3 => Some(IntakeStep::Step3),
            _ => None,
        }
    }

    pub fn number(self) -> i64 {
        match self {
            IntakeStep::Step1 => 1,
            IntakeStep::Step2 => 2,
            IntakeStep::Step3 => 3,
        }
    }

    /// Only the conversational steps carry a transcript.
    pub fn has_transcript(self) -> bool {
        matches!(self, IntakeStep::Step2 | IntakeStep::Step3)
    }
}
