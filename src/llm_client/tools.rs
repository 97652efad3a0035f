//! The closed set of tool schemas published to the model.
//!
//! Dispatch on the Rust side is an exhaustive match over `Proposal` — these
//! schemas are the only names the model can emit, and `proposals` rejects
//! anything outside the set.

use serde::Serialize;
use serde_json::json;

use crate::models::session::IntakeStep;

#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
}

pub const UPDATE_EXPERIENCE: &str = "update_experience";
pub const UPDATE_ACHIEVEMENT: &str = "update_achievement";
pub const ADD_ACHIEVEMENT: &str = "add_achievement";
pub const DRAFT_RESUME: &str = "draft_resume";

pub fn update_experience_schema() -> ToolSchema {
    ToolSchema {
        name: UPDATE_EXPERIENCE,
        description: "Propose enriched overview or skills for an existing experience. \
                      Omit any field you do not want to change.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "experience_id": {"type": "string", "format": "uuid"},
                "company_overview": {"type": "string"},
                "role_overview": {"type": "string"},
                "skills": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["experience_id"]
        }),
    }
}

pub fn update_achievement_schema() -> ToolSchema {
    ToolSchema {
        name: UPDATE_ACHIEVEMENT,
        description: "Propose a rewrite of an existing achievement's title and content.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "achievement_id": {"type": "string", "format": "uuid"},
                "title": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["achievement_id", "title", "content"]
        }),
    }
}

pub fn add_achievement_schema() -> ToolSchema {
    ToolSchema {
        name: ADD_ACHIEVEMENT,
        description: "Propose a new achievement under an experience.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "experience_id": {"type": "string", "format": "uuid"},
                "title": {"type": "string"},
                "content": {"type": "string"},
                "order": {"type": "integer"}
            },
            "required": ["experience_id", "title", "content"]
        }),
    }
}

pub fn draft_resume_schema() -> ToolSchema {
    ToolSchema {
        name: DRAFT_RESUME,
        description: "Propose a full job-specific resume draft.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "summary": {"type": "string"},
                "skills": {"type": "array", "items": {"type": "string"}},
                "experiences": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "experience_id": {"type": "string", "format": "uuid"},
                            "title": {"type": "string"},
                            "points": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["experience_id", "title", "points"]
                    }
                },
                "education_ids": {"type": "array", "items": {"type": "string"}},
                "certification_ids": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["title", "summary", "skills", "experiences"]
        }),
    }
}

/// Tools available to the model at a given intake step. Step 2 is the
/// interview (record enrichment only); step 3 adds resume drafting. Step 1
/// has no chat and therefore no tools.
pub fn step_tools(step: IntakeStep) -> Vec<ToolSchema> {
    match step {
        IntakeStep::Step1 => Vec::new(),
        IntakeStep::Step2 => vec![
            update_experience_schema(),
            update_achievement_schema(),
            add_achievement_schema(),
        ],
        IntakeStep::Step3 => vec![
            update_experience_schema(),
            update_achievement_schema(),
            add_achievement_schema(),
            draft_resume_schema(),
        ],
    }
}
