//! The structured resume document — the one payload this crate serializes,
//! hashes and stores. Field order is fixed so a document round-trips
//! byte-for-byte through serialize → store → reload.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity block at the top of every resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBlock {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    /// Id of the backing experience record in the domain store.
    pub experience_id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub education_id: Uuid,
    pub institution: String,
    pub degree: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationEntry {
    pub certification_id: Uuid,
    pub name: String,
    pub issuer: Option<String>,
    pub issued_on: Option<String>,
}

/// Full structured resume snapshot. Order of every list is significant and
/// preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeDocument {
    pub identity: IdentityBlock,
    pub summary: String,
    pub experiences: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub certifications: Vec<CertificationEntry>,
    pub skills: Vec<String>,
}

impl ResumeDocument {
    /// Canonical serialized form, stored verbatim in `resume_content`.
    pub fn to_stored_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_stored_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
