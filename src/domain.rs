//! The consumed domain-entity store.
//!
//! This crate only calls the existing read/update contracts for users,
//! experiences, achievements, education and certifications; it does not own
//! or redefine their schema. Carried as `Arc<dyn DomainStore>` in `AppState`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub company_overview: Option<String>,
    pub role_overview: Option<String>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub experience_id: Uuid,
    pub title: String,
    pub content: String,
    pub order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub id: Uuid,
    pub institution: String,
    pub degree: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certification {
    pub id: Uuid,
    pub name: String,
    pub issuer: Option<String>,
    pub issued_on: Option<String>,
}

/// Field-level patch for an experience. `None` leaves the stored value
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperiencePatch {
    pub company_overview: Option<String>,
    pub role_overview: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// New achievement to attach to an experience. `order` of `None` appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAchievement {
    pub experience_id: Uuid,
    pub title: String,
    pub content: String,
    pub order: Option<i64>,
}

/// Read/update contracts of the external persistent store.
#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn get_user(&self) -> Result<UserProfile, AppError>;
    async fn get_experience(&self, id: Uuid) -> Result<Experience, AppError>;
    async fn get_achievement(&self, id: Uuid) -> Result<Achievement, AppError>;
    async fn get_education(&self, id: Uuid) -> Result<Education, AppError>;
    async fn get_certification(&self, id: Uuid) -> Result<Certification, AppError>;

    async fn update_experience(&self, id: Uuid, patch: ExperiencePatch) -> Result<(), AppError>;
    async fn update_achievement(
        &self,
        id: Uuid,
        title: String,
        content: String,
    ) -> Result<(), AppError>;
    async fn add_achievement(&self, achievement: NewAchievement) -> Result<Uuid, AppError>;
}

/// In-memory store shared by tests across the crate. Records every mutation
/// so tests can assert exactly what the core asked the domain layer to do.
#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedCall {
        UpdateExperience(Uuid, ExperiencePatchSnapshot),
        UpdateAchievement(Uuid, String, String),
        AddAchievement(Uuid, String, String, Option<i64>),
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct ExperiencePatchSnapshot {
        pub company_overview: Option<String>,
        pub role_overview: Option<String>,
        pub skills: Option<Vec<String>>,
    }

    #[derive(Default)]
    pub struct FakeDomainStore {
        pub experiences: Mutex<HashMap<Uuid, Experience>>,
        pub achievements: Mutex<HashMap<Uuid, Achievement>>,
        pub education: Mutex<HashMap<Uuid, Education>>,
        pub certifications: Mutex<HashMap<Uuid, Certification>>,
        pub calls: Mutex<Vec<RecordedCall>>,
        /// When set, every mutation fails. Used to exercise rollback paths.
        pub fail_mutations: AtomicBool,
    }

    impl FakeDomainStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_experience(&self, company: &str, role: &str, skills: &[&str]) -> Uuid {
            let id = Uuid::new_v4();
            self.experiences.lock().unwrap().insert(
                id,
                Experience {
                    id,
                    title: role.to_string(),
                    company: company.to_string(),
                    location: Some("Berlin".into()),
                    start_date: Some("2020-01".into()),
                    end_date: None,
                    company_overview: Some(format!("{company} overview")),
                    role_overview: Some(format!("{role} role")),
                    skills: skills.iter().map(|s| s.to_string()).collect(),
                },
            );
            id
        }

        pub fn seed_achievement(&self, experience_id: Uuid, title: &str, content: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.achievements.lock().unwrap().insert(
                id,
                Achievement {
                    id,
                    experience_id,
                    title: title.to_string(),
                    content: content.to_string(),
                    order: 0,
                },
            );
            id
        }

        pub fn seed_education(&self, institution: &str, degree: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.education.lock().unwrap().insert(
                id,
                Education {
                    id,
                    institution: institution.to_string(),
                    degree: degree.to_string(),
                    start_date: None,
                    end_date: Some("2014".into()),
                },
            );
            id
        }

        pub fn seed_certification(&self, name: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.certifications.lock().unwrap().insert(
                id,
                Certification {
                    id,
                    name: name.to_string(),
                    issuer: None,
                    issued_on: None,
                },
            );
            id
        }

        pub fn recorded(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        fn check_failure(&self) -> Result<(), AppError> {
            if self.fail_mutations.load(Ordering::SeqCst) {
                Err(AppError::Internal(anyhow::anyhow!("injected store failure")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DomainStore for FakeDomainStore {
        async fn get_user(&self) -> Result<UserProfile, AppError> {
            Ok(UserProfile {
                id: Uuid::nil(),
                name: "Ada Lovelace".into(),
                title: "Software Engineer".into(),
                email: "ada@example.com".into(),
                phone: None,
                location: Some("London".into()),
                links: vec![],
            })
        }

        async fn get_experience(&self, id: Uuid) -> Result<Experience, AppError> {
            self.experiences
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Experience {id} not found")))
        }

        async fn get_achievement(&self, id: Uuid) -> Result<Achievement, AppError> {
            self.achievements
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Achievement {id} not found")))
        }

        async fn get_education(&self, id: Uuid) -> Result<Education, AppError> {
            self.education
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Education {id} not found")))
        }

        async fn get_certification(&self, id: Uuid) -> Result<Certification, AppError> {
            self.certifications
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Certification {id} not found")))
        }

        async fn update_experience(
            &self,
            id: Uuid,
            patch: ExperiencePatch,
        ) -> Result<(), AppError> {
            self.check_failure()?;
            let mut experiences = self.experiences.lock().unwrap();
            let experience = experiences
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Experience {id} not found")))?;
            self.calls.lock().unwrap().push(RecordedCall::UpdateExperience(
                id,
                ExperiencePatchSnapshot {
                    company_overview: patch.company_overview.clone(),
                    role_overview: patch.role_overview.clone(),
                    skills: patch.skills.clone(),
                },
            ));
            if let Some(v) = patch.company_overview {
                experience.company_overview = Some(v);
            }
            if let Some(v) = patch.role_overview {
                experience.role_overview = Some(v);
            }
            if let Some(v) = patch.skills {
                experience.skills = v;
            }
            Ok(())
        }

        async fn update_achievement(
            &self,
            id: Uuid,
            title: String,
            content: String,
        ) -> Result<(), AppError> {
            self.check_failure()?;
            let mut achievements = self.achievements.lock().unwrap();
            let achievement = achievements
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("Achievement {id} not found")))?;
            self.calls.lock().unwrap().push(RecordedCall::UpdateAchievement(
                id,
                title.clone(),
                content.clone(),
            ));
            achievement.title = title;
            achievement.content = content;
            Ok(())
        }

        async fn add_achievement(&self, new: NewAchievement) -> Result<Uuid, AppError> {
            self.check_failure()?;
            let id = Uuid::new_v4();
            self.calls.lock().unwrap().push(RecordedCall::AddAchievement(
                new.experience_id,
                new.title.clone(),
                new.content.clone(),
                new.order,
            ));
            self.achievements.lock().unwrap().insert(
                id,
                Achievement {
                    id,
                    experience_id: new.experience_id,
                    title: new.title,
                    content: new.content,
                    order: new.order.unwrap_or(i64::MAX),
                },
            );
            Ok(id)
        }
    }
}
