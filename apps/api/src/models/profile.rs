use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Background the interviewer personalizes against. One per user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_role: Option<String>,
    pub current_company: Option<String>,
    pub years_of_experience: Option<i32>,
    pub target_role: Option<String>,
    pub target_companies: Vec<String>,
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub industries: Vec<String>,
    pub education: Option<Value>,
    pub certifications: Option<Value>,
    pub interview_types: Vec<String>,
    pub difficulty_preference: Option<String>,
    pub focus_areas: Vec<String>,
    #[serde(skip_serializing)]
    pub resume_text: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfileRow {
    /// Renders the profile as one natural-language paragraph, or "" if nothing is set.
    pub fn to_context_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        match (non_blank(&self.current_role), non_blank(&self.current_company)) {
            (Some(role), Some(company)) => {
                parts.push(format!("Currently working as {role} at {company}"))
            }
            (Some(role), None) => parts.push(format!("Currently working as {role}")),
            _ => {}
        }
        if let Some(years) = self.years_of_experience.filter(|y| *y > 0) {
            parts.push(format!("with {years} years of experience"));
        }
        if let Some(target) = non_blank(&self.target_role) {
            parts.push(format!("Preparing for {target} interviews"));
        }
        if !self.technical_skills.is_empty() {
            parts.push(format!(
                "Technical skills: {}",
                self.technical_skills.join(", ")
            ));
        }
        if !self.focus_areas.is_empty() {
            parts.push(format!("Focus areas: {}", self.focus_areas.join(", ")));
        }
        if let Some(bio) = non_blank(&self.bio) {
            parts.push(format!("Background: {bio}"));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!("{}.", parts.join(". "))
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
pub(crate) fn profile_fixture(user_id: Uuid) -> UserProfileRow {
    let now = Utc::now();
    UserProfileRow {
        id: Uuid::new_v4(),
        user_id,
        current_role: None,
        current_company: None,
        years_of_experience: None,
        target_role: None,
        target_companies: vec![],
        technical_skills: vec![],
        soft_skills: vec![],
        industries: vec![],
        education: None,
        certifications: None,
        interview_types: vec![],
        difficulty_preference: None,
        focus_areas: vec![],
        resume_text: None,
        bio: None,
        created_at: now,
        updated_at: now,
    }
}
