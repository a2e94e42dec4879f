//! User profile: the background the Context Provider indexes.
//! Every write re-indexes the caller's corpus.

pub mod handlers;
pub mod repository;

use serde::Deserialize;
use serde_json::Value;

/// Body of both create and partial update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileInput {
    pub current_role: Option<String>,
    pub current_company: Option<String>,
    pub years_of_experience: Option<i32>,
    pub target_role: Option<String>,
    pub target_companies: Option<Vec<String>>,
    pub technical_skills: Option<Vec<String>>,
    pub soft_skills: Option<Vec<String>>,
    pub industries: Option<Vec<String>>,
    pub education: Option<Value>,
    pub certifications: Option<Value>,
    pub interview_types: Option<Vec<String>>,
    pub difficulty_preference: Option<String>,
    pub focus_areas: Option<Vec<String>>,
    pub resume_text: Option<String>,
    pub bio: Option<String>,
}

impl ProfileInput {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(years) = self.years_of_experience {
            if !(0..=80).contains(&years) {
                return Err("years_of_experience must be between 0 and 80".to_string());
            }
        }
        for value in [&self.education, &self.certifications].into_iter().flatten() {
            if !value.is_array() {
                return Err("education and certifications must be lists".to_string());
            }
        }
        if let Some(types) = &self.interview_types {
            if let Some(bad) = types
                .iter()
                .find(|t| t.parse::<crate::models::session::InterviewType>().is_err())
            {
                return Err(format!("unknown interview type '{bad}'"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_out_of_range_experience() {
        let input = ProfileInput {
            years_of_experience: Some(-1),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_interview_type() {
        let input = ProfileInput {
            interview_types: Some(vec!["behavioral".to_string(), "trivia".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            input.validate().unwrap_err(),
            "unknown interview type 'trivia'"
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let parsed: Result<ProfileInput, _> =
            serde_json::from_str(r#"{"current_role": "SRE", "salary": 1}"#);
        assert!(parsed.is_err());
    }
}
