use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    Behavioral,
    Technical,
    Case,
    SystemDesign,
    Coding,
    General,
}

impl InterviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewType::Behavioral => "behavioral",
            InterviewType::Technical => "technical",
            InterviewType::Case => "case",
            InterviewType::SystemDesign => "system_design",
            InterviewType::Coding => "coding",
            InterviewType::General => "general",
        }
    }

    /// Human-readable form used inside prompts ("system design").
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }

    pub fn is_behavioral(&self) -> bool {
        matches!(self, InterviewType::Behavioral)
    }
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewType {
    type Err = String;

    /// Case-insensitive; `"Behavioral"` and `"behavioral"` are the same type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "behavioral" => Ok(InterviewType::Behavioral),
            "technical" => Ok(InterviewType::Technical),
            "case" => Ok(InterviewType::Case),
            "system_design" => Ok(InterviewType::SystemDesign),
            "coding" => Ok(InterviewType::Coding),
            "general" => Ok(InterviewType::General),
            other => Err(format!("unknown interview type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Lifecycle: active <-> paused, and either may end as completed or cancelled.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Active, Paused)
                | (Paused, Active)
                | (Active, Cancelled)
                | (Paused, Cancelled)
                | (Active, Completed)
                | (Paused, Completed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// One interview attempt: configuration, lifecycle, workflow cursor, scores and feedback.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub interview_type: String,
    pub status: String,
    pub role_context: Option<String>,
    pub company_context: Option<String>,
    pub difficulty_level: Option<String>,
    pub custom_instructions: Option<String>,
    pub livekit_room_id: Option<String>,
    pub duration_seconds: Option<i32>,

    // Workflow cursor
    pub question_count: i32,
    pub max_questions: i32,
    pub workflow_node: String,
    #[serde(skip_serializing)]
    pub user_context: String,
    pub analysis: Value,

    pub overall_score: Option<f64>,
    pub verbal_communication_score: Option<f64>,
    pub clarity_score: Option<f64>,
    pub confidence_score: Option<f64>,
    pub pace_score: Option<f64>,
    pub technical_accuracy_score: Option<f64>,
    pub problem_solving_score: Option<f64>,
    pub structure_score: Option<f64>,
    pub relevance_score: Option<f64>,
    pub star_method_score: Option<f64>,
    pub leadership_score: Option<f64>,
    pub teamwork_score: Option<f64>,
    pub eye_contact_score: Option<f64>,
    pub body_language_score: Option<f64>,
    pub engagement_score: Option<f64>,

    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
    pub detailed_feedback: Option<String>,
    pub recommended_topics: Vec<String>,
    pub next_steps: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewSessionRow {
    /// Unknown stored values fall back to `General` so old rows stay readable.
    pub fn kind(&self) -> InterviewType {
        self.interview_type.parse().unwrap_or(InterviewType::General)
    }

    pub fn lifecycle(&self) -> Option<SessionStatus> {
        self.status.parse().ok()
    }
}

#[cfg(test)]
pub(crate) fn session_fixture(user_id: Uuid, interview_type: InterviewType) -> InterviewSessionRow {
    let now = Utc::now();
    InterviewSessionRow {
        id: Uuid::new_v4(),
        user_id,
        title: "Mock interview".to_string(),
        interview_type: interview_type.as_str().to_string(),
        status: SessionStatus::Active.as_str().to_string(),
        role_context: None,
        company_context: None,
        difficulty_level: Some("medium".to_string()),
        custom_instructions: None,
        livekit_room_id: None,
        duration_seconds: None,
        question_count: 0,
        max_questions: 5,
        workflow_node: "preparing_context".to_string(),
        user_context: String::new(),
        analysis: Value::Object(Default::default()),
        overall_score: None,
        verbal_communication_score: None,
        clarity_score: None,
        confidence_score: None,
        pace_score: None,
        technical_accuracy_score: None,
        problem_solving_score: None,
        structure_score: None,
        relevance_score: None,
        star_method_score: None,
        leadership_score: None,
        teamwork_score: None,
        eye_contact_score: None,
        body_language_score: None,
        engagement_score: None,
        strengths: vec![],
        weaknesses: vec![],
        improvements: vec![],
        detailed_feedback: None,
        recommended_topics: vec![],
        next_steps: vec![],
        started_at: now,
        completed_at: None,
        assessed_at: None,
        created_at: now,
        updated_at: now,
    }
}
