//! The working memory the interview workflow threads through its steps.
//!
//! Each workflow step takes an `InterviewRunState` by value and returns the
//! next one. The session row and its interactions are the durable projection;
//! `restore` rebuilds the run state from them between HTTP calls.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::interview::workflow::WorkflowError;
use crate::llm_client::{ChatMessage, ChatRole};
use crate::models::interaction::InteractionRow;
use crate::models::session::{InterviewSessionRow, InterviewType};

/// Position of the workflow cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNode {
    PreparingContext,
    ConductingInterview,
    AnalyzingResponse,
    CheckingCompletion,
    GeneratingFeedback,
    Done,
}

impl WorkflowNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowNode::PreparingContext => "preparing_context",
            WorkflowNode::ConductingInterview => "conducting_interview",
            WorkflowNode::AnalyzingResponse => "analyzing_response",
            WorkflowNode::CheckingCompletion => "checking_completion",
            WorkflowNode::GeneratingFeedback => "generating_feedback",
            WorkflowNode::Done => "done",
        }
    }
}

impl fmt::Display for WorkflowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowNode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparing_context" => Ok(WorkflowNode::PreparingContext),
            "conducting_interview" => Ok(WorkflowNode::ConductingInterview),
            "analyzing_response" => Ok(WorkflowNode::AnalyzingResponse),
            "checking_completion" => Ok(WorkflowNode::CheckingCompletion),
            "generating_feedback" => Ok(WorkflowNode::GeneratingFeedback),
            "done" => Ok(WorkflowNode::Done),
            other => Err(format!("unknown workflow node '{other}'")),
        }
    }
}

/// Status of the question loop, distinct from the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Initializing,
    Active,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Initializing => "initializing",
            RunStatus::Active => "active",
            RunStatus::Completed => "completed",
        }
    }

    fn for_cursor(node: WorkflowNode, question_count: u32, max_questions: u32) -> Self {
        match node {
            WorkflowNode::PreparingContext => RunStatus::Initializing,
            WorkflowNode::GeneratingFeedback | WorkflowNode::Done => RunStatus::Completed,
            _ if question_count >= max_questions => RunStatus::Completed,
            _ => RunStatus::Active,
        }
    }
}

/// Per-session interview configuration the interviewer sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionBrief {
    pub role_context: Option<String>,
    pub company_context: Option<String>,
    pub difficulty_level: Option<String>,
    pub custom_instructions: Option<String>,
}

/// Lightweight metrics for one candidate answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    pub response_length: usize,
    pub word_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl ResponseAnalysis {
    pub fn of(answer: &str) -> Self {
        Self {
            response_length: answer.chars().count(),
            word_count: answer.split_whitespace().count(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewRunState {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub interview_type: InterviewType,
    pub brief: SessionBrief,
    /// Personalized interviewer persona resolved in `preparing_context`.
    pub user_context: String,
    pub messages: Vec<ChatMessage>,
    pub question_count: u32,
    pub max_questions: u32,
    pub status: RunStatus,
    /// Keyed by the zero-based index of the question being answered.
    pub analysis: BTreeMap<u32, ResponseAnalysis>,
    pub node: WorkflowNode,
}

/// The columns of `interview_sessions` that move with the workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCursor {
    pub node: WorkflowNode,
    pub question_count: i32,
    pub user_context: String,
    pub analysis: Value,
}

impl InterviewRunState {
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.node == WorkflowNode::Done
    }

    pub fn cursor(&self) -> WorkflowCursor {
        WorkflowCursor {
            node: self.node,
            question_count: i32::try_from(self.question_count).unwrap_or(i32::MAX),
            user_context: self.user_context.clone(),
            analysis: serde_json::to_value(&self.analysis).unwrap_or(Value::Null),
        }
    }

    /// Rebuilds the run state from a session and its ordered interactions.
    ///
    /// Fails if the stored cursor is unreadable or the transcript has gaps,
    /// since question numbering would no longer line up with the history.
    pub fn restore(
        session: &InterviewSessionRow,
        interactions: &[InteractionRow],
    ) -> Result<Self, WorkflowError> {
        let node: WorkflowNode = session
            .workflow_node
            .parse()
            .map_err(WorkflowError::CorruptCursor)?;
        let question_count = u32::try_from(session.question_count)
            .map_err(|_| WorkflowError::CorruptCursor("negative question_count".to_string()))?;
        let max_questions = u32::try_from(session.max_questions)
            .map_err(|_| WorkflowError::CorruptCursor("negative max_questions".to_string()))?;

        let analysis: BTreeMap<u32, ResponseAnalysis> = match &session.analysis {
            Value::Null => BTreeMap::new(),
            value => serde_json::from_value(value.clone())
                .map_err(|e| WorkflowError::CorruptCursor(format!("analysis: {e}")))?,
        };

        if let Some((expected, row)) = interactions
            .iter()
            .enumerate()
            .find(|(i, row)| i32::try_from(*i).ok() != Some(row.seq))
        {
            return Err(WorkflowError::CorruptCursor(format!(
                "transcript gap: expected seq {expected}, found {}",
                row.seq
            )));
        }

        Ok(Self {
            user_id: session.user_id,
            session_id: session.id,
            interview_type: session.kind(),
            brief: SessionBrief {
                role_context: session.role_context.clone(),
                company_context: session.company_context.clone(),
                difficulty_level: session.difficulty_level.clone(),
                custom_instructions: session.custom_instructions.clone(),
            },
            user_context: session.user_context.clone(),
            messages: interactions
                .iter()
                .filter_map(InteractionRow::to_chat_message)
                .collect(),
            question_count,
            max_questions,
            status: RunStatus::for_cursor(node, question_count, max_questions),
            analysis,
            node,
        })
    }
}
