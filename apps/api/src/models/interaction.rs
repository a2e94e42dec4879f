use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::llm_client::{ChatMessage, ChatRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Assistant,
    User,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::Assistant => "assistant",
            MessageRole::User => "user",
            MessageRole::Tool => "tool",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(MessageRole::System),
            "assistant" => Ok(MessageRole::Assistant),
            "user" => Ok(MessageRole::User),
            "tool" => Ok(MessageRole::Tool),
            other => Err(format!("unknown message role '{other}'")),
        }
    }
}

impl From<ChatRole> for MessageRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => MessageRole::User,
            ChatRole::Assistant => MessageRole::Assistant,
        }
    }
}

/// One persisted conversational turn. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InteractionRow {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Position in the transcript, strictly increasing per session.
    pub seq: i32,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub response_time_seconds: Option<f64>,
    pub audio_duration_seconds: Option<f64>,
    pub audio_s3_key: Option<String>,
    pub transcript_confidence: Option<f64>,
    pub words_per_minute: Option<f64>,
    pub filler_word_count: Option<i32>,
    pub pause_count: Option<i32>,
    pub sentiment_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl InteractionRow {
    pub fn is_interviewer(&self) -> bool {
        self.role == MessageRole::Assistant.as_str()
    }

    /// The turn as the model sees it; `None` for system and tool rows.
    pub fn to_chat_message(&self) -> Option<ChatMessage> {
        match self.role.parse::<MessageRole>().ok()? {
            MessageRole::Assistant => Some(ChatMessage::assistant(self.content.clone())),
            MessageRole::User => Some(ChatMessage::user(self.content.clone())),
            MessageRole::System | MessageRole::Tool => None,
        }
    }
}

/// An interaction waiting to be appended.
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub audio_s3_key: Option<String>,
    pub audio_duration_seconds: Option<f64>,
    pub response_time_seconds: Option<f64>,
    pub words_per_minute: Option<f64>,
    pub filler_word_count: Option<i32>,
}

impl NewInteraction {
    pub fn from_chat(message: &ChatMessage) -> Self {
        Self {
            role: message.role.into(),
            content: message.content.clone(),
            timestamp: Utc::now(),
            audio_s3_key: None,
            audio_duration_seconds: None,
            response_time_seconds: None,
            words_per_minute: None,
            filler_word_count: None,
        }
    }
}

#[cfg(test)]
pub(crate) fn interaction_fixture(seq: i32, role: MessageRole, content: &str) -> InteractionRow {
    let now = Utc::now();
    InteractionRow {
        id: Uuid::new_v4(),
        session_id: Uuid::nil(),
        seq,
        role: role.as_str().to_string(),
        content: content.to_string(),
        timestamp: now,
        response_time_seconds: None,
        audio_duration_seconds: None,
        audio_s3_key: None,
        transcript_confidence: None,
        words_per_minute: None,
        filler_word_count: None,
        pause_count: None,
        sentiment_score: None,
        created_at: now,
    }
}
