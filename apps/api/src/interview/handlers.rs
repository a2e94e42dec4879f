use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::assessment::engine::AssessmentReport;
use crate::assessment::metrics;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::interview::repository::{self, NewSession};
use crate::interview::state::{InterviewRunState, SessionBrief};
use crate::models::interaction::{InteractionRow, MessageRole, NewInteraction};
use crate::models::session::{InterviewSessionRow, InterviewType, SessionStatus};
use crate::state::AppState;
use crate::storage;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_AUDIO_EXTENSION: &str = "webm";

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: String,
    pub interview_type: String,
    pub role_context: Option<String>,
    pub company_context: Option<String>,
    pub difficulty_level: Option<String>,
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    pub audio_s3_key: Option<String>,
    pub audio_duration_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioUploadRequest {
    pub extension: Option<String>,
}

#[derive(Serialize)]
pub struct SessionDetailResponse {
    pub session: InterviewSessionRow,
    pub interactions: Vec<InteractionRow>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    /// The interviewer's reply: the next question, or the closing summary.
    pub reply: Option<String>,
    pub question_count: u32,
    pub max_questions: u32,
    pub workflow_node: String,
    pub interview_finished: bool,
    pub interactions: Vec<InteractionRow>,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub session: InterviewSessionRow,
    pub assessment: Option<AssessmentReport>,
}

#[derive(Serialize)]
pub struct AudioUploadResponse {
    pub upload_url: String,
    pub s3_key: String,
    pub content_type: &'static str,
    pub expires_in: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/interview/sessions
/// Creates the session and runs the workflow up to the first question.
pub async fn handle_create_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionDetailResponse>), AppError> {
    let (title, interview_type, brief) = validate_create(req)?;

    let run = state.workflow.initial_state(
        user.user_id,
        Uuid::new_v4(),
        interview_type,
        brief.clone(),
    );
    let run = state.workflow.start(run).await?;

    let (session, interactions) =
        repository::create(&state.db, &opening_session(title, brief, &run)).await?;

    info!(
        "Started {} session {} for user {}",
        interview_type, session.id, user.user_id
    );

    Ok((
        StatusCode::CREATED,
        Json(SessionDetailResponse {
            session,
            interactions,
        }),
    ))
}

/// GET /api/v1/interview/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListSessionsQuery>,
) -> Result<Json<Vec<InterviewSessionRow>>, AppError> {
    let (skip, limit) = page_bounds(params.skip, params.limit)?;
    let sessions = repository::list(&state.db, user.user_id, skip, limit).await?;
    Ok(Json(sessions))
}

/// GET /api/v1/interview/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetailResponse>, AppError> {
    let session = repository::get_owned(&state.db, session_id, user.user_id).await?;
    let interactions = repository::list_interactions(&state.db, session_id).await?;
    Ok(Json(SessionDetailResponse {
        session,
        interactions,
    }))
}

/// POST /api/v1/interview/sessions/:id/message
/// Appends the candidate's answer and advances the interview one cycle.
pub async fn handle_send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    if let Some(duration) = req.audio_duration_seconds {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(AppError::Validation(
                "audio_duration_seconds must be positive".to_string(),
            ));
        }
    }

    let session = repository::get_owned(&state.db, session_id, user.user_id).await?;
    if session.lifecycle() != Some(SessionStatus::Active) {
        return Err(AppError::Validation(format!(
            "Session is {}; messages are only accepted while active",
            session.status
        )));
    }

    let history = repository::list_interactions(&state.db, session_id).await?;
    let run = InterviewRunState::restore(&session, &history)?;
    let known_messages = run.messages.len();
    let first_seq = i32::try_from(history.len())
        .map_err(|_| AppError::Validation("Transcript too long".to_string()))?;
    let answer = answer_interaction(
        &content,
        req.audio_s3_key,
        req.audio_duration_seconds,
        history.last().map(|row| row.timestamp),
        Utc::now(),
    );

    let run = state.workflow.resume(run, &content).await?;

    let new: Vec<NewInteraction> = std::iter::once(answer)
        .chain(
            run.messages[known_messages + 1..]
                .iter()
                .map(NewInteraction::from_chat),
        )
        .collect();
    let interactions =
        repository::persist_turn(&state.db, session_id, first_seq, &new, &run.cursor()).await?;

    if run.is_finished() {
        info!(
            "Session {session_id} asked all {} questions",
            run.max_questions
        );
    }

    Ok(Json(MessageResponse {
        reply: run.last_assistant_message().map(str::to_string),
        question_count: run.question_count,
        max_questions: run.max_questions,
        workflow_node: run.node.to_string(),
        interview_finished: run.is_finished(),
        interactions,
    }))
}

/// POST /api/v1/interview/sessions/:id/status
/// Pause, resume (back to active) or cancel. Completion has its own route.
pub async fn handle_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<InterviewSessionRow>, AppError> {
    let requested: SessionStatus = req.status.trim().parse().map_err(AppError::Validation)?;
    if requested == SessionStatus::Completed {
        return Err(AppError::Validation(
            "Use the complete endpoint to finish a session".to_string(),
        ));
    }

    let session = repository::get_owned(&state.db, session_id, user.user_id).await?;
    check_transition(&session, requested)?;

    let session = repository::update_status(&state.db, session_id, requested).await?;
    info!("Session {session_id} is now {}", session.status);
    Ok(Json(session))
}

/// POST /api/v1/interview/sessions/:id/complete
/// Marks the session completed and, if it has a transcript, assesses it.
pub async fn handle_complete_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CompleteResponse>, AppError> {
    let session = repository::get_owned(&state.db, session_id, user.user_id).await?;
    check_transition(&session, SessionStatus::Completed)?;

    let session = repository::complete(&state.db, session_id).await?;
    info!(
        "Session {session_id} completed after {}s",
        session.duration_seconds.unwrap_or_default()
    );

    let has_transcript = !repository::list_interactions(&state.db, session_id)
        .await?
        .is_empty();
    let assessment = if has_transcript {
        match state.assessor.assess(&state.db, &session).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Assessment of completed session {session_id} failed: {e}");
                None
            }
        }
    } else {
        None
    };

    state.context.reindex_logged(&state.db, user.user_id).await;

    let session = repository::get_owned(&state.db, session_id, user.user_id).await?;
    Ok(Json(CompleteResponse {
        session,
        assessment,
    }))
}

/// POST /api/v1/interview/sessions/:id/audio-upload-url
pub async fn handle_audio_upload_url(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
    body: Option<Json<AudioUploadRequest>>,
) -> Result<Json<AudioUploadResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let extension = req
        .extension
        .as_deref()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_AUDIO_EXTENSION.to_string());
    let content_type = storage::audio_content_type(&extension).ok_or_else(|| {
        AppError::Validation(format!(
            "Unsupported audio format '{extension}' (expected one of {})",
            storage::AUDIO_EXTENSIONS.join(", ")
        ))
    })?;

    let session = repository::get_owned(&state.db, session_id, user.user_id).await?;
    if session.lifecycle().map_or(true, |s| s.is_terminal()) {
        return Err(AppError::Validation(format!(
            "Session is {}; audio uploads are closed",
            session.status
        )));
    }

    let s3_key = storage::audio_key(user.user_id, session_id, &extension, Utc::now());
    let ttl = state.config.presigned_url_ttl_secs;
    let upload_url = storage::presigned_put_url(
        &state.s3,
        &state.config.s3_bucket,
        &s3_key,
        content_type,
        Duration::from_secs(ttl),
    )
    .await?;

    Ok(Json(AudioUploadResponse {
        upload_url,
        s3_key,
        content_type,
        expires_in: ttl,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// The session row and opening turn for a freshly started run.
fn opening_session(title: String, brief: SessionBrief, run: &InterviewRunState) -> NewSession {
    NewSession {
        id: run.session_id,
        user_id: run.user_id,
        title,
        interview_type: run.interview_type,
        brief,
        max_questions: i32::try_from(run.max_questions).unwrap_or(i32::MAX),
        cursor: run.cursor(),
        opening: run.messages.iter().map(NewInteraction::from_chat).collect(),
    }
}

fn validate_create(
    req: CreateSessionRequest,
) -> Result<(String, InterviewType, SessionBrief), AppError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("Title cannot be empty".to_string()));
    }
    let interview_type: InterviewType = req
        .interview_type
        .parse()
        .map_err(AppError::Validation)?;

    let brief = SessionBrief {
        role_context: non_blank(req.role_context),
        company_context: non_blank(req.company_context),
        difficulty_level: non_blank(req.difficulty_level),
        custom_instructions: non_blank(req.custom_instructions),
    };
    Ok((title, interview_type, brief))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn page_bounds(skip: Option<i64>, limit: Option<i64>) -> Result<(i64, i64), AppError> {
    let skip = skip.unwrap_or(0);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if skip < 0 {
        return Err(AppError::Validation("skip cannot be negative".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok((skip, limit))
}

fn check_transition(session: &InterviewSessionRow, next: SessionStatus) -> Result<(), AppError> {
    let current = session.lifecycle().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "session {} has unknown status '{}'",
            session.id,
            session.status
        ))
    })?;
    if !current.can_transition_to(next) {
        return Err(AppError::Validation(format!(
            "Cannot change session status from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}

/// The candidate's answer with the delivery metrics known at submission time.
fn answer_interaction(
    content: &str,
    audio_s3_key: Option<String>,
    audio_duration_seconds: Option<f64>,
    previous_turn_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> NewInteraction {
    let words = content.split_whitespace().count();
    let filler = metrics::count_filler_words(content);

    NewInteraction {
        role: MessageRole::User,
        content: content.to_string(),
        timestamp: now,
        audio_s3_key,
        audio_duration_seconds,
        response_time_seconds: previous_turn_at
            .map(|at| (now - at).num_milliseconds().max(0) as f64 / 1000.0),
        words_per_minute: audio_duration_seconds
            .and_then(|secs| metrics::words_per_minute(words, secs)),
        filler_word_count: Some(i32::try_from(filler).unwrap_or(i32::MAX)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::context::store::InMemoryContextStore;
    use crate::context::ContextProvider;
    use crate::interview::state::WorkflowNode;
    use crate::interview::InterviewWorkflow;
    use crate::llm_client::testing::ScriptedModel;
    use crate::models::interaction::interaction_fixture;
    use crate::models::session::session_fixture;

    fn create_request(title: &str, interview_type: &str) -> CreateSessionRequest {
        CreateSessionRequest {
            title: title.to_string(),
            interview_type: interview_type.to_string(),
            role_context: Some("  Staff Engineer ".to_string()),
            company_context: Some("   ".to_string()),
            difficulty_level: None,
            custom_instructions: None,
        }
    }

    #[test]
    fn test_create_validation() {
        let (title, kind, brief) = validate_create(create_request(" Loop prep ", "Behavioral")).unwrap();
        assert_eq!(title, "Loop prep");
        assert_eq!(kind, InterviewType::Behavioral);
        assert_eq!(brief.role_context.as_deref(), Some("Staff Engineer"));
        assert!(brief.company_context.is_none());

        assert!(matches!(
            validate_create(create_request("   ", "technical")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_create(create_request("Prep", "karaoke")),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_new_session_is_written_with_its_opening_question() {
        let context = ContextProvider::new(Arc::new(InMemoryContextStore::new()), 5, 10);
        let model = Arc::new(ScriptedModel::replying("Walk me through a recent project?"));
        let workflow = InterviewWorkflow::new(context, model, 3);
        let user_id = Uuid::new_v4();

        let run = workflow.initial_state(
            user_id,
            Uuid::new_v4(),
            InterviewType::General,
            SessionBrief::default(),
        );
        let run = workflow.start(run).await.unwrap();

        let new = opening_session("Warm-up".to_string(), SessionBrief::default(), &run);
        assert_eq!(new.id, run.session_id);
        assert_eq!(new.cursor.node, WorkflowNode::AnalyzingResponse);
        assert_eq!(new.opening.len(), 1);
        assert_eq!(new.opening[0].role, MessageRole::Assistant);

        // What the single create transaction leaves behind must accept an answer.
        let mut row = session_fixture(user_id, InterviewType::General);
        row.id = new.id;
        row.max_questions = new.max_questions;
        row.workflow_node = new.cursor.node.as_str().to_string();
        row.question_count = new.cursor.question_count;
        row.user_context = new.cursor.user_context.clone();
        row.analysis = new.cursor.analysis.clone();
        let history: Vec<InteractionRow> = new
            .opening
            .iter()
            .enumerate()
            .map(|(i, n)| interaction_fixture(i as i32, n.role, &n.content))
            .collect();

        let restored = InterviewRunState::restore(&row, &history).unwrap();
        let next = workflow
            .resume(restored, "I rebuilt our billing pipeline.")
            .await
            .unwrap();
        assert_eq!(next.question_count, 1);
        assert_eq!(next.node, WorkflowNode::AnalyzingResponse);
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None).unwrap(), (0, DEFAULT_PAGE_SIZE));
        assert_eq!(page_bounds(Some(40), Some(100)).unwrap(), (40, 100));
        assert!(page_bounds(None, Some(101)).is_err());
        assert!(page_bounds(None, Some(0)).is_err());
        assert!(page_bounds(Some(-1), None).is_err());
    }

    #[test]
    fn test_status_transitions() {
        let mut session = session_fixture(Uuid::new_v4(), InterviewType::General);
        assert!(check_transition(&session, SessionStatus::Paused).is_ok());
        assert!(check_transition(&session, SessionStatus::Completed).is_ok());

        session.status = "cancelled".to_string();
        assert!(matches!(
            check_transition(&session, SessionStatus::Active),
            Err(AppError::Validation(_))
        ));

        session.status = "archived".to_string();
        assert!(matches!(
            check_transition(&session, SessionStatus::Active),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_answer_carries_delivery_metrics() {
        let now = Utc::now();
        let answer = answer_interaction(
            "Um I basically rewrote the scheduler",
            Some("uploads/u/1_s.webm".to_string()),
            Some(3.0),
            Some(now - ChronoDuration::milliseconds(4500)),
            now,
        );

        assert_eq!(answer.role, MessageRole::User);
        assert_eq!(answer.filler_word_count, Some(2));
        assert_eq!(answer.words_per_minute, Some(120.0));
        assert_eq!(answer.response_time_seconds, Some(4.5));
        assert_eq!(answer.audio_s3_key.as_deref(), Some("uploads/u/1_s.webm"));
    }

    #[test]
    fn test_text_answer_has_no_pace() {
        let now = Utc::now();
        let answer = answer_interaction("Short answer", None, None, None, now);
        assert_eq!(answer.words_per_minute, None);
        assert_eq!(answer.response_time_seconds, None);
        assert_eq!(answer.filler_word_count, Some(0));
    }
}
