use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::assessment::engine::AssessmentReport;
use crate::errors::{is_unique_violation, AppError};
use crate::interview::state::{SessionBrief, WorkflowCursor};
use crate::models::interaction::{InteractionRow, NewInteraction};
use crate::models::session::{InterviewSessionRow, InterviewType, SessionStatus};

/// A session together with its opening turn. Both are written in one
/// transaction so a session row never exists without its first question.
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub interview_type: InterviewType,
    pub brief: SessionBrief,
    pub max_questions: i32,
    pub cursor: WorkflowCursor,
    pub opening: Vec<NewInteraction>,
}

pub async fn create(
    pool: &PgPool,
    new: &NewSession,
) -> Result<(InterviewSessionRow, Vec<InteractionRow>), AppError> {
    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, InterviewSessionRow>(
        r#"
        INSERT INTO interview_sessions
            (id, user_id, title, interview_type, status, role_context, company_context,
             difficulty_level, custom_instructions, max_questions,
             workflow_node, question_count, user_context, analysis)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(new.id)
    .bind(new.user_id)
    .bind(&new.title)
    .bind(new.interview_type.as_str())
    .bind(SessionStatus::Active.as_str())
    .bind(&new.brief.role_context)
    .bind(&new.brief.company_context)
    .bind(&new.brief.difficulty_level)
    .bind(&new.brief.custom_instructions)
    .bind(new.max_questions)
    .bind(new.cursor.node.as_str())
    .bind(new.cursor.question_count)
    .bind(&new.cursor.user_context)
    .bind(&new.cursor.analysis)
    .fetch_one(&mut *tx)
    .await?;

    let interactions = insert_interactions(&mut tx, session.id, 0, &new.opening).await?;

    tx.commit().await?;
    Ok((session, interactions))
}

/// Sessions belonging to someone else are reported as missing.
pub async fn get_owned(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<InterviewSessionRow, AppError> {
    sqlx::query_as::<_, InterviewSessionRow>(
        "SELECT * FROM interview_sessions WHERE id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
}

/// Newest first.
pub async fn list(
    pool: &PgPool,
    user_id: Uuid,
    skip: i64,
    limit: i64,
) -> Result<Vec<InterviewSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, InterviewSessionRow>(
        r#"
        SELECT * FROM interview_sessions
        WHERE user_id = $1
        ORDER BY created_at DESC
        OFFSET $2 LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn list_interactions(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Vec<InteractionRow>, sqlx::Error> {
    sqlx::query_as::<_, InteractionRow>(
        "SELECT * FROM interview_interactions WHERE session_id = $1 ORDER BY seq ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// Appends a turn's new interactions at `first_seq..` and moves the workflow
/// cursor, all in one transaction.
///
/// Two submissions racing on the same session both compute the same
/// `first_seq`; the loser hits `UNIQUE(session_id, seq)` and gets `Conflict`.
pub async fn persist_turn(
    pool: &PgPool,
    session_id: Uuid,
    first_seq: i32,
    interactions: &[NewInteraction],
    cursor: &WorkflowCursor,
) -> Result<Vec<InteractionRow>, AppError> {
    let mut tx = pool.begin().await?;
    let written = insert_interactions(&mut tx, session_id, first_seq, interactions).await?;

    sqlx::query(
        r#"
        UPDATE interview_sessions
        SET workflow_node = $2, question_count = $3, user_context = $4, analysis = $5,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .bind(cursor.node.as_str())
    .bind(cursor.question_count)
    .bind(&cursor.user_context)
    .bind(&cursor.analysis)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(written)
}

async fn insert_interactions(
    tx: &mut Transaction<'_, Postgres>,
    session_id: Uuid,
    first_seq: i32,
    interactions: &[NewInteraction],
) -> Result<Vec<InteractionRow>, AppError> {
    let mut written = Vec::with_capacity(interactions.len());

    for (offset, interaction) in interactions.iter().enumerate() {
        let seq = first_seq
            + i32::try_from(offset)
                .map_err(|_| AppError::Validation("Transcript too long".to_string()))?;
        let row = sqlx::query_as::<_, InteractionRow>(
            r#"
            INSERT INTO interview_interactions
                (session_id, seq, role, content, "timestamp", response_time_seconds,
                 audio_duration_seconds, audio_s3_key, words_per_minute, filler_word_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(seq)
        .bind(interaction.role.as_str())
        .bind(&interaction.content)
        .bind(interaction.timestamp)
        .bind(interaction.response_time_seconds)
        .bind(interaction.audio_duration_seconds)
        .bind(&interaction.audio_s3_key)
        .bind(interaction.words_per_minute)
        .bind(interaction.filler_word_count)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(
                    "Another message for this session is being processed".to_string(),
                )
            } else {
                AppError::Database(e)
            }
        })?;
        written.push(row);
    }
    Ok(written)
}

pub async fn update_status(
    pool: &PgPool,
    session_id: Uuid,
    status: SessionStatus,
) -> Result<InterviewSessionRow, sqlx::Error> {
    sqlx::query_as::<_, InterviewSessionRow>(
        r#"
        UPDATE interview_sessions
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(session_id)
    .bind(status.as_str())
    .fetch_one(pool)
    .await
}

/// Marks the session completed; duration is whole seconds since `started_at`.
pub async fn complete(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<InterviewSessionRow, sqlx::Error> {
    sqlx::query_as::<_, InterviewSessionRow>(
        r#"
        UPDATE interview_sessions
        SET status = $2,
            completed_at = NOW(),
            duration_seconds = FLOOR(EXTRACT(EPOCH FROM (NOW() - started_at)))::INT,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(session_id)
    .bind(SessionStatus::Completed.as_str())
    .fetch_one(pool)
    .await
}

/// Most recently completed first; feeds the context corpus.
pub async fn recent_completed_sessions(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<InterviewSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, InterviewSessionRow>(
        r#"
        SELECT * FROM interview_sessions
        WHERE user_id = $1 AND status = $2
        ORDER BY completed_at DESC NULLS LAST
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(SessionStatus::Completed.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn set_room(
    pool: &PgPool,
    session_id: Uuid,
    room: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE interview_sessions SET livekit_room_id = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(session_id)
    .bind(room)
    .execute(pool)
    .await?;
    Ok(())
}

/// Overwrites every score and feedback column from the report.
pub async fn save_assessment(pool: &PgPool, report: &AssessmentReport) -> Result<(), sqlx::Error> {
    let c = &report.communication_scores;
    let k = &report.content_scores;
    let b = &report.behavioral_scores;
    let f = &report.feedback;

    sqlx::query(
        r#"
        UPDATE interview_sessions
        SET overall_score = $2,
            verbal_communication_score = $3, clarity_score = $4, confidence_score = $5,
            pace_score = $6,
            technical_accuracy_score = $7, problem_solving_score = $8, structure_score = $9,
            relevance_score = $10,
            star_method_score = $11, leadership_score = $12, teamwork_score = $13,
            strengths = $14, weaknesses = $15, improvements = $16, detailed_feedback = $17,
            recommended_topics = $18, next_steps = $19,
            assessed_at = $20, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(report.session_id)
    .bind(report.overall_score)
    .bind(c.verbal_communication_score)
    .bind(c.clarity_score)
    .bind(c.confidence_score)
    .bind(c.pace_score)
    .bind(k.technical_accuracy_score)
    .bind(k.problem_solving_score)
    .bind(k.structure_score)
    .bind(k.relevance_score)
    .bind(b.star_method_score)
    .bind(b.leadership_score)
    .bind(b.teamwork_score)
    .bind(&f.strengths)
    .bind(&f.weaknesses)
    .bind(&f.improvements)
    .bind(&f.detailed_feedback)
    .bind(&f.recommended_topics)
    .bind(&f.next_steps)
    .bind(report.assessed_at)
    .execute(pool)
    .await?;
    Ok(())
}
